//! Table-of-contents detection and suppression.
//!
//! Legal documents commonly open with a TOC that repeats every chapter and
//! article marker of the body; without suppression the parser would double
//! every entity. The detector finds contiguous `[start, end)` line ranges
//! that are TOC and rewrites their labels to IGNORE, preserving the
//! original label in `meta.pre_toc_label` for diagnostics.
//!
//! Opening signals:
//! - S1: an explicit heading (الفهرس, جدول المحتويات, المحتويات, فهرس).
//! - S2: three or more page-numbered marker lines within a 15-line window.
//! - S3: five or more distinct chapter markers within a 10-line window with
//!   no substantial content between them.
//! - S4: a Latin "Chapter" token glued to an Arabic marker (these lines are
//!   unconditionally IGNORE even outside a region).
//!
//! Closing signals, in priority order:
//! - E1: an Article-1 marker with no trailing page number. Body text has
//!   begun; this overrides any S2/S3 continuation.
//! - E2: a run of substantial content lines.
//! - E3: end of input.

use std::ops::Range;

use tracing::debug;

use qanun_core::config::ParserConfig;

use crate::classify::{LineAnalysis, LineLabel};

const PAGE_NUMBER_WINDOW: usize = 15;
const PAGE_NUMBER_MIN_MATCHES: usize = 3;
const CHAPTER_BURST_WINDOW: usize = 10;
const CHAPTER_BURST_MIN_MARKERS: usize = 5;

const TOC_HEADINGS: [&str; 4] = ["جدول المحتويات", "المحتويات", "الفهرس", "فهرس"];

/// Detects and suppresses TOC regions.
#[derive(Debug, Clone)]
pub struct TocDetector {
    /// Minimum length for a line to count as substantial content.
    content_threshold: usize,
    /// Consecutive substantial content lines that close a region.
    substantial_run: usize,
}

impl TocDetector {
    pub fn new(content_threshold: usize, substantial_run: usize) -> Self {
        Self {
            content_threshold,
            substantial_run,
        }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.content_threshold, config.toc_substantial_run)
    }

    /// Identify TOC regions as `[start, end)` ranges over `lines`.
    pub fn detect(&self, lines: &[LineAnalysis]) -> Vec<Range<usize>> {
        let mut regions = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Some(start) = self.find_opener(lines, i) else {
                break;
            };
            let end = self.find_closer(lines, start);
            debug!(start, end, "TOC region detected");
            regions.push(start..end);
            i = end.max(start + 1);
        }

        regions
    }

    /// Rewrite every line inside a detected region to IGNORE, keeping the
    /// original label in `meta.pre_toc_label`. Returns the regions.
    pub fn suppress(&self, lines: &mut [LineAnalysis]) -> Vec<Range<usize>> {
        let regions = self.detect(lines);
        for region in &regions {
            for line in lines
                .iter_mut()
                .skip(region.start)
                .take(region.end.saturating_sub(region.start))
            {
                if line.label != LineLabel::Ignore {
                    line.meta.pre_toc_label = Some(line.label);
                    line.label = LineLabel::Ignore;
                    line.meta.ignore_reason = Some("toc_region");
                }
            }
        }
        regions
    }

    /// Find the first line index at or after `from` that opens a TOC region.
    fn find_opener(&self, lines: &[LineAnalysis], from: usize) -> Option<usize> {
        for i in from..lines.len() {
            let line = &lines[i];

            // S1: explicit heading opens at the following line.
            if TOC_HEADINGS
                .iter()
                .any(|heading| line.normalized.contains(heading))
                && i + 1 < lines.len()
            {
                return Some(i + 1);
            }

            // S4: chapter-prefix lines open a region at themselves.
            if line.meta.ignore_reason == Some("chapter_prefix_toc") {
                return Some(i);
            }

            // S2: enough page-numbered markers in the window ahead.
            if self.is_paged_marker(line) {
                let window_end = (i + PAGE_NUMBER_WINDOW).min(lines.len());
                let matches = lines[i..window_end]
                    .iter()
                    .filter(|l| self.is_paged_marker(l))
                    .count();
                if matches >= PAGE_NUMBER_MIN_MATCHES {
                    return Some(i);
                }
            }

            // S3: a burst of distinct chapter markers with nothing
            // substantial in between.
            if line.label == LineLabel::Chapter {
                let window_end = (i + CHAPTER_BURST_WINDOW).min(lines.len());
                let window = &lines[i..window_end];
                let mut distinct = std::collections::HashSet::new();
                let mut unnumbered = 0usize;
                for l in window.iter().filter(|l| l.label == LineLabel::Chapter) {
                    match l.meta.ordinal {
                        Some(ordinal) => {
                            distinct.insert(ordinal);
                        }
                        None => unnumbered += 1,
                    }
                }
                let has_substantial = window.iter().any(|l| self.is_substantial_content(l));
                if distinct.len() + unnumbered >= CHAPTER_BURST_MIN_MARKERS && !has_substantial {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Find the exclusive end of a region opened at `start`.
    fn find_closer(&self, lines: &[LineAnalysis], start: usize) -> usize {
        for i in start..lines.len() {
            // E1: Article 1 without a page number - the body has begun.
            if lines[i].label == LineLabel::Article
                && lines[i].meta.ordinal == Some(1)
                && !lines[i].meta.trailing_page_number
            {
                return walk_back_body_openers(lines, start, i);
            }

            // E2: a run of substantial content lines.
            if self.is_substantial_content(&lines[i]) {
                let run_end = (i + self.substantial_run).min(lines.len());
                if run_end - i == self.substantial_run
                    && lines[i..run_end]
                        .iter()
                        .all(|l| self.is_substantial_content(l))
                {
                    return i;
                }
            }
        }

        // E3: end of document.
        lines.len()
    }

    fn is_paged_marker(&self, line: &LineAnalysis) -> bool {
        line.label.is_marker() && line.meta.trailing_page_number
    }

    fn is_substantial_content(&self, line: &LineAnalysis) -> bool {
        line.label == LineLabel::Content
            && line.normalized.chars().count() > self.content_threshold
    }
}

// The body restarts numbering: a first-indexed chapter or section directly
// above Article 1, with no page number, is the body's own heading and must
// stay outside the suppressed region.
fn walk_back_body_openers(lines: &[LineAnalysis], start: usize, article_idx: usize) -> usize {
    let opens_body = |line: &LineAnalysis, label: LineLabel| {
        line.label == label
            && !line.meta.trailing_page_number
            && matches!(line.meta.ordinal, None | Some(1))
    };

    let mut close = article_idx;
    if close > start && opens_body(&lines[close - 1], LineLabel::Section) {
        close -= 1;
    }
    if close > start && opens_body(&lines[close - 1], LineLabel::Chapter) {
        close -= 1;
    }
    close
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::classify::Classifier;

    fn classify_all(lines: &[&str]) -> Vec<LineAnalysis> {
        let classifier = Classifier::default();
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| classifier.classify(i + 1, line))
            .collect()
    }

    fn detector() -> TocDetector {
        TocDetector::new(40, 3)
    }

    const BODY_LINE: &str =
        "يلتزم صاحب العمل بتمكين العامل من أداء عمله وتهيئة الوسائل اللازمة لذلك كافة.";

    #[test]
    fn test_explicit_heading_opens_region() {
        let mut lines = classify_all(&[
            "الفهرس",
            "الباب الأول ....... 3",
            "الباب الثاني ....... 9",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0], 1..3);
        assert_eq!(lines[1].label, LineLabel::Ignore);
        assert_eq!(lines[1].meta.pre_toc_label, Some(LineLabel::Chapter));
        assert_eq!(lines[3].label, LineLabel::Article);
    }

    #[test]
    fn test_page_numbered_markers_open_region() {
        let mut lines = classify_all(&[
            "نظام العمل",
            "الباب الأول ....... 5",
            "المادة الأولى ....... 6",
            "المادة الثانية ....... 7",
            "الباب الثاني ....... 12",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![1..5]);
        for line in &lines[1..5] {
            assert_eq!(line.label, LineLabel::Ignore);
            assert_eq!(line.meta.ignore_reason, Some("toc_region"));
        }
        // Article 1 of the body survives.
        assert_eq!(lines[5].label, LineLabel::Article);
    }

    #[test]
    fn test_article_one_with_page_number_does_not_close() {
        // The TOC's own "المادة الأولى ... 14" entry must not end the
        // region; only the bare body marker does.
        let mut lines = classify_all(&[
            "المحتويات",
            "الباب الأول ....... 5",
            "المادة الأولى ....... 14",
            "الباب الثاني ....... 20",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![1..4]);
        assert_eq!(lines[4].label, LineLabel::Article);
    }

    #[test]
    fn test_substantial_run_closes_region() {
        let mut lines = classify_all(&[
            "فهرس",
            "الباب الأول ....... 5",
            BODY_LINE,
            BODY_LINE,
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![1..2]);
        assert_eq!(lines[2].label, LineLabel::Content);
    }

    #[test]
    fn test_chapter_burst_without_content_opens_region() {
        let mut lines = classify_all(&[
            "الباب الأول",
            "الباب الثاني",
            "الباب الثالث",
            "الباب الرابع",
            "الباب الخامس",
            "الباب السادس",
            "الباب السابع",
            "الباب الثامن",
            "الباب التاسع",
            "الباب العاشر",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![0..10]);
        assert_eq!(lines[10].label, LineLabel::Article);
    }

    #[test]
    fn test_sparse_chapters_with_content_do_not_trigger_burst() {
        let mut lines = classify_all(&[
            "الباب الأول",
            BODY_LINE,
            "الباب الثاني",
            BODY_LINE,
            "الباب الثالث",
            BODY_LINE,
            "الباب الرابع",
            BODY_LINE,
            "الباب الخامس",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_body_without_toc_is_untouched() {
        let mut lines = classify_all(&[
            "الباب الأول: أحكام عامة",
            "المادة الأولى",
            BODY_LINE,
            "المادة الثانية",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert!(regions.is_empty());
        assert_eq!(lines[0].label, LineLabel::Chapter);
    }

    #[test]
    fn test_chapter_prefix_line_opens_region() {
        let mut lines = classify_all(&[
            "Chapter الباب السابع عشر 47",
            "Chapter الباب الثامن عشر 50",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![0..2]);
        assert_eq!(lines[2].label, LineLabel::Article);
    }

    #[test]
    fn test_body_headers_before_article_one_survive() {
        let mut lines = classify_all(&[
            "الفهرس",
            "الباب الأول ....... 5",
            "الفصل الأول ....... 6",
            "المادة الأولى ....... 6",
            "الباب الأول: أحكام عامة",
            "الفصل الأول",
            "المادة الأولى",
            BODY_LINE,
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![1..4]);
        assert_eq!(lines[4].label, LineLabel::Chapter);
        assert_eq!(lines[5].label, LineLabel::Section);
        assert_eq!(lines[6].label, LineLabel::Article);
    }

    #[test]
    fn test_region_runs_to_end_of_document() {
        let mut lines = classify_all(&[
            "الفهرس",
            "الباب الأول ....... 3",
            "الباب الثاني ....... 7",
        ]);
        let regions = detector().suppress(&mut lines);
        assert_eq!(regions, vec![1..3]);
    }
}
