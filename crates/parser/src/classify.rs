//! Line classification.
//!
//! Each input line gets a label from {CHAPTER, SECTION, ARTICLE, CONTENT,
//! IGNORE} with a confidence. Classification is pure per line: contextual
//! decisions (most importantly TOC suppression) belong to the detector in
//! [`crate::toc`].
//!
//! Patterns are ordered by specificity and ordinals resolve longest-first,
//! so "الباب الحادي والعشرون" never half-matches as "الباب الحادي".

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use qanun_core::config::ParserConfig;

use crate::normalize::{NormalizerOptions, normalize_str};
use crate::ordinal;

/// Label assigned to a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineLabel {
    Chapter,
    Section,
    Article,
    Content,
    Ignore,
}

impl LineLabel {
    /// Whether the label opens a structural container or leaf.
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Chapter | Self::Section | Self::Article)
    }
}

/// Per-line classification detail.
#[derive(Debug, Clone, Default)]
pub struct LineMeta {
    /// Resolved ordinal for marker lines; `None` when the marker carried no
    /// recognizable index.
    pub ordinal: Option<u32>,
    /// The ordinal as written (normalized), e.g. "الخامسه عشره".
    pub number_text: Option<String>,
    /// Marker title text after the ordinal, e.g. "احكام عامه".
    pub title: Option<String>,
    /// Why an IGNORE label was assigned.
    pub ignore_reason: Option<&'static str>,
    /// Original label before TOC suppression rewrote it to IGNORE.
    pub pre_toc_label: Option<LineLabel>,
    /// The line ends in a bare integer after its marker content - the
    /// signature of a table-of-contents page reference.
    pub trailing_page_number: bool,
}

/// A classified line.
#[derive(Debug, Clone)]
pub struct LineAnalysis {
    /// 1-based position in the input.
    pub line_no: usize,
    pub original: String,
    pub normalized: String,
    pub label: LineLabel,
    pub confidence: f32,
    pub meta: LineMeta,
}

#[allow(clippy::unwrap_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

// A Latin "Chapter" token glued to an Arabic chapter/section marker only
// occurs in machine-generated TOC lines.
static CHAPTER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"(?i)^chapter\s+(?:ال)?(?:باب|فصل)\b"));

static CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"^(?:ال)?باب\b\s*[:\-–]*\s*(.*)$"));

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"^(?:ال)?فصل\b\s*[:\-–]*\s*(.*)$"));

static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"^(?:ال)?ماد[ةه]\b\s*[:\-–]*\s*(?:رقم\b\s*)?(.*)$"));

static TRAILING_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| compiled(r"[\s.·…_]*(\d+)\s*$"));

/// Pattern-based line classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    options: NormalizerOptions,
    min_content_len: usize,
}

impl Classifier {
    /// Classifier with the given normalization profile and content floor.
    pub fn new(options: NormalizerOptions, min_content_len: usize) -> Self {
        Self {
            options,
            min_content_len,
        }
    }

    /// Classifier driven by the parser configuration.
    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(NormalizerOptions::from_config(config), config.min_content_len)
    }

    /// Classify one line. Depends only on the line itself.
    pub fn classify(&self, line_no: usize, original: &str) -> LineAnalysis {
        let normalized = normalize_str(original, &self.options);
        let mut analysis = LineAnalysis {
            line_no,
            original: original.to_string(),
            normalized,
            label: LineLabel::Content,
            confidence: 0.0,
            meta: LineMeta::default(),
        };

        if analysis.normalized.is_empty() {
            analysis.label = LineLabel::Ignore;
            analysis.confidence = 1.0;
            analysis.meta.ignore_reason = Some("blank");
            return analysis;
        }

        if CHAPTER_PREFIX_RE.is_match(&analysis.normalized) {
            analysis.label = LineLabel::Ignore;
            analysis.confidence = 0.95;
            analysis.meta.ignore_reason = Some("chapter_prefix_toc");
            analysis.meta.trailing_page_number = ends_with_page_number(&analysis.normalized);
            return analysis;
        }

        for (re, label) in [
            (&*CHAPTER_RE, LineLabel::Chapter),
            (&*SECTION_RE, LineLabel::Section),
            (&*ARTICLE_RE, LineLabel::Article),
        ] {
            if let Some(captures) = re.captures(&analysis.normalized) {
                let rest = captures.get(1).map_or("", |m| m.as_str()).to_string();
                self.fill_marker(&mut analysis, label, &rest);
                return analysis;
            }
        }

        if analysis.normalized.chars().count() > self.min_content_len {
            analysis.label = LineLabel::Content;
            analysis.confidence = 0.8;
            analysis.meta.trailing_page_number = ends_with_page_number(&analysis.normalized);
        } else {
            analysis.label = LineLabel::Ignore;
            analysis.confidence = 0.7;
            analysis.meta.ignore_reason = Some("too_short");
        }
        analysis
    }

    fn fill_marker(&self, analysis: &mut LineAnalysis, label: LineLabel, rest: &str) {
        analysis.label = label;

        let (remainder, consumed) = match ordinal::resolve_prefix(rest) {
            Some((value, words)) => {
                analysis.meta.ordinal = Some(value);
                analysis.confidence = 0.95;
                let taken: Vec<&str> = rest.split_whitespace().take(words).collect();
                let number_text = taken
                    .join(" ")
                    .trim_matches(|c: char| c.is_ascii_punctuation() || c == '،' || c == '؛')
                    .to_string();
                analysis.meta.number_text = Some(number_text);
                let remainder = rest
                    .split_whitespace()
                    .skip(words)
                    .collect::<Vec<_>>()
                    .join(" ");
                (remainder, true)
            }
            None => {
                // Unknown spelling: fall back to any numeric substring.
                match ordinal::extract_numeric(rest) {
                    Some(value) => {
                        analysis.meta.ordinal = Some(value);
                        analysis.confidence = 0.6;
                    }
                    None => {
                        analysis.meta.ordinal = None;
                        analysis.confidence = 0.5;
                    }
                }
                (rest.to_string(), false)
            }
        };

        let (title, trailing) = split_title_and_page(&remainder);
        // Without a consumed ordinal the trailing integer may be the index
        // itself rather than a page reference; only trust it as a page
        // number when something else precedes it.
        analysis.meta.trailing_page_number =
            trailing && (consumed || remainder.split_whitespace().count() > 1);
        analysis.meta.title = title;
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(NormalizerOptions::search(), ParserConfig::default().min_content_len)
    }
}

/// Classify a single line with the default classifier.
///
/// Pure: the result depends only on `line`.
pub fn classify_line(line: &str) -> LineAnalysis {
    Classifier::default().classify(0, line)
}

fn ends_with_page_number(text: &str) -> bool {
    TRAILING_PAGE_RE.is_match(text) && !text.chars().all(|c| c.is_ascii_digit() || c == ' ')
}

/// Split a marker remainder into a display title and a trailing-page flag.
fn split_title_and_page(remainder: &str) -> (Option<String>, bool) {
    let trimmed = remainder.trim();
    if trimmed.is_empty() {
        return (None, false);
    }

    if let Some(m) = TRAILING_PAGE_RE.find(trimmed) {
        let head = trimmed[..m.start()].trim();
        let title = clean_title(head);
        return (title, true);
    }

    (clean_title(trimmed), false)
}

fn clean_title(text: &str) -> Option<String> {
    let cleaned = text
        .trim_matches(|c: char| c.is_ascii_punctuation() || c == '·' || c == '…' || c == '،')
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_chapter_marker_with_ordinal() {
        let analysis = classify_line("الباب الأول: أحكام عامة");
        assert_eq!(analysis.label, LineLabel::Chapter);
        assert_eq!(analysis.meta.ordinal, Some(1));
        assert_eq!(analysis.meta.title.as_deref(), Some("احكام عامه"));
        assert!(!analysis.meta.trailing_page_number);
    }

    #[test]
    fn test_section_marker() {
        let analysis = classify_line("الفصل الثالث");
        assert_eq!(analysis.label, LineLabel::Section);
        assert_eq!(analysis.meta.ordinal, Some(3));
    }

    #[test]
    fn test_article_marker_variants() {
        for (line, expected) in [
            ("المادة الأولى", 1),
            ("المادة الخامسة عشرة", 15),
            ("المادة 15", 15),
            ("المادة: ١٥", 15),
            ("مادة رقم 15", 15),
        ] {
            let analysis = classify_line(line);
            assert_eq!(analysis.label, LineLabel::Article, "line: {line}");
            assert_eq!(analysis.meta.ordinal, Some(expected), "line: {line}");
        }
    }

    #[test]
    fn test_marker_with_unknown_ordinal_keeps_null_index() {
        let analysis = classify_line("الباب التمهيدي");
        assert_eq!(analysis.label, LineLabel::Chapter);
        assert_eq!(analysis.meta.ordinal, None);
        assert!(analysis.confidence < 0.8);
    }

    #[test]
    fn test_chapter_prefix_is_ignored() {
        let analysis = classify_line("Chapter الباب السابع عشر 47");
        assert_eq!(analysis.label, LineLabel::Ignore);
        assert_eq!(analysis.meta.ignore_reason, Some("chapter_prefix_toc"));
    }

    #[test]
    fn test_toc_entry_carries_page_number() {
        let analysis = classify_line("الباب الأول ......... 5");
        assert_eq!(analysis.label, LineLabel::Chapter);
        assert_eq!(analysis.meta.ordinal, Some(1));
        assert!(analysis.meta.trailing_page_number);
        assert_eq!(analysis.meta.title, None);
    }

    #[test]
    fn test_article_one_without_page_number() {
        let analysis = classify_line("المادة الأولى");
        assert_eq!(analysis.label, LineLabel::Article);
        assert_eq!(analysis.meta.ordinal, Some(1));
        assert!(!analysis.meta.trailing_page_number);
    }

    #[test]
    fn test_content_line() {
        let analysis = classify_line("يهدف هذا النظام إلى تنظيم العلاقة بين أطراف العقد.");
        assert_eq!(analysis.label, LineLabel::Content);
    }

    #[test]
    fn test_short_line_is_ignored() {
        let analysis = classify_line("ص5");
        assert_eq!(analysis.label, LineLabel::Ignore);
        assert_eq!(analysis.meta.ignore_reason, Some("too_short"));
    }

    #[test]
    fn test_word_boundary_does_not_half_match() {
        // "بابل" (Babylon) must not classify as a chapter marker.
        let analysis = classify_line("بابل مدينة قديمة ذات تاريخ طويل");
        assert_eq!(analysis.label, LineLabel::Content);
    }

    #[test]
    fn test_classification_is_pure() {
        let line = "المادة الثانية: التزامات صاحب العمل";
        let a = classify_line(line);
        let b = classify_line(line);
        assert_eq!(a.label, b.label);
        assert_eq!(a.meta.ordinal, b.meta.ordinal);
        assert_eq!(a.confidence, b.confidence);
    }
}
