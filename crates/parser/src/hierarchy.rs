//! Hierarchy reconstruction.
//!
//! A single linear pass over the classified (and TOC-suppressed) lines
//! builds the Document -> Chapters -> Sections -> Articles tree. Content
//! lines attach to the most recent article; content with no article to
//! attach to is dropped with a diagnostic.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::classify::{LineAnalysis, LineLabel};
use crate::normalize::{NormalizerOptions, normalize_str};

/// A parsed article, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedArticle {
    /// Article number as written (normalized), or the resolved integer when
    /// only a numeric form appeared.
    pub number: Option<String>,
    pub title: Option<String>,
    pub body: String,
    /// 1-based position in document reading order.
    pub order_index: u32,
    pub warnings: Vec<String>,
}

/// A parsed section and its articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSection {
    /// 1-based index within the owning chapter.
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
    pub articles: Vec<ParsedArticle>,
}

/// A parsed chapter, its sections, and any articles attached directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedChapter {
    /// 1-based index within the document.
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
    pub sections: Vec<ParsedSection>,
    pub articles: Vec<ParsedArticle>,
}

/// A per-line note recorded while reconstructing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line_no: usize,
    pub kind: String,
    pub detail: String,
}

impl Diagnostic {
    fn new(line_no: usize, kind: &str, detail: impl Into<String>) -> Self {
        Self {
            line_no,
            kind: kind.to_string(),
            detail: detail.into(),
        }
    }
}

/// The reconstructed document tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub chapters: Vec<ParsedChapter>,
    /// Articles with no chapter or section above them; they attach to the
    /// document directly.
    pub orphan_articles: Vec<ParsedArticle>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedDocument {
    /// Total number of articles across the whole tree.
    pub fn article_count(&self) -> usize {
        let in_chapters: usize = self
            .chapters
            .iter()
            .map(|c| {
                c.articles.len() + c.sections.iter().map(|s| s.articles.len()).sum::<usize>()
            })
            .sum();
        in_chapters + self.orphan_articles.len()
    }

    /// Iterate all articles in reading order with their container indices
    /// `(chapter_index, section_index, article)`.
    pub fn articles_in_order(&self) -> Vec<(Option<u32>, Option<u32>, &ParsedArticle)> {
        let mut all = Vec::new();
        for article in &self.orphan_articles {
            all.push((None, None, article));
        }
        for chapter in &self.chapters {
            for article in &chapter.articles {
                all.push((Some(chapter.index), None, article));
            }
            for section in &chapter.sections {
                for article in &section.articles {
                    all.push((Some(chapter.index), Some(section.index), article));
                }
            }
        }
        all.sort_by_key(|(_, _, article)| article.order_index);
        all
    }
}

// Where a freshly closed article should be filed.
enum ArticleSlot {
    Orphan,
    Chapter,
    Section,
}

struct Reconstructor {
    document: ParsedDocument,
    current_chapter: Option<ParsedChapter>,
    current_section: Option<ParsedSection>,
    current_article: Option<(ParsedArticle, ArticleSlot)>,
    /// Articles seen since the current chapter opened; drives the
    /// adjacent-chapter tie-break.
    articles_since_chapter: usize,
    next_order_index: u32,
    seen_numbers: Vec<String>,
}

impl Reconstructor {
    fn new() -> Self {
        Self {
            document: ParsedDocument::default(),
            current_chapter: None,
            current_section: None,
            current_article: None,
            articles_since_chapter: 0,
            next_order_index: 1,
            seen_numbers: Vec::new(),
        }
    }

    fn finish_article(&mut self) {
        let Some((article, slot)) = self.current_article.take() else {
            return;
        };
        match slot {
            ArticleSlot::Section => {
                if let Some(section) = self.current_section.as_mut() {
                    section.articles.push(article);
                }
            }
            ArticleSlot::Chapter => {
                if let Some(chapter) = self.current_chapter.as_mut() {
                    chapter.articles.push(article);
                }
            }
            ArticleSlot::Orphan => self.document.orphan_articles.push(article),
        }
    }

    fn finish_section(&mut self) {
        self.finish_article();
        if let Some(section) = self.current_section.take()
            && let Some(chapter) = self.current_chapter.as_mut()
        {
            chapter.sections.push(section);
        }
    }

    fn finish_chapter(&mut self) {
        self.finish_section();
        if let Some(chapter) = self.current_chapter.take() {
            self.document.chapters.push(chapter);
        }
    }

    fn open_chapter(&mut self, line: &LineAnalysis) {
        // Adjacent chapter markers with no article between them: the second
        // replaces the first.
        if self.current_chapter.is_some()
            && self.articles_since_chapter == 0
            && self.current_section.is_none()
        {
            let discarded = self.current_chapter.take();
            if let Some(chapter) = discarded {
                self.document.diagnostics.push(Diagnostic::new(
                    line.line_no,
                    "chapter_without_content",
                    format!("chapter '{}' replaced before any article", chapter.label),
                ));
            }
        } else {
            self.finish_chapter();
        }

        let index = self.document.chapters.len() as u32 + 1;
        self.current_chapter = Some(ParsedChapter {
            index,
            label: line.original.trim().to_string(),
            title: line.meta.title.clone(),
            sections: Vec::new(),
            articles: Vec::new(),
        });
        self.current_section = None;
        self.articles_since_chapter = 0;
        trace!(line = line.line_no, index, "opened chapter");
    }

    fn open_section(&mut self, line: &LineAnalysis) {
        self.finish_section();

        // A section with no chapter above it gets a synthetic anonymous one.
        if self.current_chapter.is_none() {
            let index = self.document.chapters.len() as u32 + 1;
            self.current_chapter = Some(ParsedChapter {
                index,
                label: String::new(),
                title: None,
                sections: Vec::new(),
                articles: Vec::new(),
            });
            self.articles_since_chapter = 0;
            self.document.diagnostics.push(Diagnostic::new(
                line.line_no,
                "synthetic_chapter",
                "section marker before any chapter",
            ));
        }

        let index = self
            .current_chapter
            .as_ref()
            .map_or(0, |c| c.sections.len() as u32)
            + 1;
        self.current_section = Some(ParsedSection {
            index,
            label: line.original.trim().to_string(),
            title: line.meta.title.clone(),
            articles: Vec::new(),
        });
        trace!(line = line.line_no, index, "opened section");
    }

    fn open_article(&mut self, line: &LineAnalysis) {
        self.finish_article();

        let number = line
            .meta
            .number_text
            .clone()
            .or_else(|| line.meta.ordinal.map(|n| n.to_string()));

        let mut warnings = Vec::new();
        if let Some(number) = &number {
            if self.seen_numbers.contains(number) {
                warnings.push("duplicate_article_number".to_string());
                self.document.diagnostics.push(Diagnostic::new(
                    line.line_no,
                    "duplicate_article_number",
                    format!("article number '{number}' seen before"),
                ));
            } else {
                self.seen_numbers.push(number.clone());
            }
        }

        let slot = if self.current_section.is_some() {
            ArticleSlot::Section
        } else if self.current_chapter.is_some() {
            ArticleSlot::Chapter
        } else {
            ArticleSlot::Orphan
        };

        let article = ParsedArticle {
            number,
            title: line.meta.title.clone(),
            body: String::new(),
            order_index: self.next_order_index,
            warnings,
        };
        self.next_order_index += 1;
        self.articles_since_chapter += 1;
        self.current_article = Some((article, slot));
    }

    fn append_content(&mut self, line: &LineAnalysis) {
        match self.current_article.as_mut() {
            Some((article, _)) => {
                // Bodies keep the display profile (taa marbuta intact); the
                // embedding service re-normalizes for search on its own.
                let display = normalize_str(&line.original, &NormalizerOptions::display());
                if !article.body.is_empty() {
                    article.body.push(' ');
                }
                article.body.push_str(&display);
            }
            None => {
                self.document.diagnostics.push(Diagnostic::new(
                    line.line_no,
                    "dropped_content",
                    "content line with no open article",
                ));
            }
        }
    }

    fn into_document(mut self) -> ParsedDocument {
        self.finish_chapter();
        self.document
    }
}

/// Build the document tree from classified, TOC-suppressed lines.
pub fn reconstruct(lines: &[LineAnalysis]) -> ParsedDocument {
    let mut state = Reconstructor::new();

    for line in lines {
        match line.label {
            LineLabel::Ignore => {}
            LineLabel::Chapter => state.open_chapter(line),
            LineLabel::Section => state.open_section(line),
            LineLabel::Article => state.open_article(line),
            LineLabel::Content => state.append_content(line),
        }
    }

    state.into_document()
}
