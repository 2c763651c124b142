//! Hierarchical Arabic legal document parser.
//!
//! Turns the linearized text of a legal document (PDF- or DOCX-extracted)
//! back into its nested structure: Document -> Chapters (أبواب) ->
//! Sections (فصول) -> Articles (مواد) -> article bodies. Headers, footers,
//! and tables of contents are rejected along the way.
//!
//! The pipeline is: [`normalize`] each line, [`classify`] it in isolation,
//! let the [`toc`] detector suppress front-matter regions, then let
//! [`hierarchy`] rebuild the tree in one linear pass.

pub mod classify;
pub mod hierarchy;
pub mod normalize;
pub mod ordinal;
pub mod toc;

use qanun_core::config::ParserConfig;

pub use classify::{Classifier, LineAnalysis, LineLabel, classify_line};
pub use hierarchy::{Diagnostic, ParsedArticle, ParsedChapter, ParsedDocument, ParsedSection};
pub use normalize::{NormalizedText, NormalizerOptions, normalize, normalize_str};
pub use toc::TocDetector;

/// Parse a whole document: classify lines, suppress TOC regions, rebuild
/// the hierarchy.
pub fn parse_document(text: &str, config: &ParserConfig) -> ParsedDocument {
    let classifier = Classifier::from_config(config);
    let mut lines: Vec<LineAnalysis> = text
        .lines()
        .enumerate()
        .map(|(i, line)| classifier.classify(i + 1, line))
        .collect();

    let detector = TocDetector::from_config(config);
    let regions = detector.suppress(&mut lines);

    let mut document = hierarchy::reconstruct(&lines);
    for region in regions {
        document.diagnostics.push(Diagnostic {
            line_no: region.start + 1,
            kind: "toc_region".to_string(),
            detail: format!("lines {}..{} suppressed", region.start + 1, region.end + 1),
        });
    }
    document
}
