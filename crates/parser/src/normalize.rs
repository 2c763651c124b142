//! Arabic text normalization.
//!
//! The same transformation is applied to classifier input, embedding input,
//! and query text: presentation forms fold to base letters, diacritics and
//! tatweel are stripped, alef/yaa/taa variants collapse, Eastern Arabic
//! digits become ASCII, and whitespace runs collapse to single spaces.
//!
//! The normalizer keeps an offset map from normalized characters back to
//! byte positions in the original string, so downstream consumers can carry
//! original spans for display while matching on normalized text.

use serde::{Deserialize, Serialize};

use qanun_core::config::ParserConfig;

/// Which optional folds to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerOptions {
    /// Fold taa marbuta (ة) to haa (ه).
    pub fold_taa_marbuta: bool,
    /// Fold final yaa / alef maqsura (ى) to yaa (ي).
    pub fold_yaa_final: bool,
}

impl NormalizerOptions {
    /// Search-side profile: both folds on. Used for classification,
    /// embedding input, and query text.
    pub fn search() -> Self {
        Self {
            fold_taa_marbuta: true,
            fold_yaa_final: true,
        }
    }

    /// Display-side profile: taa marbuta preserved.
    pub fn display() -> Self {
        Self {
            fold_taa_marbuta: false,
            fold_yaa_final: true,
        }
    }

    /// Profile driven by the parser configuration.
    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            fold_taa_marbuta: config.normalize_taa_marbuta,
            fold_yaa_final: config.normalize_yaa_final,
        }
    }
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self::search()
    }
}

/// Normalized text plus a map back into the original string.
///
/// `offsets[i]` is the byte offset in the original input of the character
/// that produced the i-th char of `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub offsets: Vec<usize>,
}

impl NormalizedText {
    /// Byte offset in the original input for the i-th normalized char.
    pub fn original_offset(&self, char_index: usize) -> Option<usize> {
        self.offsets.get(char_index).copied()
    }
}

/// Normalize `input`, producing the folded text and its offset map.
pub fn normalize(input: &str, options: &NormalizerOptions) -> NormalizedText {
    let mut text = String::with_capacity(input.len());
    let mut offsets = Vec::with_capacity(input.len());
    // Byte offset of the first whitespace char in a pending run, if any.
    let mut pending_space: Option<usize> = None;

    for (byte_offset, raw) in input.char_indices() {
        let folded = fold_presentation(raw);
        match folded {
            Some(replacement) => {
                for ch in replacement.chars() {
                    push_char(ch, byte_offset, options, &mut text, &mut offsets, &mut pending_space);
                }
            }
            None => {
                push_char(raw, byte_offset, options, &mut text, &mut offsets, &mut pending_space);
            }
        }
    }

    NormalizedText { text, offsets }
}

/// Normalize and return only the folded text.
pub fn normalize_str(input: &str, options: &NormalizerOptions) -> String {
    normalize(input, options).text
}

fn push_char(
    ch: char,
    byte_offset: usize,
    options: &NormalizerOptions,
    text: &mut String,
    offsets: &mut Vec<usize>,
    pending_space: &mut Option<usize>,
) {
    if ch.is_whitespace() {
        if pending_space.is_none() {
            *pending_space = Some(byte_offset);
        }
        return;
    }
    if is_stripped(ch) {
        return;
    }

    let mapped = match ch {
        // Alef variants, including madda, hamza forms, and wasla.
        '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' => '\u{0627}',
        // Alef maqsura to yaa.
        '\u{0649}' if options.fold_yaa_final => '\u{064A}',
        // Taa marbuta to haa.
        '\u{0629}' if options.fold_taa_marbuta => '\u{0647}',
        // Eastern Arabic digits.
        '\u{0660}'..='\u{0669}' => digit_from(ch, '\u{0660}'),
        // Extended (Persian-style) digits that appear in mixed sources.
        '\u{06F0}'..='\u{06F9}' => digit_from(ch, '\u{06F0}'),
        other => other,
    };

    // Flush a collapsed space only between retained characters, which also
    // trims leading whitespace for free.
    if let Some(space_offset) = pending_space.take()
        && !text.is_empty()
    {
        text.push(' ');
        offsets.push(space_offset);
    }

    text.push(mapped);
    offsets.push(byte_offset);
}

fn digit_from(ch: char, zero: char) -> char {
    let value = (ch as u32).saturating_sub(zero as u32);
    char::from_u32('0' as u32 + value).unwrap_or(ch)
}

/// Characters removed entirely: tashkil, tatweel, Quranic annotation signs,
/// and zero-width/directional controls that PDF extraction leaves behind.
fn is_stripped(ch: char) -> bool {
    matches!(ch,
        // Fathatan through sukun, plus the combining range around them.
        '\u{064B}'..='\u{065F}'
        // Superscript alef.
        | '\u{0670}'
        // Arabic annotation signs.
        | '\u{0610}'..='\u{061A}'
        // Tatweel (kashida).
        | '\u{0640}'
        // Zero-width and directional controls.
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{FEFF}'
    )
}

/// Fold Arabic Presentation Forms to their canonical spellings.
///
/// Forms-B (U+FE70..U+FEFF) is covered completely; Forms-A coverage is the
/// lam-alef ligatures plus the word ligatures that occur in legal corpora.
/// Returns `None` for characters that need no folding.
fn fold_presentation(ch: char) -> Option<&'static str> {
    let folded = match ch {
        // Spacing diacritic forms; stripped later with their combining twins.
        '\u{FE70}' | '\u{FE71}' => "\u{064B}",
        '\u{FE72}' => "\u{064C}",
        '\u{FE74}' => "\u{064D}",
        '\u{FE76}' | '\u{FE77}' => "\u{064E}",
        '\u{FE78}' | '\u{FE79}' => "\u{064F}",
        '\u{FE7A}' | '\u{FE7B}' => "\u{0650}",
        '\u{FE7C}' | '\u{FE7D}' => "\u{0651}",
        '\u{FE7E}' | '\u{FE7F}' => "\u{0652}",
        // Hamza and hamza carriers.
        '\u{FE80}' => "\u{0621}",
        '\u{FE81}' | '\u{FE82}' => "\u{0622}",
        '\u{FE83}' | '\u{FE84}' => "\u{0623}",
        '\u{FE85}' | '\u{FE86}' => "\u{0624}",
        '\u{FE87}' | '\u{FE88}' => "\u{0625}",
        '\u{FE89}'..='\u{FE8C}' => "\u{0626}",
        '\u{FE8D}' | '\u{FE8E}' => "\u{0627}",
        // Base letters, four positional forms each.
        '\u{FE8F}'..='\u{FE92}' => "\u{0628}",
        '\u{FE93}' | '\u{FE94}' => "\u{0629}",
        '\u{FE95}'..='\u{FE98}' => "\u{062A}",
        '\u{FE99}'..='\u{FE9C}' => "\u{062B}",
        '\u{FE9D}'..='\u{FEA0}' => "\u{062C}",
        '\u{FEA1}'..='\u{FEA4}' => "\u{062D}",
        '\u{FEA5}'..='\u{FEA8}' => "\u{062E}",
        '\u{FEA9}' | '\u{FEAA}' => "\u{062F}",
        '\u{FEAB}' | '\u{FEAC}' => "\u{0630}",
        '\u{FEAD}' | '\u{FEAE}' => "\u{0631}",
        '\u{FEAF}' | '\u{FEB0}' => "\u{0632}",
        '\u{FEB1}'..='\u{FEB4}' => "\u{0633}",
        '\u{FEB5}'..='\u{FEB8}' => "\u{0634}",
        '\u{FEB9}'..='\u{FEBC}' => "\u{0635}",
        '\u{FEBD}'..='\u{FEC0}' => "\u{0636}",
        '\u{FEC1}'..='\u{FEC4}' => "\u{0637}",
        '\u{FEC5}'..='\u{FEC8}' => "\u{0638}",
        '\u{FEC9}'..='\u{FECC}' => "\u{0639}",
        '\u{FECD}'..='\u{FED0}' => "\u{063A}",
        '\u{FED1}'..='\u{FED4}' => "\u{0641}",
        '\u{FED5}'..='\u{FED8}' => "\u{0642}",
        '\u{FED9}'..='\u{FEDC}' => "\u{0643}",
        '\u{FEDD}'..='\u{FEE0}' => "\u{0644}",
        '\u{FEE1}'..='\u{FEE4}' => "\u{0645}",
        '\u{FEE5}'..='\u{FEE8}' => "\u{0646}",
        '\u{FEE9}'..='\u{FEEC}' => "\u{0647}",
        '\u{FEED}' | '\u{FEEE}' => "\u{0648}",
        '\u{FEEF}' | '\u{FEF0}' => "\u{0649}",
        '\u{FEF1}'..='\u{FEF4}' => "\u{064A}",
        // Lam-alef ligatures.
        '\u{FEF5}' | '\u{FEF6}' => "\u{0644}\u{0622}",
        '\u{FEF7}' | '\u{FEF8}' => "\u{0644}\u{0623}",
        '\u{FEF9}' | '\u{FEFA}' => "\u{0644}\u{0625}",
        '\u{FEFB}' | '\u{FEFC}' => "\u{0644}\u{0627}",
        // Word ligatures (Forms-A).
        '\u{FDF2}' => "\u{0627}\u{0644}\u{0644}\u{0647}",
        '\u{FDFB}' => "\u{062C}\u{0644} \u{062C}\u{0644}\u{0627}\u{0644}\u{0647}",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn search(input: &str) -> String {
        normalize_str(input, &NormalizerOptions::search())
    }

    #[test]
    fn test_diacritics_are_stripped() {
        assert_eq!(search("الْمَادَّةُ"), "الماده");
    }

    #[test]
    fn test_alef_variants_collapse() {
        assert_eq!(search("أحكام"), "احكام");
        assert_eq!(search("إجراءات"), "اجراءات");
        assert_eq!(search("آثار"), "اثار");
    }

    #[test]
    fn test_yaa_and_taa_folds() {
        assert_eq!(search("الأولى"), "الاولي");
        assert_eq!(search("المادة"), "الماده");
    }

    #[test]
    fn test_display_profile_keeps_taa_marbuta() {
        assert_eq!(
            normalize_str("المادة", &NormalizerOptions::display()),
            "المادة"
        );
    }

    #[test]
    fn test_eastern_digits_become_ascii() {
        assert_eq!(search("المادة ١٥"), "الماده 15");
        assert_eq!(search("۱۲۳"), "123");
    }

    #[test]
    fn test_whitespace_collapses_and_trims() {
        assert_eq!(search("  الباب   الأول \t "), "الباب الاول");
    }

    #[test]
    fn test_tatweel_removed() {
        assert_eq!(search("فـــصـــل"), "فصل");
    }

    #[test]
    fn test_presentation_forms_fold() {
        // "العقد" spelled with Forms-B positional variants.
        assert_eq!(search("\u{FE8D}\u{FEDF}\u{FECC}\u{FED8}\u{FEAA}"), "العقد");
        // Lam-alef ligature inside a word.
        assert_eq!(search("اﻷولى"), "الاولي");
    }

    #[test]
    fn test_idempotence() {
        let options = NormalizerOptions::search();
        let inputs = [
            "الْبَابُ الأَوَّلُ: أَحْكَامٌ عَامَّةٌ",
            "المادة ١٥ ـــ فسخ العقد",
            "  نصٌ   بمسافاتٍ  ",
        ];
        for input in inputs {
            let once = normalize_str(input, &options);
            let twice = normalize_str(&once, &options);
            assert_eq!(once, twice, "normalization must be idempotent for {input}");
        }
    }

    #[test]
    fn test_offset_map_points_into_original() {
        let input = "  المَادة الأولى";
        let normalized = normalize(input, &NormalizerOptions::search());
        assert_eq!(normalized.text.chars().count(), normalized.offsets.len());
        // Every offset must land on a char boundary of the original.
        for &offset in &normalized.offsets {
            assert!(input.is_char_boundary(offset));
        }
        // First normalized char maps past the leading whitespace.
        assert_eq!(normalized.original_offset(0), Some(2));
    }

    #[test]
    fn test_mixed_script_tolerated() {
        assert_eq!(search("Chapter الباب الأول 5"), "Chapter الباب الاول 5");
    }
}
