//! Arabic ordinal resolution for chapter, section, and article markers.
//!
//! One table maps ordinal spellings (masculine and feminine, with and
//! without the definite article, hamza-spelling tolerant via the
//! normalizer) plus numeric forms to an integer. Coverage is 1-29; unknown
//! spellings fall through to numeric extraction.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::{NormalizerOptions, normalize_str};

const UNITS_MASCULINE: [&str; 10] = [
    "اول", "ثاني", "ثالث", "رابع", "خامس", "سادس", "سابع", "ثامن", "تاسع", "عاشر",
];
const UNITS_FEMININE: [&str; 10] = [
    "اولى", "ثانية", "ثالثة", "رابعة", "خامسة", "سادسة", "سابعة", "ثامنة", "تاسعة", "عاشرة",
];
// Unit words used inside compounds (11-19, 21-29); "حادي" replaces "اول".
const COMPOUND_MASCULINE: [&str; 9] = [
    "حادي", "ثاني", "ثالث", "رابع", "خامس", "سادس", "سابع", "ثامن", "تاسع",
];
const COMPOUND_FEMININE: [&str; 9] = [
    "حادية", "ثانية", "ثالثة", "رابعة", "خامسة", "سادسة", "سابعة", "ثامنة", "تاسعة",
];

static ORDINALS: LazyLock<HashMap<String, u32>> = LazyLock::new(build_table);

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| compiled(r"\d+"));

#[allow(clippy::unwrap_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn build_table() -> HashMap<String, u32> {
    let mut table = HashMap::new();

    for (i, (masculine, feminine)) in UNITS_MASCULINE.iter().zip(UNITS_FEMININE).enumerate() {
        let value = i as u32 + 1;
        insert(&mut table, masculine, value);
        insert(&mut table, feminine, value);
    }

    for (i, (masculine, feminine)) in COMPOUND_MASCULINE.iter().zip(COMPOUND_FEMININE).enumerate() {
        let value = i as u32 + 11;
        insert(&mut table, &format!("{masculine} عشر"), value);
        insert(&mut table, &format!("{feminine} عشرة"), value);
    }

    insert(&mut table, "عشرون", 20);
    insert(&mut table, "عشرين", 20);

    for (i, (masculine, feminine)) in COMPOUND_MASCULINE.iter().zip(COMPOUND_FEMININE).enumerate() {
        let value = i as u32 + 21;
        for tens in ["والعشرون", "والعشرين", "وعشرون", "وعشرين"] {
            insert(&mut table, &format!("{masculine} {tens}"), value);
            insert(&mut table, &format!("{feminine} {tens}"), value);
        }
    }

    table
}

// Keys are stored pre-normalized under both folding profiles so lookups
// succeed whichever profile classified the line.
fn insert(table: &mut HashMap<String, u32>, spelling: &str, value: u32) {
    for with_article in [false, true] {
        let spelled = if with_article {
            format!("ال{spelling}")
        } else {
            spelling.to_string()
        };
        for options in [NormalizerOptions::search(), NormalizerOptions::display()] {
            table.insert(normalize_str(&spelled, &options), value);
        }
    }
}

/// Resolve an exact (already normalized) ordinal phrase.
pub fn lookup(phrase: &str) -> Option<u32> {
    ORDINALS.get(phrase).copied()
}

/// Resolve an ordinal at the start of `rest`, preferring the longest match.
///
/// Returns the value and the number of whitespace words consumed. Falls back
/// to a leading numeric word. Returns `None` when `rest` opens with neither.
pub fn resolve_prefix(rest: &str) -> Option<(u32, usize)> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let max_words = words.len().min(3);
    for take in (1..=max_words).rev() {
        let phrase = words[..take].join(" ");
        let phrase = phrase
            .trim_matches(|c: char| c.is_ascii_punctuation() || c == '،' || c == '؛')
            .trim();
        if let Some(value) = lookup(phrase) {
            return Some((value, take));
        }
    }

    let first = words[0].trim_matches(|c: char| c.is_ascii_punctuation() || c == '،' || c == '؛');
    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        return first.parse().ok().map(|value| (value, 1));
    }

    None
}

/// Extract the first numeric substring anywhere in `text`.
pub fn extract_numeric(text: &str) -> Option<u32> {
    NUMERIC_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::normalize::{NormalizerOptions, normalize_str};

    fn resolve(raw: &str) -> Option<u32> {
        let normalized = normalize_str(raw, &NormalizerOptions::search());
        lookup(&normalized)
    }

    #[test]
    fn test_basic_ordinals() {
        assert_eq!(resolve("الأول"), Some(1));
        assert_eq!(resolve("الأولى"), Some(1));
        assert_eq!(resolve("الثاني"), Some(2));
        assert_eq!(resolve("الثانية"), Some(2));
        assert_eq!(resolve("العاشر"), Some(10));
        assert_eq!(resolve("العاشرة"), Some(10));
    }

    #[test]
    fn test_ordinals_without_article() {
        assert_eq!(resolve("أولى"), Some(1));
        assert_eq!(resolve("خامس"), Some(5));
    }

    #[test]
    fn test_compound_teens() {
        assert_eq!(resolve("الحادي عشر"), Some(11));
        assert_eq!(resolve("الحادية عشرة"), Some(11));
        assert_eq!(resolve("الخامسة عشرة"), Some(15));
        assert_eq!(resolve("التاسع عشر"), Some(19));
    }

    #[test]
    fn test_twenties() {
        assert_eq!(resolve("العشرون"), Some(20));
        assert_eq!(resolve("الحادية والعشرون"), Some(21));
        assert_eq!(resolve("الحادي والعشرون"), Some(21));
        assert_eq!(resolve("التاسعة والعشرين"), Some(29));
    }

    #[test]
    fn test_hamza_and_maqsura_spellings_match() {
        // Bare-alef and alef-maqsura spellings resolve identically.
        assert_eq!(resolve("الاولى"), Some(1));
        assert_eq!(resolve("الاولي"), Some(1));
    }

    #[test]
    fn test_resolve_prefix_consumes_longest() {
        let rest = normalize_str("الحادية والعشرون فسخ العقد", &NormalizerOptions::search());
        assert_eq!(resolve_prefix(&rest), Some((21, 2)));

        let rest = normalize_str("الثالثة التعريفات", &NormalizerOptions::search());
        assert_eq!(resolve_prefix(&rest), Some((3, 1)));
    }

    #[test]
    fn test_resolve_prefix_numeric() {
        assert_eq!(resolve_prefix("15 فسخ العقد"), Some((15, 1)));
        assert_eq!(resolve_prefix("15."), Some((15, 1)));
    }

    #[test]
    fn test_resolve_prefix_unknown() {
        assert_eq!(resolve_prefix("التمهيدي"), None);
        assert_eq!(resolve_prefix(""), None);
    }

    #[test]
    fn test_extract_numeric() {
        assert_eq!(extract_numeric("صفحة 47 من 90"), Some(47));
        assert_eq!(extract_numeric("بدون رقم"), None);
    }
}
