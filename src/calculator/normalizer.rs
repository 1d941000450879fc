//! Vernacular expression normalizer
//!
//! Rewrites informal Indonesian number and operator notation into a canonical
//! arithmetic string: plain decimal numbers, `*`, `+` and `-` operators
//! separated by single spaces. The output is a fixed point of [`normalize`].
//!
//! Order of passes:
//! 1. currency prefix (`rp`, `rp.`) removal
//! 2. decimal comma and thousand-separator dots
//! 3. magnitude suffixes (`rb`, `ribu`, `k`, `jt`, `juta`, `miliar`)
//! 4. operator synonyms (`x`, `×`, `@`, `kali`, `per`, `tambah`, `kurang`, ...)
//! 5. unit-of-measure tokens directly after a number
//!
//! Suffix expansion runs after decimal normalization so that "1,5jt" reads as
//! one and a half million.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Canonical multiply token
pub const MULTIPLY: &str = "*";

/// Units stripped after a number, longest spelling first within each family
pub(crate) const UNIT_PATTERN: &str = "kg|kilo|gram|gr|g|ons|liter|ltr|l|ml|pcs|pc|buah|biji|bungkus|bks|porsi|botol|kotak|pack|lembar|unit|ekor|gelas|cup";

/// Magnitude suffixes, longest spelling first
pub(crate) const SUFFIX_PATTERN: &str = "miliar|milyar|juta|jt|ribu|rb|k";

lazy_static! {
    static ref CURRENCY_PREFIX_RE: Regex = Regex::new(r"\brp\.?\s*(\d)").unwrap();
    static ref SEPARATED_NUMBER_RE: Regex = Regex::new(r"\d+(?:[.,]\d+)+").unwrap();
    static ref SUFFIX_RE: Regex =
        Regex::new(&format!(r"(\d+(?:\.\d+)?)\s*({})\b", SUFFIX_PATTERN)).unwrap();
    static ref X_TOKEN_RE: Regex = Regex::new(r"\s*[x×]\s*").unwrap();
    static ref MULTIPLY_RE: Regex =
        Regex::new(r"\s*(?:@|×|\*|\bkali\b|\bper\b|\bx\b)\s*").unwrap();
    static ref PLUS_WORD_RE: Regex = Regex::new(r"\b(?:tambah|plus)\b").unwrap();
    static ref MINUS_WORD_RE: Regex = Regex::new(r"\b(?:kurang|minus)\b").unwrap();
    static ref PLUS_RE: Regex = Regex::new(r"\s*\+\s*").unwrap();
    static ref HYPHEN_RE: Regex = Regex::new(r"\s*-\s*").unwrap();
    static ref UNIT_RE: Regex =
        Regex::new(&format!(r"(\d)\s*(?:{})\b", UNIT_PATTERN)).unwrap();
}

/// Magnitude multiplier for a suffix token
pub(crate) fn suffix_multiplier(suffix: &str) -> Option<Decimal> {
    match suffix {
        "k" | "rb" | "ribu" => Some(Decimal::from(1_000)),
        "jt" | "juta" => Some(Decimal::from(1_000_000)),
        "miliar" | "milyar" => Some(Decimal::from(1_000_000_000i64)),
        _ => None,
    }
}

/// Render a decimal without trailing zeros ("1500.00" → "1500")
pub(crate) fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Normalize vernacular notation into canonical arithmetic form
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let stripped = CURRENCY_PREFIX_RE.replace_all(&lowered, "${1}");
    let separated = SEPARATED_NUMBER_RE.replace_all(&stripped, |caps: &Captures| {
        normalize_separators(&caps[0])
    });
    let expanded = expand_suffixes(&separated);
    let operators = canonicalize_operators(&expanded);
    let unitless = UNIT_RE.replace_all(&operators, "${1}");

    unitless.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decimal comma to point, then drop dots acting as thousand separators
fn normalize_separators(token: &str) -> String {
    let dotted = token.replace(',', ".");
    let mut parts = dotted.split('.');
    let mut out = parts.next().unwrap_or_default().to_string();

    for part in parts {
        // Each part is a maximal digit run, so a length of three means
        // "exactly three digits with no further digits".
        if part.len() != 3 {
            out.push('.');
        }
        out.push_str(part);
    }

    out
}

fn expand_suffixes(text: &str) -> String {
    SUFFIX_RE
        .replace_all(text, |caps: &Captures| {
            let number = Decimal::from_str(&caps[1]).ok();
            let multiplier = suffix_multiplier(&caps[2]);

            match (number, multiplier) {
                (Some(n), Some(m)) => match n.checked_mul(m) {
                    Some(value) => format_decimal(value.round_dp(2)),
                    None => caps[0].to_string(),
                },
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn canonicalize_operators(text: &str) -> String {
    // "3x5000": x glued between digits
    let current = replace_operator(text, &X_TOKEN_RE, " * ", |before, after, _| {
        is_digit(before) && is_digit(after)
    });

    let current = MULTIPLY_RE.replace_all(&current, " * ");
    let current = PLUS_WORD_RE.replace_all(&current, "+");
    let current = MINUS_WORD_RE.replace_all(&current, "-");
    let current = PLUS_RE.replace_all(&current, " + ");

    // A hyphen is subtraction when each side is a digit or whitespace;
    // "e-wallet" stays intact
    replace_operator(&current, &HYPHEN_RE, " - ", |before, after, token| {
        (token.starts_with(char::is_whitespace) || is_digit(before))
            && (token.ends_with(char::is_whitespace) || is_digit(after))
    })
}

/// Single pass over operator tokens; `accept` sees the characters around
/// the token and the token itself
fn replace_operator<F>(text: &str, token_re: &Regex, replacement: &str, accept: F) -> String
where
    F: Fn(Option<char>, Option<char>, &str) -> bool,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for token in token_re.find_iter(text) {
        let before = text[..token.start()].chars().next_back();
        let after = text[token.end()..].chars().next();

        out.push_str(&text[last..token.start()]);
        if accept(before, after, token.as_str()) {
            out.push_str(replacement);
        } else {
            out.push_str(token.as_str());
        }
        last = token.end();
    }
    out.push_str(&text[last..]);

    out
}

fn is_digit(c: Option<char>) -> bool {
    c.map_or(false, |c| c.is_ascii_digit())
}
