//! Fallback pattern matcher
//!
//! Deterministic intent detection used when AI interpretation is unavailable
//! or inconclusive. Families are evaluated in a fixed priority order:
//! - expense ("beli kopi 25rb")
//! - income ("gaji 5jt")
//! - budget ("budget makanan 1 juta")
//! - balance top-up ("isi saldo gopay 100k")
//!
//! A family whose keywords are present but whose amount cannot be extracted
//! does not match, and evaluation moves on to the next family.

use crate::calculator::parse_whole_amount;
use crate::finance::{BudgetPeriod, Category, TransactionKind};
use crate::models::{Intent, PatternMatch};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Every heuristic match carries this value. It marks the fallback tier and
/// is not a calibrated probability.
pub const FALLBACK_CONFIDENCE: f32 = 0.8;

/// Words dropped from the tail of an extracted description
const FILLER_WORDS: &[&str] = &["rp", "seharga", "sebesar", "senilai", "harga", "@", "x", "buat", "untuk"];

/// Words that never name a wallet
const WALLET_STOP_WORDS: &[&str] = &["ke", "di", "sebesar", "sejumlah", "senilai", "rp", "saya", "aku", "ku"];

/// One intent family
pub trait IntentRule: Send + Sync {
    fn intent(&self) -> Intent;

    /// Keyword-presence test
    fn applies(&self, text: &str) -> bool;

    /// Extraction; `None` makes the family non-matching
    fn extract(&self, text: &str) -> Option<Map<String, Value>>;
}

/// Ordered strategy list; first applicable rule with a successful
/// extraction wins
pub struct PatternMatcher {
    rules: Vec<Box<dyn IntentRule>>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Matcher with the four built-in families in priority order
    pub fn with_default_rules() -> Self {
        let mut matcher = Self::new();
        matcher.add_rule(Box::new(TransactionRule::expense()));
        matcher.add_rule(Box::new(TransactionRule::income()));
        matcher.add_rule(Box::new(BudgetRule));
        matcher.add_rule(Box::new(TopUpRule));
        matcher
    }

    /// Appends at the lowest priority
    pub fn add_rule(&mut self, rule: Box<dyn IntentRule>) {
        self.rules.push(rule);
    }

    pub fn match_text(&self, text: &str) -> Option<PatternMatch> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }

        for rule in &self.rules {
            if !rule.applies(&lowered) {
                continue;
            }

            match rule.extract(&lowered) {
                Some(extracted_data) => {
                    debug!(intent = %rule.intent(), "pattern matched");
                    return Some(PatternMatch {
                        intent: rule.intent(),
                        confidence: FALLBACK_CONFIDENCE,
                        extracted_data,
                    });
                }
                None => {
                    debug!(intent = %rule.intent(), "keywords present but no amount, trying next family");
                }
            }
        }

        None
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

//
// ================= Built-in Families =================
//

/// Expense and income share one shape
pub struct TransactionRule {
    intent: Intent,
    kind: TransactionKind,
    /// Dropped from the description ("beli kopi" → "kopi")
    verbs: &'static [&'static str],
    /// Kept in the description ("makan siang" → "makan siang")
    nouns: &'static [&'static str],
}

impl TransactionRule {
    pub fn expense() -> Self {
        Self {
            intent: Intent::CreateExpense,
            kind: TransactionKind::Expense,
            verbs: &["beli", "bayar", "belanja", "beliin", "keluar", "pengeluaran", "habis", "spend"],
            nouns: &["jajan", "makan", "minum", "ngopi", "bensin", "parkir", "ongkir"],
        }
    }

    pub fn income() -> Self {
        Self {
            intent: Intent::CreateIncome,
            kind: TransactionKind::Income,
            verbs: &["terima", "dapat", "dapet", "masuk", "pemasukan", "income", "dikasih"],
            nouns: &["gaji", "gajian", "bonus", "thr", "jual", "jualan", "komisi"],
        }
    }

    /// Earliest keyword occurrence and whether it is a verb
    fn anchor(&self, words: &[&str]) -> Option<(usize, bool)> {
        words.iter().enumerate().find_map(|(i, word)| {
            if self.verbs.contains(word) {
                Some((i, true))
            } else if self.nouns.contains(word) {
                Some((i, false))
            } else {
                None
            }
        })
    }
}

impl IntentRule for TransactionRule {
    fn intent(&self) -> Intent {
        self.intent
    }

    fn applies(&self, text: &str) -> bool {
        self.anchor(&words(text)).is_some()
    }

    fn extract(&self, text: &str) -> Option<Map<String, Value>> {
        let amount = parse_whole_amount(text)?;
        let tokens = words(text);
        let (index, is_verb) = self.anchor(&tokens)?;

        let tail = description_after(&tokens, index);
        let description = match (is_verb, tail) {
            (true, Some(tail)) => tail,
            (false, Some(tail)) => format!("{} {}", tokens[index], tail),
            (_, None) => tokens[index].to_string(),
        };

        let category = Category::infer_or_default(text, self.kind);

        let mut data = Map::new();
        data.insert("amount".to_string(), json!(amount));
        data.insert("description".to_string(), json!(description));
        data.insert("category".to_string(), json!(category.as_str()));
        Some(data)
    }
}

pub struct BudgetRule;

impl BudgetRule {
    const KEYWORDS: &'static [&'static str] = &["budget", "anggaran", "budgetin"];
    const WEEKLY: &'static [&'static str] = &["minggu", "mingguan", "seminggu", "weekly", "pekan"];
}

impl IntentRule for BudgetRule {
    fn intent(&self) -> Intent {
        Intent::SetBudget
    }

    fn applies(&self, text: &str) -> bool {
        words(text).iter().any(|w| Self::KEYWORDS.contains(w))
    }

    fn extract(&self, text: &str) -> Option<Map<String, Value>> {
        let amount = parse_whole_amount(text)?;
        let tokens = words(text);

        let category = Category::infer_or_default(text, TransactionKind::Expense);
        let period = if tokens.iter().any(|w| Self::WEEKLY.contains(w)) {
            BudgetPeriod::Weekly
        } else {
            BudgetPeriod::Monthly
        };

        let mut data = Map::new();
        data.insert("amount".to_string(), json!(amount));
        data.insert("category".to_string(), json!(category.as_str()));
        data.insert("period".to_string(), json!(period.to_string()));
        Some(data)
    }
}

/// Needs both a top-up verb and a wallet noun
pub struct TopUpRule;

impl TopUpRule {
    const VERBS: &'static [&'static str] = &["tambah", "isi", "topup", "masukin", "setor", "nambah"];
    const TARGETS: &'static [&'static str] = &["saldo", "dompet", "wallet", "rekening"];

    fn has_verb(text: &str, tokens: &[&str]) -> bool {
        text.contains("top up") || tokens.iter().any(|w| Self::VERBS.contains(w))
    }

    /// First plain word after the wallet noun, before any number
    fn wallet(tokens: &[&str]) -> Option<String> {
        let target = tokens.iter().position(|w| Self::TARGETS.contains(w))?;

        tokens[target + 1..]
            .iter()
            .take_while(|w| !has_digit(w))
            .find(|w| !WALLET_STOP_WORDS.contains(w) && !Self::TARGETS.contains(w))
            .map(|w| w.to_string())
    }
}

impl IntentRule for TopUpRule {
    fn intent(&self) -> Intent {
        Intent::AddBalance
    }

    fn applies(&self, text: &str) -> bool {
        let tokens = words(text);
        Self::has_verb(text, &tokens) && tokens.iter().any(|w| Self::TARGETS.contains(w))
    }

    fn extract(&self, text: &str) -> Option<Map<String, Value>> {
        let amount = parse_whole_amount(text)?;

        let mut data = Map::new();
        data.insert("amount".to_string(), json!(amount));
        if let Some(wallet) = Self::wallet(&words(text)) {
            data.insert("wallet".to_string(), json!(wallet));
        }
        Some(data)
    }
}

//
// ================= Helpers =================
//

/// Whitespace tokens with surrounding punctuation trimmed
fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | '!' | '?' | ';' | ':' | '"' | '\'')))
        .filter(|w| !w.is_empty())
        .collect()
}

fn has_digit(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
}

/// Words after the anchor up to the next number, skipping a leading
/// quantity ("beli 2 kopi 25rb" → "kopi")
fn description_after(tokens: &[&str], anchor: usize) -> Option<String> {
    let mut taken: Vec<&str> = tokens[anchor + 1..]
        .iter()
        .skip_while(|w| has_digit(w))
        .take_while(|w| !has_digit(w))
        .filter(|w| w.chars().any(char::is_alphabetic))
        .copied()
        .collect();

    while taken.last().is_some_and(|w| FILLER_WORDS.contains(w)) {
        taken.pop();
    }

    (!taken.is_empty()).then(|| taken.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PatternMatcher {
        PatternMatcher::with_default_rules()
    }

    #[test]
    fn test_expense_match() {
        let m = matcher().match_text("beli kopi 25rb").unwrap();

        assert_eq!(m.intent, Intent::CreateExpense);
        assert_eq!(m.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(m.extracted_data["amount"], json!(25000));
        assert_eq!(m.extracted_data["description"], json!("kopi"));
        assert_eq!(m.extracted_data["category"], json!("food"));
    }

    #[test]
    fn test_expense_descriptions() {
        let cases = vec![
            ("beli 2 kopi 25rb", "kopi"),
            ("makan siang 35rb", "makan siang"),
            ("bensin 50rb", "bensin"),
            ("bayar listrik rp 250.000", "listrik"),
        ];

        for (text, expected) in cases {
            let m = matcher().match_text(text).unwrap();
            assert_eq!(m.intent, Intent::CreateExpense, "{}", text);
            assert_eq!(m.extracted_data["description"], json!(expected), "{}", text);
        }
    }

    #[test]
    fn test_income_match() {
        let m = matcher().match_text("Gaji bulan ini 5jt").unwrap();

        assert_eq!(m.intent, Intent::CreateIncome);
        assert_eq!(m.extracted_data["amount"], json!(5_000_000));
        assert_eq!(m.extracted_data["category"], json!("salary"));
        assert_eq!(m.extracted_data["description"], json!("gaji bulan ini"));
    }

    #[test]
    fn test_budget_match() {
        let m = matcher().match_text("budget makanan 1 juta").unwrap();

        assert_eq!(m.intent, Intent::SetBudget);
        assert_eq!(m.extracted_data["amount"], json!(1_000_000));
        assert_eq!(m.extracted_data["category"], json!("food"));
        assert_eq!(m.extracted_data["period"], json!("monthly"));

        let weekly = matcher().match_text("anggaran transport mingguan 200rb").unwrap();
        assert_eq!(weekly.extracted_data["category"], json!("transport"));
        assert_eq!(weekly.extracted_data["period"], json!("weekly"));
    }

    #[test]
    fn test_top_up_match() {
        let m = matcher().match_text("isi saldo gopay 100k").unwrap();
        assert_eq!(m.intent, Intent::AddBalance);
        assert_eq!(m.extracted_data["amount"], json!(100_000));
        assert_eq!(m.extracted_data["wallet"], json!("gopay"));

        let m = matcher().match_text("tambah saldo 100rb").unwrap();
        assert_eq!(m.intent, Intent::AddBalance);
        assert!(m.extracted_data.get("wallet").is_none());

        let m = matcher().match_text("top up dompet ke ovo 50rb").unwrap();
        assert_eq!(m.extracted_data["wallet"], json!("ovo"));
    }

    #[test]
    fn test_priority_expense_first() {
        let m = matcher().match_text("beli tiket pakai budget 200rb").unwrap();
        assert_eq!(m.intent, Intent::CreateExpense);
    }

    #[test]
    fn test_missing_amount_is_not_a_match() {
        assert!(matcher().match_text("beli kopi").is_none());
        assert!(matcher().match_text("isi saldo").is_none());
        // verb without wallet noun is not a top-up
        assert!(matcher().match_text("tambah 50rb").is_none());
    }

    #[test]
    fn test_no_keywords() {
        assert!(matcher().match_text("halo apa kabar").is_none());
        assert!(matcher().match_text("").is_none());
        assert!(matcher().match_text("5kg @ 10rb").is_none());
    }

    struct SavingsRule;

    impl IntentRule for SavingsRule {
        fn intent(&self) -> Intent {
            Intent::AddBalance
        }

        fn applies(&self, text: &str) -> bool {
            text.contains("nabung")
        }

        fn extract(&self, text: &str) -> Option<Map<String, Value>> {
            let mut data = Map::new();
            data.insert("amount".to_string(), json!(parse_whole_amount(text)?));
            data.insert("wallet".to_string(), json!("tabungan"));
            Some(data)
        }
    }

    #[test]
    fn test_custom_rule_appended() {
        let mut matcher = matcher();
        assert!(matcher.match_text("nabung 500rb").is_none());

        matcher.add_rule(Box::new(SavingsRule));
        let m = matcher.match_text("nabung 500rb").unwrap();
        assert_eq!(m.intent, Intent::AddBalance);
        assert_eq!(m.extracted_data["wallet"], json!("tabungan"));
    }
}
