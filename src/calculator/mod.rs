//! Expression calculator for vernacular price notation
//!
//! Evaluates normalized expressions such as `5 * 10000 + 2 * 3500` into line
//! items and an exact decimal total. Used standalone (the `calculate` tool and
//! the `/calc` command) and as the amount extractor for the pattern matcher
//! and for schema coercion of `amount` fields.

pub mod normalizer;

pub use normalizer::normalize;

use crate::error::AgentError;
use crate::Result;
use lazy_static::lazy_static;
use normalizer::{format_decimal, SUFFIX_PATTERN, UNIT_PATTERN};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
    static ref SEGMENT_SPLIT_RE: Regex = Regex::new(r"(?:^|\s)([+-])(?:\s|$)").unwrap();
    static ref HAS_DIGIT_RE: Regex = Regex::new(r"\d").unwrap();
    static ref OPERATOR_RE: Regex = Regex::new(
        r"[+*×@]|\d\s*-\s*\d|\d\s*x\s*\d|\b(?:kali|per|x|tambah|kurang|plus|minus)\b"
    )
    .unwrap();
    static ref HAS_SUFFIX_RE: Regex =
        Regex::new(&format!(r"\d\s*(?:{})\b", SUFFIX_PATTERN)).unwrap();
    static ref QUANTITY_PRICE_RE: Regex = Regex::new(&format!(
        r"(?P<qty>\d+(?:[.,]\d+)?)\s*(?:(?P<unit>{units})\b)?\s*(?P<item>[a-z][a-z ]*?)?\s*(?:@|×|\*|x|\bkali\b|\bper\b)\s*(?P<price>(?:rp\.?\s*)?\d+(?:[.,]\d+)*\s*(?:(?:{suffixes})\b)?)",
        units = UNIT_PATTERN,
        suffixes = SUFFIX_PATTERN,
    ))
    .unwrap();
}

/// How a term combines into the running total
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TermOperator {
    Multiply,
    Add,
    Subtract,
}

impl TermOperator {
    fn sign(&self) -> Decimal {
        match self {
            TermOperator::Subtract => Decimal::NEGATIVE_ONE,
            TermOperator::Multiply | TermOperator::Add => Decimal::ONE,
        }
    }
}

/// One `quantity * unit_price` term. Both factors are always positive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedTerm {
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub operator: TermOperator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(flatten)]
    pub term: ParsedTerm,
    /// quantity × unit_price, unsigned
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakdownStep {
    pub index: usize,
    pub expression: String,
    pub operator: TermOperator,
    #[serde(with = "rust_decimal::serde::float")]
    pub signed_subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub running_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationResult {
    /// Canonical form the result was computed from
    pub expression: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub items: Vec<LineItem>,
    pub breakdown: Vec<BreakdownStep>,
}

/// Best-effort quantity/price extraction with the unit and item label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuantityPrice {
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Evaluate a vernacular expression. Fails with `ParseError` when no
/// resolvable numeric term exists.
pub fn calculate(expression: &str) -> Result<CalculationResult> {
    let normalized = normalize(expression);
    calculate_normalized(&normalized)
}

/// Alias matching the standalone calculator surface
pub fn calculate_expression(text: &str) -> Result<CalculationResult> {
    calculate(text)
}

/// True iff the text has a digit and an operator token or magnitude suffix
pub fn is_valid_expression(text: &str) -> bool {
    let lowered = text.to_lowercase();

    HAS_DIGIT_RE.is_match(&lowered)
        && (OPERATOR_RE.is_match(&lowered) || HAS_SUFFIX_RE.is_match(&lowered))
}

/// Extract a positive amount from free text.
///
/// Arithmetic expressions evaluate to their total; otherwise the largest
/// number wins, which prefers "25rb" over a quantity like "2" in
/// "beli 2 kopi 25rb".
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let normalized = normalize(text);

    let amount = if has_arithmetic(&normalized) {
        calculate_normalized(&normalized).ok().map(|r| r.total)
    } else {
        numbers_in(&normalized).into_iter().max()
    };

    amount.filter(|value| *value > Decimal::ZERO)
}

/// [`parse_amount`] rounded to whole currency units
pub fn parse_whole_amount(text: &str) -> Option<i64> {
    parse_amount(text)
        .and_then(|value| value.round().to_i64())
        .filter(|value| *value > 0)
}

/// Recognize `<qty> [unit] [item] <op> <price>` anywhere in the text
pub fn parse_quantity_and_price(text: &str) -> Option<QuantityPrice> {
    let lowered = text.to_lowercase();
    let caps = QUANTITY_PRICE_RE.captures(&lowered)?;

    let quantity = Decimal::from_str(&caps["qty"].replace(',', ".")).ok()?;
    let unit_price = first_number(&normalize(&caps["price"]))?;

    if quantity <= Decimal::ZERO || unit_price <= Decimal::ZERO {
        return None;
    }

    let unit = caps.name("unit").map(|m| m.as_str().to_string());
    let item = caps
        .name("item")
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    Some(QuantityPrice {
        quantity,
        unit_price,
        unit,
        item,
        total: quantity.checked_mul(unit_price)?,
    })
}

pub(crate) fn calculate_normalized(normalized: &str) -> Result<CalculationResult> {
    let mut items = Vec::new();
    let mut breakdown = Vec::new();
    let mut total = Decimal::ZERO;

    for (operator, segment) in split_segments(normalized) {
        let Some(term) = parse_term(segment, operator)? else {
            continue;
        };

        let subtotal = term
            .quantity
            .checked_mul(term.unit_price)
            .ok_or_else(|| overflow(segment))?;
        total = total
            .checked_add(term.operator.sign() * subtotal)
            .ok_or_else(|| overflow(normalized))?;

        breakdown.push(BreakdownStep {
            index: items.len(),
            expression: format!(
                "{} {} {}",
                format_decimal(term.quantity),
                normalizer::MULTIPLY,
                format_decimal(term.unit_price)
            ),
            operator: term.operator,
            signed_subtotal: term.operator.sign() * subtotal,
            running_total: total,
        });
        items.push(LineItem { term, subtotal });
    }

    if items.is_empty() {
        return Err(AgentError::ParseError(format!(
            "no numeric term found in '{}'",
            normalized
        )));
    }

    Ok(CalculationResult {
        expression: normalized.to_string(),
        total,
        items,
        breakdown,
    })
}

fn overflow(expression: &str) -> AgentError {
    AgentError::ParseError(format!("'{}' is too large to evaluate", expression))
}

/// Split on top-level `+`/`-`, pairing each segment with its operator
fn split_segments(normalized: &str) -> Vec<(TermOperator, &str)> {
    let mut segments = Vec::new();
    let mut operator = TermOperator::Multiply;
    let mut cursor = 0;

    for caps in SEGMENT_SPLIT_RE.captures_iter(normalized) {
        let (Some(whole), Some(sign)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        segments.push((operator, &normalized[cursor..whole.start()]));
        operator = if sign.as_str() == "-" {
            TermOperator::Subtract
        } else {
            TermOperator::Add
        };
        cursor = whole.end();
    }
    segments.push((operator, &normalized[cursor..]));

    segments
        .into_iter()
        .map(|(op, segment)| (op, segment.trim()))
        .filter(|(_, segment)| !segment.is_empty())
        .collect()
}

/// `quantity * unit_price` first, then a bare number with quantity 1.
/// `Ok(None)` when the segment holds no usable number.
fn parse_term(segment: &str, operator: TermOperator) -> Result<Option<ParsedTerm>> {
    let factors: Vec<&str> = segment.split(normalizer::MULTIPLY).collect();

    let pair = if factors.len() >= 2 {
        let quantity = numbers_in(factors[0]).pop();
        let prices: Option<Vec<Decimal>> = factors[1..].iter().map(|f| first_number(f)).collect();

        match (quantity, prices) {
            (Some(q), Some(prices)) => {
                let unit_price = prices
                    .into_iter()
                    .try_fold(Decimal::ONE, |acc, price| acc.checked_mul(price))
                    .ok_or_else(|| overflow(segment))?;
                Some((q, unit_price))
            }
            _ => first_number(segment).map(|price| (Decimal::ONE, price)),
        }
    } else {
        first_number(segment).map(|price| (Decimal::ONE, price))
    };

    let Some((quantity, unit_price)) = pair else {
        return Ok(None);
    };
    if quantity <= Decimal::ZERO || unit_price <= Decimal::ZERO {
        return Ok(None);
    }

    let description = segment
        .split_whitespace()
        .filter(|word| !word.chars().any(|c| c.is_ascii_digit()) && *word != normalizer::MULTIPLY)
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Some(ParsedTerm {
        quantity,
        unit_price,
        description: (!description.is_empty()).then_some(description),
        operator,
    }))
}

fn has_arithmetic(normalized: &str) -> bool {
    normalized.contains(normalizer::MULTIPLY) || SEGMENT_SPLIT_RE.is_match(normalized)
}

fn numbers_in(text: &str) -> Vec<Decimal> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| Decimal::from_str(m.as_str()).ok())
        .collect()
}

fn first_number(text: &str) -> Option<Decimal> {
    NUMBER_RE
        .find(text)
        .and_then(|m| Decimal::from_str(m.as_str()).ok())
}
