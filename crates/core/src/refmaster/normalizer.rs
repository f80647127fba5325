//! Identifier normalizer: free-form text to ranked reference candidates.
//!
//! Scoring table (highest matching signal wins per candidate):
//!
//! | Signal                                   | Confidence |
//! |------------------------------------------|------------|
//! | ISIN exact                               | 1.00       |
//! | CUSIP or CIK exact                       | 0.95       |
//! | symbol exact + exchange                  | 0.95       |
//! | symbol exact + country                   | 0.92       |
//! | symbol exact                             | 0.90       |
//! | symbol substring (either way), name word | 0.70       |
//! | exchange or country only                 | 0.30       |

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::extract::{extract, Signals};
use super::model::{EquityReference, MatchReason, NormalizationResult};
use super::traits::EquityNormalizer;
use crate::config::NormalizerThresholds;

const CONF_ISIN: f64 = 1.0;
const CONF_ALT_ID: f64 = 0.95;
const CONF_SYMBOL_EXCHANGE: f64 = 0.95;
const CONF_SYMBOL_COUNTRY: f64 = 0.92;
const CONF_SYMBOL: f64 = 0.90;
const CONF_PARTIAL: f64 = 0.70;
const CONF_CONTEXT_ONLY: f64 = 0.30;

/// Shortest fragment allowed to take part in substring or name matching.
const MIN_FRAGMENT_LEN: usize = 2;
const MIN_NAME_WORD_LEN: usize = 4;

/// Corporate suffixes that never identify a company on their own.
const NAME_STOP_WORDS: &[&str] = &[
    "INC", "CORP", "CORPORATION", "COMPANY", "LTD", "PLC", "HOLDINGS", "GROUP", "CLASS", "THE",
    "SHARES", "COMMON", "STOCK",
];

/// Normalizer over an immutable in-memory reference table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    equities: Arc<Vec<EquityReference>>,
    thresholds: NormalizerThresholds,
}

impl Normalizer {
    pub fn new(equities: Vec<EquityReference>, thresholds: NormalizerThresholds) -> Self {
        Self {
            equities: Arc::new(equities),
            thresholds,
        }
    }

    pub fn with_defaults(equities: Vec<EquityReference>) -> Self {
        Self::new(equities, NormalizerThresholds::default())
    }

    pub fn thresholds(&self) -> &NormalizerThresholds {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.equities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equities.is_empty()
    }

    /// Normalizes every input with the same `top_k`.
    pub fn normalize_batch(
        &self,
        inputs: &[String],
        top_k: usize,
    ) -> Vec<(String, Vec<NormalizationResult>)> {
        inputs
            .iter()
            .map(|input| (input.clone(), self.normalize(input, top_k)))
            .collect()
    }

    fn score(&self, signals: &Signals, equity: &EquityReference) -> Option<(f64, BTreeSet<MatchReason>)> {
        let mut reasons = BTreeSet::new();

        let exchange_match = signals
            .exchange
            .as_deref()
            .is_some_and(|x| x.eq_ignore_ascii_case(&equity.exchange));
        let country_match = match (signals.country.as_deref(), equity.country.as_deref()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };

        if signals.isin.as_deref() == Some(equity.isin.as_str()) {
            reasons.insert(MatchReason::IsinExact);
            return Some((CONF_ISIN, reasons));
        }
        if signals.cusip.as_deref() == Some(equity.cusip.as_str()) {
            reasons.insert(MatchReason::CusipExact);
            return Some((CONF_ALT_ID, reasons));
        }
        if signals.cik.is_some() && signals.cik == equity.padded_cik() {
            reasons.insert(MatchReason::CikExact);
            return Some((CONF_ALT_ID, reasons));
        }

        let symbol_exact = signals.symbol.as_deref() == Some(equity.symbol.as_str())
            || signals.symbol_base.as_deref() == Some(equity.symbol.as_str());
        if exchange_match {
            reasons.insert(MatchReason::ExchangeMatch);
        }
        if country_match {
            reasons.insert(MatchReason::CountryMatch);
        }

        if symbol_exact {
            reasons.insert(MatchReason::SymbolExact);
            let confidence = if exchange_match {
                CONF_SYMBOL_EXCHANGE
            } else if country_match {
                CONF_SYMBOL_COUNTRY
            } else {
                CONF_SYMBOL
            };
            return Some((confidence, reasons));
        }

        if symbol_in_text(signals, &equity.symbol) {
            reasons.insert(MatchReason::SymbolInText);
            return Some((CONF_PARTIAL, reasons));
        }
        if name_in_text(signals, equity.name.as_deref()) {
            reasons.insert(MatchReason::NameMatch);
            return Some((CONF_PARTIAL, reasons));
        }

        if exchange_match || country_match {
            let mut context = BTreeSet::new();
            context.insert(if exchange_match {
                MatchReason::ExchangeOnly
            } else {
                MatchReason::CountryOnly
            });
            return Some((CONF_CONTEXT_ONLY, context));
        }
        None
    }

    /// Flags band members as ambiguous when no candidate clears the band
    /// and at least two fall inside it.
    fn mark_ambiguous(&self, candidates: &mut [NormalizationResult]) {
        let low = self.thresholds.ambiguous_low;
        let high = self.thresholds.ambiguous_high;
        let in_band = |c: f64| c >= low && c <= high;

        if candidates.iter().any(|c| c.confidence > high) {
            return;
        }
        if candidates.iter().filter(|c| in_band(c.confidence)).count() < 2 {
            return;
        }
        for candidate in candidates.iter_mut() {
            candidate.ambiguous = in_band(candidate.confidence);
        }
    }
}

fn symbol_in_text(signals: &Signals, symbol: &str) -> bool {
    if symbol.len() >= MIN_FRAGMENT_LEN && signals.words.iter().any(|w| w.contains(symbol)) {
        return true;
    }
    match signals.symbol_base.as_deref() {
        Some(token) => token.len() >= MIN_FRAGMENT_LEN && symbol.contains(token),
        None => false,
    }
}

fn name_in_text(signals: &Signals, name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    let name = name.to_uppercase();
    let name_words: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= MIN_NAME_WORD_LEN && !NAME_STOP_WORDS.contains(w))
        .collect();
    signals.words.iter().any(|w| name_words.contains(&w.as_str()))
}

/// Ranking: confidence desc, then context match first, then shorter
/// symbol, then alphabetical symbol.
fn rank(a: &NormalizationResult, b: &NormalizationResult) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.has_context_match().cmp(&a.has_context_match()))
        .then_with(|| a.equity.symbol.len().cmp(&b.equity.symbol.len()))
        .then_with(|| a.equity.symbol.cmp(&b.equity.symbol))
}

impl EquityNormalizer for Normalizer {
    fn normalize(&self, text: &str, top_k: usize) -> Vec<NormalizationResult> {
        let signals = extract(text);
        if signals.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<NormalizationResult> = self
            .equities
            .iter()
            .filter_map(|equity| {
                self.score(&signals, equity)
                    .filter(|(confidence, _)| *confidence >= self.thresholds.reject)
                    .map(|(confidence, reasons)| NormalizationResult {
                        equity: equity.clone(),
                        confidence,
                        reasons,
                        ambiguous: false,
                    })
            })
            .collect();

        candidates.sort_by(rank);
        self.mark_ambiguous(&mut candidates);
        candidates.truncate(top_k);
        candidates
    }

    fn find_by_symbol(&self, symbol: &str) -> Option<&EquityReference> {
        let symbol = symbol.trim().to_uppercase();
        self.equities.iter().find(|e| e.symbol == symbol)
    }

    fn default_top_k(&self) -> usize {
        self.thresholds.top_k
    }
}
