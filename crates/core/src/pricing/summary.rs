//! Summary statistics over enriched marks.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::model::{Classification, EnrichedMark};

/// Counts, pass rate, deviation stats and flagged tickers for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSummary {
    pub total: usize,
    pub counts: BTreeMap<Classification, usize>,
    /// OK count / total; 0.0 for an empty batch
    pub pass_rate: f64,
    /// Mean deviation percentage over marks that have one
    pub average_deviation: Option<f64>,
    pub max_deviation: Option<f64>,
    /// Tickers with a non-OK classification, most severe first
    pub flagged_tickers: Vec<String>,
}

impl PricingSummary {
    pub fn from_marks(marks: &[EnrichedMark]) -> Self {
        let total = marks.len();
        let mut counts: BTreeMap<Classification, usize> =
            Classification::ALL.iter().map(|c| (*c, 0)).collect();
        for mark in marks {
            *counts.entry(mark.classification).or_insert(0) += 1;
        }

        let ok = counts.get(&Classification::Ok).copied().unwrap_or(0);
        let pass_rate = if total == 0 { 0.0 } else { ok as f64 / total as f64 };

        let deviations: Vec<f64> = marks.iter().filter_map(|m| m.deviation_percentage).collect();
        let average_deviation =
            (!deviations.is_empty()).then(|| deviations.iter().sum::<f64>() / deviations.len() as f64);
        let max_deviation = deviations.iter().copied().reduce(f64::max);

        // A ticker flagged more than once is listed under its worst outcome.
        let mut worst: HashMap<String, Classification> = HashMap::new();
        for mark in marks.iter().filter(|m| m.classification.is_flagged()) {
            let entry = worst.entry(mark.mark.symbol()).or_insert(mark.classification);
            if mark.classification.report_rank() > entry.report_rank() {
                *entry = mark.classification;
            }
        }
        let mut flagged: Vec<(String, Classification)> = worst.into_iter().collect();
        flagged.sort_by(|(a, ca), (b, cb)| {
            cb.report_rank().cmp(&ca.report_rank()).then_with(|| a.cmp(b))
        });

        Self {
            total,
            counts,
            pass_rate,
            average_deviation,
            max_deviation,
            flagged_tickers: flagged.into_iter().map(|(ticker, _)| ticker).collect(),
        }
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    /// Marks with any non-OK classification.
    pub fn flagged(&self) -> usize {
        self.total - self.count(Classification::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::model::Mark;
    use chrono::NaiveDate;

    fn enriched(ticker: &str, classification: Classification, deviation: Option<f64>) -> EnrichedMark {
        let date = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        let mut mark = EnrichedMark::no_market_data(Mark::new(ticker, 1.0, date), "test", None);
        mark.classification = classification;
        mark.status = classification.severity();
        mark.deviation_percentage = deviation;
        mark
    }

    #[test]
    fn test_empty_batch() {
        let summary = PricingSummary::from_marks(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate, 0.0);
        assert_eq!(summary.average_deviation, None);
        assert!(summary.flagged_tickers.is_empty());
        assert_eq!(summary.count(Classification::Ok), 0);
    }

    #[test]
    fn test_counts_rate_and_flag_order() {
        let marks = vec![
            enriched("AAPL", Classification::Ok, Some(0.01)),
            enriched("MSFT", Classification::ReviewNeeded, Some(0.03)),
            enriched("XYZ", Classification::NoMarketData, None),
            enriched("TSLA", Classification::StaleMark, Some(0.0)),
            enriched("NVDA", Classification::OutOfTolerance, Some(0.20)),
            enriched("MSFT", Classification::OutOfTolerance, Some(0.06)),
        ];
        let summary = PricingSummary::from_marks(&marks);

        assert_eq!(summary.total, 6);
        assert_eq!(summary.count(Classification::OutOfTolerance), 2);
        assert_eq!(summary.flagged(), 5);
        assert!((summary.pass_rate - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(summary.max_deviation, Some(0.20));
        assert!((summary.average_deviation.unwrap() - 0.06).abs() < 1e-12);
        assert_eq!(summary.flagged_tickers, vec!["XYZ", "MSFT", "NVDA", "TSLA"]);
    }
}
