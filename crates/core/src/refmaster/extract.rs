//! Identifier signal extraction from free-form text.

use std::sync::LazyLock;

use regex::Regex;

use super::model::pad_cik;

static ISIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}[0-9])\b").expect("valid ISIN regex"));
static CUSIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z0-9]{9})\b").expect("valid CUSIP regex"));
static CIK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(0{0,6}[0-9]{4,10})\b").expect("valid CIK regex"));
static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}(?:\.[A-Z]{1,2})?$").expect("valid ticker regex"));
static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9][A-Z0-9.&]*").expect("valid word regex"));

const EXCHANGE_KEYWORDS: &[&str] = &["NASDAQ", "NYSE", "AMEX", "OTC"];

/// Bloomberg-style composite codes that imply an exchange as well as a country.
const VENUE_CODES: &[(&str, &str, &str)] = &[
    ("UW", "NASDAQ", "US"),
    ("UQ", "NASDAQ", "US"),
    ("UN", "NYSE", "US"),
    ("UA", "AMEX", "US"),
    ("UV", "OTC", "US"),
];

/// Signals found in one input string. All values are upper-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub isin: Option<String>,
    pub cusip: Option<String>,
    /// Zero-padded to 10 digits
    pub cik: Option<String>,
    /// Ticker-like token as written, e.g. `BRK.B`
    pub symbol: Option<String>,
    /// `symbol` without its `.SUFFIX`
    pub symbol_base: Option<String>,
    pub exchange: Option<String>,
    pub country: Option<String>,
    /// Every word of the input, for substring and name matching
    pub words: Vec<String>,
}

impl Signals {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Extracts identifier signals from `text`.
pub fn extract(text: &str) -> Signals {
    let upper = text.trim().to_uppercase();
    let mut signals = Signals {
        words: WORD_RE
            .find_iter(&upper)
            .map(|m| m.as_str().trim_end_matches('.').to_string())
            .filter(|w| !w.is_empty())
            .collect(),
        ..Signals::default()
    };
    if signals.words.is_empty() {
        return signals;
    }

    signals.isin = ISIN_RE.captures(&upper).map(|c| c[1].to_string());
    if signals.isin.is_none() {
        // A 9-character token without a digit is a word, not a CUSIP.
        signals.cusip = CUSIP_RE
            .captures_iter(&upper)
            .map(|c| c[1].to_string())
            .find(|t| t.chars().any(|ch| ch.is_ascii_digit()));
    }
    signals.cik = CIK_RE.captures(&upper).map(|c| pad_cik(&c[1]));

    signals.exchange = signals
        .words
        .iter()
        .find(|w| EXCHANGE_KEYWORDS.contains(&w.as_str()))
        .cloned();

    let symbol_index = signals
        .words
        .iter()
        .position(|w| TICKER_RE.is_match(w) && !EXCHANGE_KEYWORDS.contains(&w.as_str()));
    if let Some(index) = symbol_index {
        let symbol = signals.words[index].clone();
        signals.symbol_base = symbol.split('.').next().map(str::to_string);
        signals.symbol = Some(symbol);

        // "AAPL US" / "AAPL UW": a two-letter code right after the ticker.
        if let Some(code) = signals.words.get(index + 1).filter(|w| is_two_letters(w)) {
            match VENUE_CODES.iter().find(|(c, _, _)| c == code) {
                Some((_, exchange, country)) => {
                    signals.exchange.get_or_insert_with(|| exchange.to_string());
                    signals.country = Some(country.to_string());
                }
                None => signals.country = Some(code.clone()),
            }
        }
    }
    if signals.country.is_none() && signals.words.iter().skip(1).any(|w| w == "US") {
        signals.country = Some("US".to_string());
    }
    signals
}

fn is_two_letters(word: &str) -> bool {
    word.len() == 2 && word.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(extract("").is_empty());
        assert!(extract("   ").is_empty());
    }

    #[test]
    fn test_ticker_with_country() {
        let s = extract("AAPL US");
        assert_eq!(s.symbol.as_deref(), Some("AAPL"));
        assert_eq!(s.country.as_deref(), Some("US"));
        assert_eq!(s.exchange, None);
    }

    #[test]
    fn test_ticker_with_venue_code() {
        let s = extract("aapl uw");
        assert_eq!(s.symbol.as_deref(), Some("AAPL"));
        assert_eq!(s.exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(s.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_share_class_suffix() {
        let s = extract("BRK.B");
        assert_eq!(s.symbol.as_deref(), Some("BRK.B"));
        assert_eq!(s.symbol_base.as_deref(), Some("BRK"));
    }

    #[test]
    fn test_exchange_keyword_is_not_a_ticker() {
        let s = extract("NYSE IBM");
        assert_eq!(s.exchange.as_deref(), Some("NYSE"));
        assert_eq!(s.symbol.as_deref(), Some("IBM"));
    }

    #[test]
    fn test_isin_suppresses_cusip() {
        let s = extract("US0378331005");
        assert_eq!(s.isin.as_deref(), Some("US0378331005"));
        assert_eq!(s.cusip, None);
    }

    #[test]
    fn test_cusip_and_cik() {
        let s = extract("037833100");
        assert_eq!(s.cusip.as_deref(), Some("037833100"));
        assert_eq!(s.cik.as_deref(), Some("0037833100"));

        let s = extract("CIK 320193");
        assert_eq!(s.cik.as_deref(), Some("0000320193"));
        assert_eq!(s.cusip, None);
    }

    #[test]
    fn test_nine_letter_word_is_not_cusip() {
        assert_eq!(extract("MICROSOFT").cusip, None);
    }
}
