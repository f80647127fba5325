/// Identifier of a market data source (e.g. "FINANCIAL_DATASETS", "STATIC").
pub type ProviderId = &'static str;

/// Upper-cased exchange ticker (e.g. "AAPL").
pub type Ticker = String;
