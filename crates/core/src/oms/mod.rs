//! Trade validation (OMS checks).
//!
//! A [`TradeValidator`] runs a fixed sequence of [`TradeCheck`]s over each
//! trade: required fields, identifier resolution, currency, price tolerance,
//! counterparty and settlement date. Every check runs on every trade; the
//! trade status is the highest severity among the resulting issues.

pub mod calendar;
pub mod checks;
pub mod model;
pub mod traits;
pub mod validator;

pub use calendar::{is_weekend, HolidayCalendar, SettlementCalendar, WeekendCalendar};
pub use checks::price_deviation;
pub use model::{Trade, TradeValidation};
pub use traits::{TradeCheck, TradeContext};
pub use validator::TradeValidator;
