//! Trade check implementations, in the order the validator runs them.

pub mod counterparty;
pub mod currency;
pub mod identifier;
pub mod price_tolerance;
pub mod required_fields;
pub mod settlement;

pub use counterparty::CounterpartyCheck;
pub use currency::CurrencyCheck;
pub use identifier::IdentifierCheck;
pub use price_tolerance::{price_deviation, PriceToleranceCheck};
pub use required_fields::RequiredFieldsCheck;
pub use settlement::SettlementCheck;
