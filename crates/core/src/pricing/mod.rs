//! Mark validation against market reference prices.

pub mod model;
pub mod summary;
pub mod validator;

pub use model::{Classification, EnrichedMark, Mark};
pub use summary::PricingSummary;
pub use validator::{classify_deviation, MarkValidation, MarkValidator};
