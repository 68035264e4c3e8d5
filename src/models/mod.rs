pub mod period;
pub mod transaction;

pub use period::Period;
pub use transaction::{Metadata, Source, Transaction};
