pub mod balance;
mod engine;
pub mod reconcile;
pub mod report;

pub use engine::SyncEngine;
pub use report::SyncReport;
