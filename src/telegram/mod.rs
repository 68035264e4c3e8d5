mod client;
pub mod format;
mod types;

pub use client::TelegramNotifier;
