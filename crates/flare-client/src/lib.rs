pub mod client;
pub mod config;
pub mod error;

pub use client::{decode_results, FlareClient};
pub use config::FlareConfig;
pub use error::ClientError;
