pub mod config;
pub mod types;

pub use config::{BackendKind, StoreConfig};
pub use types::*;
