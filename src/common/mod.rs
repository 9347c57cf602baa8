//! Common utilities and types shared across rwcache

pub mod config;
pub mod error;
pub mod item;
pub mod utils;

pub use config::Config;
pub use error::{BackendFailure, Error, Result};
pub use item::{Address, Item, Verb};
pub use utils::validate_key;
