pub mod address;
pub mod config;
pub mod error;
pub mod handlers;
pub mod probe;
pub mod storage;

pub use address::{Scheme, StorageAddress};
pub use config::Config;
pub use error::{Error, Result};
