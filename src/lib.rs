pub mod blob;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod index;
mod metrics;
mod server;
pub mod utils;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::Opts;
pub use error::{Error, Result};
