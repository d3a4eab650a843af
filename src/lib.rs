//! gipstore - IP address to geographic location lookup.
//!
//! This crate stores geo-IP ranges and answers "where is this address"
//! queries from either an in-memory range index or an on-disk directory
//! tree sharded by address octets.
//!
//! # Features
//!
//! - **Object-graph serialization**: length framed, type tagged records
//!   with shared references and tolerance for appended fields
//! - **In-memory database**: binary search over sorted, disjoint ranges
//! - **Sharded database**: one file per range, no separate index
//! - **Hot swap**: replace a database atomically while lookups continue
//! - **Dataset import**: quoted CSV, plain or gzip compressed
//!
//! # Quick Start
//!
//! ```ignore
//! use gipstore::{GeoConfig, GeoIpDatabase, ShardedDatabase, default_registry};
//!
//! let config = GeoConfig::load("geo.yaml")?;
//! let db = ShardedDatabase::recover(&config, default_registry())?;
//!
//! if let Some(entry) = db.find("91.64.54.207".parse()?)? {
//!     println!("{} ({})", entry, entry.country_code);
//! }
//! ```
//!
//! # Global Database
//!
//! ```ignore
//! use gipstore::{init_database, lookup, GeoConfig};
//!
//! init_database(&GeoConfig::with_root("/var/lib/gipstore"))?;
//! let entry = lookup("8.8.8.8".parse()?);
//! ```

mod coordinate;
mod entry;
mod error;
mod global;
mod language;
mod range;

pub mod config;
pub mod converter;
pub mod database;
pub mod serial;

// Re-export core types
pub use coordinate::{Coordinate, Coordinates, Hemisphere};
pub use entry::Entry;
pub use error::{Error, Result};
pub use language::{LanguageMap, LanguageRule};
pub use range::{Range, IPV4_LEN};

pub use config::{Backend, GeoConfig};
pub use database::{CachedDatabase, GeoIpDatabase, MemDatabase, ShardedDatabase};

// Re-export global API functions
pub use global::{
    default_registry, init_database, install_database, is_initialized, language_for, lookup,
    open_database, try_lookup,
};
