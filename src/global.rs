//! Process-wide registry and database.
//!
//! Library types take their registry and database explicitly; these globals
//! are a convenience for applications with a single geo database.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{Backend, GeoConfig};
use crate::database::{CachedDatabase, GeoIpDatabase, MemDatabase, ShardedDatabase};
use crate::language::LanguageMap;
use crate::serial::TypeRegistry;
use crate::{Entry, Error, Result};

/// Registry holding the geo record types.
static DEFAULT_REGISTRY: Lazy<Arc<TypeRegistry>> =
    Lazy::new(|| Arc::new(TypeRegistry::with_geo_types()));

/// Global database
static GLOBAL_DATABASE: Lazy<RwLock<Option<Arc<dyn GeoIpDatabase>>>> =
    Lazy::new(|| RwLock::new(None));

/// Global language map
static GLOBAL_LANGUAGES: Lazy<RwLock<LanguageMap>> =
    Lazy::new(|| RwLock::new(LanguageMap::with_defaults()));

/// Shared registry with [`Entry`] and [`MemDatabase`] registered.
pub fn default_registry() -> Arc<TypeRegistry> {
    DEFAULT_REGISTRY.clone()
}

/// Build the database described by `config`, behind a result cache.
///
/// The sharded backend recovers its directory tree from the dataset when
/// the tree is missing; the memory backend imports the dataset directly.
pub fn open_database(config: &GeoConfig) -> Result<Arc<dyn GeoIpDatabase>> {
    let capacity = config.cache_capacity;
    let db: Arc<dyn GeoIpDatabase> = match config.backend {
        Backend::Memory => {
            let mut mem = MemDatabase::new();
            mem.import(&config.csv_path())?;
            Arc::new(CachedDatabase::new(mem, capacity))
        }
        Backend::Sharded => {
            let sharded = ShardedDatabase::recover(config, default_registry())?;
            Arc::new(CachedDatabase::new(sharded, capacity))
        }
    };
    Ok(db)
}

/// Open the configured database and install it globally.
///
/// Replaces any database installed before.
pub fn init_database(config: &GeoConfig) -> Result<()> {
    let db = open_database(config)?;
    install_database(db);
    *GLOBAL_LANGUAGES.write() = config.language_map();
    log::info!("Initialized geo database ({:?})", config.backend);
    Ok(())
}

/// Install an already opened database globally.
pub fn install_database(db: Arc<dyn GeoIpDatabase>) {
    *GLOBAL_DATABASE.write() = Some(db);
}

/// Check if a global database is installed.
pub fn is_initialized() -> bool {
    GLOBAL_DATABASE.read().is_some()
}

/// Find the entry for an address in the global database.
///
/// Fails with [`Error::NotInitialized`] before [`init_database`].
pub fn try_lookup(addr: IpAddr) -> Result<Option<Arc<Entry>>> {
    let db = GLOBAL_DATABASE.read().clone().ok_or(Error::NotInitialized)?;
    db.find(addr)
}

/// Find the entry for an address in the global database.
///
/// Errors are logged and reported as not found.
///
/// # Examples
/// ```ignore
/// use gipstore::lookup;
///
/// if let Some(entry) = lookup("91.64.54.207".parse()?) {
///     println!("{} ({})", entry, entry.country_code);
/// }
/// ```
pub fn lookup(addr: IpAddr) -> Option<Arc<Entry>> {
    match try_lookup(addr) {
        Ok(entry) => entry,
        Err(e) => {
            log::warn!("Geo lookup for {} failed: {}", addr, e);
            None
        }
    }
}

/// Language for an entry using the global language map.
pub fn language_for(entry: &Entry) -> String {
    GLOBAL_LANGUAGES.read().language_for(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use std::net::Ipv4Addr;

    #[test]
    fn test_default_registry() {
        let registry = default_registry();
        assert!(registry.contains(<Entry as crate::serial::Persistent>::TYPE_TAG));
        assert!(Arc::ptr_eq(&registry, &default_registry()));
    }

    #[test]
    fn test_install_and_lookup() {
        let db = MemDatabase::from_entries([Entry::new(
            Range::from_addrs(Ipv4Addr::new(91, 64, 54, 0), Ipv4Addr::new(91, 64, 54, 255)),
            "DE",
        )]);
        install_database(Arc::new(db));
        assert!(is_initialized());

        let entry = lookup("91.64.54.207".parse().unwrap()).unwrap();
        assert_eq!(entry.country_code, "DE");
        assert!(lookup("10.0.0.1".parse().unwrap()).is_none());
        assert_eq!(language_for(&entry), "de");
    }

    #[test]
    fn test_open_memory_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("geo-db.csv"),
            "\"1.0.0.0\",\"1.0.0.255\",\"AU\",\"Australia\",\"Queensland\",\"Brisbane\",\"\",\"\",\"\",\"\"\n",
        )
        .unwrap();
        let config = GeoConfig {
            backend: Backend::Memory,
            ..GeoConfig::with_root(dir.path())
        };

        let db = open_database(&config).unwrap();
        let entry = db.find("1.0.0.7".parse().unwrap()).unwrap().unwrap();
        assert_eq!(entry.city, "Brisbane");
    }
}
