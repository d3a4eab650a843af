//! On-disk range database sharded by address octets.
//!
//! Every entry is stored as its own stream file. Leading octets shared by a
//! range's bounds become directories, the remaining octets form the file
//! name:
//!
//! ```text
//! 91.64.54.0-91.64.54.255   ->  base/91/64/54.0-54.255
//! 10.0.0.0-10.255.255.255   ->  base/10/0.0.0-255.255.255
//! 1.0.0.0-2.0.0.255         ->  base/1.0.0.0-2.0.0.255
//! ```
//!
//! Lookups descend along the query address as deep as directories exist and
//! scan the files of each level on the way back up.

use parking_lot::Mutex;
use std::fs;
use std::io::{self, BufReader, Cursor, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{GeoIpDatabase, MemDatabase};
use crate::config::GeoConfig;
use crate::range::Range;
use crate::serial::{Deserializer, Serializer, TypeRegistry};
use crate::{Entry, Error, Result};

/// Maximum number of directory levels below the base directory.
const MAX_DEPTH: usize = 2;

/// Path of the file holding `range` below `base`.
pub fn shard_path(base: &Path, range: &Range) -> PathBuf {
    let lower = range.lower().to_be_bytes();
    let upper = range.upper().to_be_bytes();

    let mut path = base.to_path_buf();
    let mut depth = 0;
    while depth < MAX_DEPTH && lower[depth] == upper[depth] {
        path.push(lower[depth].to_string());
        depth += 1;
    }

    path.push(format!(
        "{}-{}",
        dotted(&lower[depth..]),
        dotted(&upper[depth..])
    ));
    path
}

fn dotted(octets: &[u8]) -> String {
    octets
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Range database stored as a directory tree of entry files.
///
/// Writes are meant for an offline rebuild; lookups are serialized by an
/// internal lock held for one whole tree walk.
pub struct ShardedDatabase {
    base_dir: PathBuf,
    registry: Arc<TypeRegistry>,
    lock: Mutex<()>,
}

impl ShardedDatabase {
    pub fn new(base_dir: impl Into<PathBuf>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            base_dir: base_dir.into(),
            registry,
            lock: Mutex::new(()),
        }
    }

    /// Open the configured data directory, importing the CSV dataset and
    /// rebuilding the tree first if the directory does not exist.
    pub fn recover(config: &GeoConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        let db = Self::new(config.data_dir(), registry);
        if db.base_dir.exists() {
            log::debug!("Using geo data in {}", db.base_dir.display());
            return Ok(db);
        }

        let csv_path = config.csv_path();
        log::info!(
            "Geo data directory {} missing, recovering from {}",
            db.base_dir.display(),
            csv_path.display()
        );
        let mut mem = MemDatabase::new();
        mem.import(&csv_path)?;
        mem.rebuild(&db)?;
        Ok(db)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write one entry to its shard file, replacing any previous file.
    pub fn store(&self, entry: &Arc<Entry>) -> Result<PathBuf> {
        let path = shard_path(&self.base_dir, &entry.range);
        let dir = path.parent().unwrap_or(self.base_dir.as_path());
        fs::create_dir_all(dir)?;

        let mut buf = Cursor::new(Vec::new());
        Serializer::new(&mut buf, &self.registry)?.write_record(Some(entry))?;

        // temp files are dot-prefixed and skipped by lookups
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(buf.get_ref())?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        log::debug!("Stored {} at {}", entry.range, path.display());
        Ok(path)
    }

    /// Store every entry. Stops at the first failure.
    pub fn rebuild(&self, entries: &[Arc<Entry>]) -> Result<usize> {
        fs::create_dir_all(&self.base_dir)?;
        for entry in entries {
            self.store(entry)?;
        }
        log::info!(
            "Rebuilt {} with {} entries",
            self.base_dir.display(),
            entries.len()
        );
        Ok(entries.len())
    }

    /// Find the entry containing `addr`.
    ///
    /// Entries are returned whether or not [`Entry::is_valid`] holds.
    pub fn lookup(&self, addr: Ipv4Addr) -> Result<Option<Arc<Entry>>> {
        let _guard = self.lock.lock();
        if !self.base_dir.is_dir() {
            return Ok(None);
        }
        self.find_in(&self.base_dir, &addr.octets(), u32::from(addr))
    }

    fn find_in(&self, dir: &Path, octets: &[u8], value: u32) -> Result<Option<Arc<Entry>>> {
        if let Some((first, rest)) = octets.split_first() {
            let sub_dir = dir.join(first.to_string());
            if sub_dir.is_dir() {
                if let Some(entry) = self.find_in(&sub_dir, rest, value)? {
                    return Ok(Some(entry));
                }
            }
        }
        self.scan_dir(dir, value)
    }

    /// Check the entry files directly inside `dir`.
    fn scan_dir(&self, dir: &Path, value: u32) -> Result<Option<Arc<Entry>>> {
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for item in listing {
            let item = item?;
            let hidden = item.file_name().to_string_lossy().starts_with('.');
            if !hidden && item.file_type()?.is_file() {
                files.push(item.path());
            }
        }
        files.sort();

        for path in files {
            match self.read_leaf(&path) {
                Ok(Some(entry)) if entry.contains(value) => return Ok(Some(entry)),
                Ok(_) => {}
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Skipping unreadable shard {}: {}", path.display(), e),
            }
        }
        Ok(None)
    }

    fn read_leaf(&self, path: &Path) -> Result<Option<Arc<Entry>>> {
        let mut reader = BufReader::new(fs::File::open(path)?);
        Deserializer::new(&mut reader, &self.registry)?.read_record::<Entry>()
    }
}

impl GeoIpDatabase for ShardedDatabase {
    fn find(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>> {
        match addr {
            IpAddr::V4(v4) => self.lookup(v4),
            IpAddr::V6(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: [u8; 4], hi: [u8; 4]) -> Range {
        Range::from_addrs(Ipv4Addr::from(lo), Ipv4Addr::from(hi))
    }

    fn open(dir: &Path) -> ShardedDatabase {
        ShardedDatabase::new(dir.join("geo-db"), Arc::new(TypeRegistry::with_geo_types()))
    }

    #[test]
    fn test_shard_path() {
        let base = Path::new("/data");
        assert_eq!(
            shard_path(base, &range([91, 64, 54, 0], [91, 64, 54, 255])),
            Path::new("/data/91/64/54.0-54.255")
        );
        assert_eq!(
            shard_path(base, &range([10, 0, 0, 0], [10, 255, 255, 255])),
            Path::new("/data/10/0.0.0-255.255.255")
        );
        assert_eq!(
            shard_path(base, &range([1, 0, 0, 0], [2, 0, 0, 255])),
            Path::new("/data/1.0.0.0-2.0.0.255")
        );
        assert_eq!(
            shard_path(base, &range([5, 6, 7, 8], [5, 6, 7, 8])),
            Path::new("/data/5/6/7.8-7.8")
        );
    }

    #[test]
    fn test_store_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        let entry = Arc::new(Entry::new(range([91, 64, 54, 0], [91, 64, 54, 255]), "DE"));

        let path = db.store(&entry).unwrap();
        assert!(path.ends_with("91/64/54.0-54.255"));

        let found = db.lookup(Ipv4Addr::new(91, 64, 54, 207)).unwrap().unwrap();
        assert_eq!(found.country_code, "DE");
        assert!(db.lookup(Ipv4Addr::new(91, 64, 55, 1)).unwrap().is_none());
    }

    #[test]
    fn test_lookup_backtracks_to_parent_levels() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        let wide = Arc::new(Entry::new(range([10, 0, 0, 0], [10, 255, 255, 255]), "US"));
        let narrow = Arc::new(Entry::new(range([10, 1, 2, 0], [10, 1, 2, 255]), "CA"));
        db.rebuild(&[wide, narrow]).unwrap();

        // 10/1 exists but holds no match for 10.1.3.4
        let found = db.lookup(Ipv4Addr::new(10, 1, 3, 4)).unwrap().unwrap();
        assert_eq!(found.country_code, "US");
        let found = db.lookup(Ipv4Addr::new(10, 1, 2, 4)).unwrap().unwrap();
        assert_eq!(found.country_code, "CA");
    }

    #[test]
    fn test_lookup_returns_incomplete_entries() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        let entry = Entry::new(range([91, 64, 54, 0], [91, 64, 54, 255]), "DE");
        assert!(!entry.is_valid());
        db.store(&Arc::new(entry)).unwrap();

        let found = db.lookup(Ipv4Addr::new(91, 64, 54, 1)).unwrap().unwrap();
        assert_eq!(found.country_code, "DE");
        assert!(found.city.is_empty());
    }

    #[test]
    fn test_missing_base_dir_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        assert!(db.lookup(Ipv4Addr::new(1, 2, 3, 4)).unwrap().is_none());
        assert!(db.find("::1".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_shard_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        let good = Arc::new(Entry::new(range([91, 64, 54, 128], [91, 64, 54, 255]), "DE"));
        db.store(&good).unwrap();

        // sorts before the valid file in the same directory
        let bad = db.base_dir().join("91/64/54.0-54.127");
        fs::write(&bad, b"garbage that is not a stream").unwrap();

        let found = db.lookup(Ipv4Addr::new(91, 64, 54, 200)).unwrap().unwrap();
        assert_eq!(found.country_code, "DE");
        assert!(db.lookup(Ipv4Addr::new(91, 64, 54, 5)).unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(dir.path());
        let r = range([8, 8, 8, 0], [8, 8, 8, 255]);
        db.store(&Arc::new(Entry::new(r, "XX"))).unwrap();
        db.store(&Arc::new(Entry::new(r, "US"))).unwrap();

        let found = db.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap().unwrap();
        assert_eq!(found.country_code, "US");
        let files = fs::read_dir(db.base_dir().join("8/8")).unwrap().count();
        assert_eq!(files, 1);
    }
}
