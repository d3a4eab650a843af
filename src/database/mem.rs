//! In-memory range database.

use std::any::Any;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;

use super::{GeoIpDatabase, ShardedDatabase};
use crate::converter::{open_dataset, CsvParser};
use crate::range::{Range, IPV4_LEN};
use crate::serial::{
    Deserializer, Persistent, Record, RecordArray, Serializer, TypeRegistry, TypeTag,
};
use crate::{Entry, Result};

/// Entries sorted by range, searched by binary search.
///
/// Lookups assume the entries are in ascending range order and pairwise
/// disjoint. Datasets are imported in file order; [`is_sorted`] and
/// [`sort`] are available when the source order is not trusted.
///
/// [`is_sorted`]: MemDatabase::is_sorted
/// [`sort`]: MemDatabase::sort
#[derive(Debug, Default, Clone)]
pub struct MemDatabase {
    entries: Vec<Arc<Entry>>,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from entries, kept in the given order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    /// Append an entry. It must not sort before the current last entry.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(Arc::new(entry));
    }

    /// Find the entry containing a 32-bit IPv4 value.
    pub fn find_value(&self, value: u32) -> Option<Arc<Entry>> {
        let probe = Range::probe(IPV4_LEN, value);
        let idx = self
            .entries
            .partition_point(|e| e.range.cmp_interval(&probe) == Ordering::Less);
        self.entries
            .get(idx)
            .filter(|e| e.range.cmp_interval(&probe) == Ordering::Equal)
            .cloned()
    }

    pub fn find_addr(&self, addr: Ipv4Addr) -> Option<Arc<Entry>> {
        self.find_value(u32::from(addr))
    }

    /// Replace the contents with a dataset file, gzip or plain.
    ///
    /// Returns the number of entries loaded.
    pub fn import(&mut self, path: &Path) -> Result<usize> {
        log::info!("Importing geo dataset from {}", path.display());
        self.import_reader(open_dataset(path)?)
    }

    /// Replace the contents with dataset rows read from `reader`.
    pub fn import_reader<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let entries = CsvParser::parse(reader)?;
        self.entries = entries.into_iter().map(Arc::new).collect();
        if !self.is_sorted() {
            log::warn!("Imported dataset is not in ascending range order, lookups may miss");
        }
        log::debug!("Imported {} entries", self.entries.len());
        Ok(self.entries.len())
    }

    /// Whether every entry lies strictly before its successor.
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].range.cmp_interval(&w[1].range) == Ordering::Less)
    }

    /// Sort entries by range.
    pub fn sort(&mut self) {
        self.entries
            .sort_by_key(|e| (e.range.prefix_len(), e.range.lower(), e.range.upper()));
    }

    /// Persist every entry into a sharded database.
    pub fn rebuild(&self, target: &ShardedDatabase) -> Result<usize> {
        target.rebuild(&self.entries)
    }

    /// Write the whole database as one stream.
    pub fn save_snapshot(self: &Arc<Self>, path: &Path, registry: &TypeRegistry) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut out = Serializer::new(&mut writer, registry)?;
        out.write_record(Some(self))?;
        out.flush()?;
        log::info!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a database written by [`save_snapshot`](MemDatabase::save_snapshot).
    pub fn load_snapshot(path: &Path, registry: &TypeRegistry) -> Result<Arc<Self>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut input = Deserializer::new(&mut reader, registry)?;
        let db = input.read_record::<MemDatabase>()?.unwrap_or_default();
        log::info!("Loaded {} entries from {}", db.len(), path.display());
        Ok(db)
    }
}

impl GeoIpDatabase for MemDatabase {
    fn find(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>> {
        match addr {
            IpAddr::V4(v4) => Ok(self.find_addr(v4)),
            IpAddr::V6(_) => Ok(None),
        }
    }
}

impl Persistent for MemDatabase {
    const TYPE_TAG: TypeTag = TypeTag::from_chars(*b"gipm");
    const NAME: &'static str = "MemDatabase";
}

impl Record for MemDatabase {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn write_body(&self, out: &mut Serializer<'_>) -> Result<()> {
        let array = Arc::new(RecordArray::from_records(&self.entries, false));
        out.write_array(Some(&array))
    }

    fn read_body(&mut self, input: &mut Deserializer<'_>) -> Result<()> {
        self.entries = match input.read_array()? {
            Some(array) => array.to_typed::<Entry>()?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
