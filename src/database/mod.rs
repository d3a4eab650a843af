//! Geo-IP range databases.
//!
//! - [`MemDatabase`]: sorted entries searched by binary search
//! - [`ShardedDatabase`]: one file per range in a directory tree keyed by
//!   shared address octets
//! - [`CachedDatabase`]: result cache and atomic snapshot swap over either

mod cached;
mod mem;
mod sharded;

use std::net::IpAddr;
use std::sync::Arc;

use crate::serial::{TypeDescriptor, TypeRegistry};
use crate::{Entry, Result};

pub use cached::{CacheStats, CachedDatabase};
pub use mem::MemDatabase;
pub use sharded::{shard_path, ShardedDatabase};

/// Address to location lookup.
pub trait GeoIpDatabase: Send + Sync {
    /// Find the entry whose range contains `addr`.
    ///
    /// Only IPv4 ranges are stored, IPv6 addresses are never found.
    fn find(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>>;
}

impl<D: GeoIpDatabase + ?Sized> GeoIpDatabase for Arc<D> {
    fn find(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>> {
        (**self).find(addr)
    }
}

/// Descriptors of the record types stored by the databases.
pub fn geo_types() -> [TypeDescriptor; 2] {
    [
        TypeDescriptor::of::<Entry>(),
        TypeDescriptor::of::<MemDatabase>(),
    ]
}

/// Register the record types stored by the databases.
pub fn register_types(registry: &mut TypeRegistry) -> Result<()> {
    for descriptor in geo_types() {
        registry.register(descriptor)?;
    }
    Ok(())
}
