//! Binary object-graph serialization.
//!
//! Records are written as length-framed, type-tagged bodies. An instance
//! reachable through several references is written once and later emitted as
//! a back-reference, so shared structure survives a round-trip. Readers skip
//! trailing bytes they do not understand, which lets newer writers append
//! fields without breaking older readers.
//!
//! All integers are big-endian. 64-bit values are written as two 32-bit
//! halves, low half first.
//!
//! # Stream Structure
//!
//! ```text
//! +------------------+
//! |   MAGIC "shub"   |  u32
//! +------------------+
//! |     VERSION      |  u16
//! +------------------+
//! | REGISTRY SNAPSHOT|  id counter, count, (uid, tag, version)*
//! +------------------+
//! |     RECORDS      |  variable
//! +------------------+
//! ```
//!
//! # Record Reference
//!
//! ```text
//! NIL       : 0x00000000
//! BACK_REF  : 0xFFFFFFFE  ref_id:u32
//! ARRAY     : 0xFFFFFFFF  element:u32  const:u8  count:u64  capacity:u64  element*
//! OBJECT    : tag:u32     size:u32     body[size]
//! ```

mod format;
mod reader;
mod record;
mod registry;
mod writer;


pub use format::*;
pub use reader::{Deserializer, SeekRead};
pub use record::{downcast, Node, Persistent, Record, RecordArray};
pub use registry::{RegistrySnapshot, SnapshotEntry, TypeDescriptor, TypeRegistry};
pub use writer::{SeekWrite, Serializer};
