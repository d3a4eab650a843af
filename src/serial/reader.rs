//! Stream deserializer.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use super::format::*;
use super::record::{downcast, Node, Persistent, Record, RecordArray};
use super::registry::{RegistrySnapshot, TypeRegistry};
use crate::{Error, Result};

/// Input stream a deserializer can skip forward in.
pub trait SeekRead: Read + Seek {}

impl<T: Read + Seek + ?Sized> SeekRead for T {}

/// Upper bound on capacity pre-allocated from untrusted count fields.
const MAX_PREALLOCATE: u64 = 1 << 16;

/// Reads primitives and rebuilds record graphs.
///
/// Records are constructed through the live registry. The registry snapshot
/// found in the stream header is kept so body readers can ask which version
/// of their type produced the stream.
pub struct Deserializer<'a> {
    stream: &'a mut dyn SeekRead,
    registry: &'a TypeRegistry,
    /// Slot `n - 1` holds the instance with reference id `n`; a slot stays
    /// empty while its record body is being read.
    refs: Vec<Option<Node>>,
    version: u16,
    stream_types: RegistrySnapshot,
}

impl<'a> Deserializer<'a> {
    /// Start a session and validate the stream header.
    pub fn new(stream: &'a mut dyn SeekRead, registry: &'a TypeRegistry) -> Result<Self> {
        let mut deserializer = Self::headless(stream, registry);
        deserializer.read_header()?;
        Ok(deserializer)
    }

    /// Start a session on a stream without a header.
    pub fn headless(stream: &'a mut dyn SeekRead, registry: &'a TypeRegistry) -> Self {
        Self {
            stream,
            registry,
            refs: Vec::new(),
            version: FORMAT_VERSION,
            stream_types: RegistrySnapshot::default(),
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let magic = self.read_u32()?;
        if magic != MAGIC {
            return Err(Error::InvalidStream(magic));
        }
        self.version = self.read_u16()?;
        self.stream_types = RegistrySnapshot::read_from(self)?;
        Ok(())
    }

    /// Format version declared by the stream header.
    pub fn format_version(&self) -> u16 {
        self.version
    }

    /// Types declared by the stream header.
    pub fn stream_types(&self) -> &RegistrySnapshot {
        &self.stream_types
    }

    /// Writer-side version of a record type.
    pub fn stream_version_of(&self, tag: TypeTag) -> Option<u16> {
        self.stream_types.version_of(tag)
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    /// Current stream position.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.stream.stream_position()?)
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_fixed()?))
    }

    /// Two 32-bit halves, low half first.
    pub fn read_u64(&mut self) -> Result<u64> {
        let low = self.read_u32()? as u64;
        let high = self.read_u32()? as u64;
        Ok(high << 32 | low)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_str(&mut self) -> Result<String> {
        let length = self.read_length()?;
        if length == 0 {
            return Ok(String::new());
        }
        let mut bytes = Vec::new();
        (&mut *self.stream)
            .take(length as u64)
            .read_to_end(&mut bytes)?;
        if bytes.len() != length {
            return Err(unexpected_eof());
        }
        String::from_utf8(bytes).map_err(|e| Error::InvalidText(e.to_string()))
    }

    pub fn read_wide_str(&mut self) -> Result<String> {
        let length = self.read_length()?;
        let mut units = Vec::with_capacity(length.min(MAX_PREALLOCATE as usize));
        for _ in 0..length {
            units.push(self.read_u16()?);
        }
        String::from_utf16(&units).map_err(|e| Error::InvalidText(e.to_string()))
    }

    fn read_length(&mut self) -> Result<usize> {
        let length = self.read_i32()?;
        if length == 0 {
            return Ok(0);
        }
        let checksum = self.read_u8()?;
        if length < 0 || length_check_byte(length) != checksum {
            return Err(Error::CorruptString { length, checksum });
        }
        Ok(length as usize)
    }

    /// Read a typed record reference.
    pub fn read_record<T: Persistent>(&mut self) -> Result<Option<Arc<T>>> {
        match self.read_node()? {
            None => Ok(None),
            Some(Node::Object(record)) => downcast::<T>(record).map(Some),
            Some(Node::Array(_)) => Err(Error::TypeMismatch {
                expected: T::TYPE_TAG,
                found: TypeTag::ARRAY,
            }),
        }
    }

    /// Read an array reference.
    pub fn read_array(&mut self) -> Result<Option<Arc<RecordArray>>> {
        match self.read_node()? {
            None => Ok(None),
            Some(Node::Array(array)) => Ok(Some(array)),
            Some(Node::Object(record)) => Err(Error::TypeMismatch {
                expected: TypeTag::ARRAY,
                found: record.type_tag(),
            }),
        }
    }

    /// Read any record reference.
    pub fn read_node(&mut self) -> Result<Option<Node>> {
        let tag = TypeTag(self.read_u32()?);
        match tag {
            TypeTag::NIL => Ok(None),
            TypeTag::BACK_REF => {
                let ref_id = self.read_u32()?;
                self.resolve(ref_id).map(Some)
            }
            TypeTag::ARRAY => self.read_array_body().map(|a| Some(Node::Array(a))),
            _ => self.read_object(tag).map(|r| Some(Node::Object(r))),
        }
    }

    fn resolve(&self, ref_id: u32) -> Result<Node> {
        ref_id
            .checked_sub(1)
            .and_then(|idx| self.refs.get(idx as usize))
            .and_then(|slot| slot.clone())
            .ok_or(Error::UnresolvedReference(ref_id))
    }

    fn reserve_ref(&mut self) -> usize {
        self.refs.push(None);
        self.refs.len() - 1
    }

    fn read_array_body(&mut self) -> Result<Arc<RecordArray>> {
        let element = TypeTag(self.read_u32()?);
        let constant = self.read_bool()?;
        let mut array = self
            .registry
            .lookup(element)
            .ok_or(Error::UnknownType(element))?
            .create_array(constant);
        let slot = self.reserve_ref();

        let count = self.read_u64()?;
        let capacity = self.read_u64()?;
        array.reserve(count.max(capacity).min(MAX_PREALLOCATE) as usize);
        for _ in 0..count {
            let item = match self.read_node()? {
                None => None,
                Some(Node::Object(record)) => Some(record),
                Some(Node::Array(_)) => {
                    return Err(Error::TypeMismatch {
                        expected: element,
                        found: TypeTag::ARRAY,
                    })
                }
            };
            array.push(item)?;
        }

        let array = Arc::new(array);
        self.refs[slot] = Some(Node::Array(array.clone()));
        Ok(array)
    }

    fn read_object(&mut self, tag: TypeTag) -> Result<Arc<dyn Record>> {
        let mut record = self
            .registry
            .lookup(tag)
            .ok_or(Error::UnknownType(tag))?
            .create();
        let slot = self.reserve_ref();

        let declared = self.read_u32()?;
        let base = self.tell()?;
        record.read_body(self)?;
        let end = self.tell()?;

        let consumed = end - base;
        if consumed > declared as u64 {
            return Err(Error::OversizedRecord {
                tag,
                declared,
                consumed,
            });
        }
        if consumed < declared as u64 {
            log::debug!(
                "skipping {} trailing bytes of {}",
                declared as u64 - consumed,
                tag
            );
            self.seek(base + declared as u64)?;
        }

        let record: Arc<dyn Record> = Arc::from(record);
        self.refs[slot] = Some(Node::Object(record.clone()));
        Ok(record)
    }
}

fn unexpected_eof() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "stream ended inside a string",
    ))
}
