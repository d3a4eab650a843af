//! Stream serializer.

use ahash::AHashMap;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use super::format::*;
use super::record::{Node, Persistent, Record, RecordArray};
use super::registry::TypeRegistry;
use crate::{Error, Result};

/// Output stream a serializer can patch in place.
pub trait SeekWrite: Write + Seek {}

impl<T: Write + Seek + ?Sized> SeekWrite for T {}

/// Writes primitives and record graphs in network byte order.
///
/// One serializer is one session: instances written twice are emitted as
/// back-references to the id assigned on first write.
pub struct Serializer<'a> {
    stream: &'a mut dyn SeekWrite,
    registry: &'a TypeRegistry,
    refs: AHashMap<usize, (u32, Node)>,
    ref_counter: u32,
}

impl<'a> Serializer<'a> {
    /// Start a session and write the stream header.
    pub fn new(stream: &'a mut dyn SeekWrite, registry: &'a TypeRegistry) -> Result<Self> {
        let mut serializer = Self::headless(stream, registry);
        serializer.write_header()?;
        Ok(serializer)
    }

    /// Start a session without writing a header.
    pub fn headless(stream: &'a mut dyn SeekWrite, registry: &'a TypeRegistry) -> Self {
        Self {
            stream,
            registry,
            refs: AHashMap::new(),
            ref_counter: 0,
        }
    }

    fn write_header(&mut self) -> Result<()> {
        self.write_u32(MAGIC)?;
        self.write_u16(FORMAT_VERSION)?;
        let snapshot = self.registry.snapshot();
        snapshot.write_to(self)
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

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Two 32-bit halves, low half first.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_u32(value as u32)?;
        self.write_u32((value >> 32) as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    /// Narrow string: length, check byte, UTF-8 bytes.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let length = self.write_length(value.len())?;
        if length > 0 {
            self.write_bytes(value.as_bytes())?;
        }
        Ok(())
    }

    /// Wide string: length in UTF-16 units, check byte, one u16 per unit.
    pub fn write_wide_str(&mut self, value: &str) -> Result<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let length = self.write_length(units.len())?;
        if length > 0 {
            for unit in units {
                self.write_u16(unit)?;
            }
        }
        Ok(())
    }

    fn write_length(&mut self, len: usize) -> Result<i32> {
        let length = i32::try_from(len).map_err(|_| {
            Error::InvalidText(format!("string length {} out of range", len))
        })?;
        self.write_i32(length)?;
        if length > 0 {
            self.write_u8(length_check_byte(length))?;
        }
        Ok(length)
    }

    /// Write a typed record reference.
    pub fn write_record<T: Persistent>(&mut self, record: Option<&Arc<T>>) -> Result<()> {
        match record {
            Some(record) => self.write_object(record.clone()),
            None => self.write_u32(TypeTag::NIL.value()),
        }
    }

    /// Write an array reference.
    pub fn write_array(&mut self, array: Option<&Arc<RecordArray>>) -> Result<()> {
        match array {
            Some(array) => self.write_array_node(array.clone()),
            None => self.write_u32(TypeTag::NIL.value()),
        }
    }

    /// Write any record reference.
    pub fn write_node(&mut self, node: Option<&Node>) -> Result<()> {
        match node {
            Some(Node::Object(record)) => self.write_object(record.clone()),
            Some(Node::Array(array)) => self.write_array_node(array.clone()),
            None => self.write_u32(TypeTag::NIL.value()),
        }
    }

    /// Emit a back-reference if the instance was already written.
    ///
    /// Otherwise assigns the next reference id and returns false. The table
    /// holds the node until the session ends, so its address stays unique.
    fn write_back_ref(&mut self, node: Node) -> Result<bool> {
        let identity = node.identity();
        if let Some(&(ref_id, _)) = self.refs.get(&identity) {
            self.write_u32(TypeTag::BACK_REF.value())?;
            self.write_u32(ref_id)?;
            return Ok(true);
        }
        self.ref_counter += 1;
        self.refs.insert(identity, (self.ref_counter, node));
        Ok(false)
    }

    fn write_object(&mut self, record: Arc<dyn Record>) -> Result<()> {
        let tag = record.type_tag();
        if !self.registry.contains(tag) {
            return Err(Error::UnknownType(tag));
        }
        if self.write_back_ref(Node::Object(record.clone()))? {
            return Ok(());
        }

        self.write_u32(tag.value())?;
        let size_pos = self.tell()?;
        self.write_u32(0)?;
        let base = self.tell()?;
        record.write_body(self)?;
        let end = self.tell()?;

        let size = u32::try_from(end - base).map_err(|_| Error::OversizedRecord {
            tag,
            declared: u32::MAX,
            consumed: end - base,
        })?;
        self.seek(size_pos)?;
        self.write_u32(size)?;
        self.seek(end)
    }

    fn write_array_node(&mut self, array: Arc<RecordArray>) -> Result<()> {
        let element = array.element_tag();
        if !self.registry.contains(element) {
            return Err(Error::UnknownType(element));
        }
        if self.write_back_ref(Node::Array(array.clone()))? {
            return Ok(());
        }

        self.write_u32(TypeTag::ARRAY.value())?;
        self.write_u32(element.value())?;
        self.write_bool(array.is_constant())?;
        self.write_u64(array.len() as u64)?;
        self.write_u64(array.capacity() as u64)?;
        for item in array.items() {
            match item {
                Some(record) => {
                    if record.type_tag() != element {
                        return Err(Error::TypeMismatch {
                            expected: element,
                            found: record.type_tag(),
                        });
                    }
                    self.write_object(record.clone())?;
                }
                None => self.write_u32(TypeTag::NIL.value())?,
            }
        }
        Ok(())
    }
}
