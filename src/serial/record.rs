//! Record model: objects, arrays and the references between them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::format::TypeTag;
use super::reader::Deserializer;
use super::writer::Serializer;
use crate::{Error, Result};

/// A record type that can be written into and rebuilt from a stream.
///
/// `read_body` is called on a blank instance produced by the type's
/// registered constructor. It may stop early: the framing layer skips any
/// trailing bytes written by a newer version of the type.
pub trait Record: Any + Send + Sync + fmt::Debug {
    /// Registered tag of this record's type.
    fn type_tag(&self) -> TypeTag;

    /// Write the record body.
    fn write_body(&self, out: &mut Serializer<'_>) -> Result<()>;

    /// Read the record body into a blank instance.
    fn read_body(&mut self, input: &mut Deserializer<'_>) -> Result<()>;

    /// Upcast for typed extraction after a read.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A record type that can be registered by tag.
pub trait Persistent: Record + Default {
    /// Stable wire tag.
    const TYPE_TAG: TypeTag;
    /// Schema version recorded in stream headers.
    const VERSION: u16 = 1;
    /// Human readable name for diagnostics.
    const NAME: &'static str;
}

/// Homogeneous array of records sharing one element type.
#[derive(Debug, Clone)]
pub struct RecordArray {
    element: TypeTag,
    constant: bool,
    items: Vec<Option<Arc<dyn Record>>>,
}

impl RecordArray {
    /// Create an empty array for the given element type.
    pub fn new(element: TypeTag, constant: bool) -> Self {
        Self {
            element,
            constant,
            items: Vec::new(),
        }
    }

    /// Create an array from typed elements.
    pub fn from_records<T: Persistent>(records: &[Arc<T>], constant: bool) -> Self {
        let items = records
            .iter()
            .map(|r| Some(r.clone() as Arc<dyn Record>))
            .collect();
        Self {
            element: T::TYPE_TAG,
            constant,
            items,
        }
    }

    pub fn element_tag(&self) -> TypeTag {
        self.element
    }

    /// Whether the elements were declared immutable by the writer.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Append an element. Its type must match the array's element type.
    pub fn push(&mut self, item: Option<Arc<dyn Record>>) -> Result<()> {
        if let Some(record) = &item {
            check_tag(self.element, record.type_tag())?;
        }
        self.items.push(item);
        Ok(())
    }

    pub fn items(&self) -> &[Option<Arc<dyn Record>>] {
        &self.items
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    /// Extract the elements as a concrete type, dropping nil slots.
    pub fn to_typed<T: Persistent>(&self) -> Result<Vec<Arc<T>>> {
        check_tag(T::TYPE_TAG, self.element)?;
        self.items
            .iter()
            .flatten()
            .map(|record| downcast::<T>(record.clone()))
            .collect()
    }
}

/// A reference to either kind of framed record.
#[derive(Debug, Clone)]
pub enum Node {
    Object(Arc<dyn Record>),
    Array(Arc<RecordArray>),
}

impl Node {
    /// Tag written in front of this node.
    pub fn tag(&self) -> TypeTag {
        match self {
            Node::Object(record) => record.type_tag(),
            Node::Array(_) => TypeTag::ARRAY,
        }
    }

    /// Identity of the referenced instance within one session.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Node::Object(record) => identity_of(record),
            Node::Array(array) => identity_of(array),
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Record>> {
        match self {
            Node::Object(record) => Some(record),
            Node::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<RecordArray>> {
        match self {
            Node::Array(array) => Some(array),
            Node::Object(_) => None,
        }
    }
}

/// Data pointer of an `Arc`, used as the instance identity.
pub(crate) fn identity_of<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

/// Convert a dynamically typed record into its concrete type.
pub fn downcast<T: Persistent>(record: Arc<dyn Record>) -> Result<Arc<T>> {
    let found = record.type_tag();
    record.into_any().downcast::<T>().map_err(|_| Error::TypeMismatch {
        expected: T::TYPE_TAG,
        found,
    })
}

fn check_tag(expected: TypeTag, found: TypeTag) -> Result<()> {
    if expected != found {
        return Err(Error::TypeMismatch { expected, found });
    }
    Ok(())
}
