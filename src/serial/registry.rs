//! Type registry mapping tags to record constructors.

use std::collections::BTreeMap;
use std::fmt;

use super::format::TypeTag;
use super::reader::Deserializer;
use super::record::{Persistent, Record, RecordArray};
use super::writer::Serializer;
use crate::{Error, Result};

/// Factory and metadata for one registered record type.
#[derive(Clone)]
pub struct TypeDescriptor {
    tag: TypeTag,
    version: u16,
    name: &'static str,
    create: fn() -> Box<dyn Record>,
}

impl TypeDescriptor {
    /// Build a descriptor from explicit parts.
    pub fn new(
        tag: TypeTag,
        version: u16,
        name: &'static str,
        create: fn() -> Box<dyn Record>,
    ) -> Self {
        Self {
            tag,
            version,
            name,
            create,
        }
    }

    /// Descriptor for a [`Persistent`] type.
    pub fn of<T: Persistent>() -> Self {
        fn blank<T: Persistent>() -> Box<dyn Record> {
            Box::new(T::default())
        }
        Self::new(T::TYPE_TAG, T::VERSION, T::NAME, blank::<T>)
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Construct a blank instance to be filled by its body reader.
    pub fn create(&self) -> Box<dyn Record> {
        (self.create)()
    }

    /// Construct an empty array container with this type as element.
    pub fn create_array(&self, constant: bool) -> RecordArray {
        RecordArray::new(self.tag, constant)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("tag", &self.tag)
            .field("version", &self.version)
            .field("name", &self.name)
            .finish()
    }
}

/// Table of registered record types.
///
/// Registries are plain values: build one, register the types a stream may
/// contain and hand it to serializers and deserializers.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<TypeTag, TypeDescriptor>,
    id_counter: u32,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the geo record types.
    ///
    /// Infallible: the geo tags are distinct and none is reserved.
    pub fn with_geo_types() -> Self {
        let mut registry = Self::new();
        for descriptor in crate::database::geo_types() {
            registry.insert(descriptor);
        }
        registry
    }

    /// Register a descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        let tag = descriptor.tag();
        if tag.is_reserved() || self.types.contains_key(&tag) {
            return Err(Error::DuplicateType(tag));
        }
        self.insert(descriptor);
        Ok(())
    }

    fn insert(&mut self, descriptor: TypeDescriptor) {
        let tag = descriptor.tag();
        self.types.insert(tag, descriptor);
        self.id_counter += 1;
        log::debug!("registered type {}", tag);
    }

    /// Register a [`Persistent`] type.
    pub fn register_type<T: Persistent>(&mut self) -> Result<()> {
        self.register(TypeDescriptor::of::<T>())
    }

    /// Remove a registered type.
    pub fn unregister(&mut self, tag: TypeTag) -> Result<TypeDescriptor> {
        self.types.remove(&tag).ok_or(Error::UnknownType(tag))
    }

    /// Look up a descriptor by tag.
    pub fn lookup(&self, tag: TypeTag) -> Option<&TypeDescriptor> {
        self.types.get(&tag)
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.types.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Capture every registered type for a stream header.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            id_counter: self.id_counter,
            types: self
                .types
                .values()
                .map(|d| SnapshotEntry {
                    uid: d.tag().value(),
                    tag: d.tag(),
                    version: d.version(),
                })
                .collect(),
        }
    }
}

/// One type as recorded in a stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Registry key
    pub uid: u32,
    /// Tag of the type behind the key
    pub tag: TypeTag,
    /// Writer-side schema version
    pub version: u16,
}

/// Registry contents as written into a stream header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub id_counter: u32,
    pub types: Vec<SnapshotEntry>,
}

impl RegistrySnapshot {
    /// Writer-side version of a tag, if the stream declared it.
    pub fn version_of(&self, tag: TypeTag) -> Option<u16> {
        self.types.iter().find(|e| e.tag == tag).map(|e| e.version)
    }

    pub fn write_to(&self, out: &mut Serializer<'_>) -> Result<()> {
        out.write_u32(self.id_counter)?;
        out.write_u32(self.types.len() as u32)?;
        for entry in &self.types {
            out.write_u32(entry.uid)?;
            out.write_u32(entry.tag.value())?;
            out.write_u16(entry.version)?;
        }
        Ok(())
    }

    pub fn read_from(input: &mut Deserializer<'_>) -> Result<Self> {
        let id_counter = input.read_u32()?;
        let count = input.read_u32()?;
        let mut types = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let uid = input.read_u32()?;
            let tag = TypeTag(input.read_u32()?);
            let version = input.read_u16()?;
            types.push(SnapshotEntry { uid, tag, version });
        }
        Ok(Self { id_counter, types })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entry, MemDatabase};

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Entry>().unwrap();

        let descriptor = registry.lookup(Entry::TYPE_TAG).unwrap();
        assert_eq!(descriptor.tag(), Entry::TYPE_TAG);
        assert_eq!(descriptor.version(), Entry::VERSION);
        assert_eq!(descriptor.create().type_tag(), Entry::TYPE_TAG);
        assert!(registry.lookup(TypeTag::from_chars(*b"none")).is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Entry>().unwrap();
        let err = registry.register_type::<Entry>().unwrap_err();
        assert!(matches!(err, Error::DuplicateType(tag) if tag == Entry::TYPE_TAG));
    }

    #[test]
    fn test_reserved_tag_rejected() {
        let mut registry = TypeRegistry::new();
        let descriptor = TypeDescriptor::new(TypeTag::ARRAY, 1, "bogus", || -> Box<dyn Record> {
            Box::new(Entry::default())
        });
        assert!(registry.register(descriptor).is_err());
    }

    #[test]
    fn test_unregister_unknown_fails() {
        let mut registry = TypeRegistry::new();
        let err = registry.unregister(Entry::TYPE_TAG).unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));

        registry.register_type::<Entry>().unwrap();
        assert!(registry.unregister(Entry::TYPE_TAG).is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_geo_types_registered_once() {
        let mut registry = TypeRegistry::with_geo_types();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(Entry::TYPE_TAG));
        assert!(registry.contains(MemDatabase::TYPE_TAG));

        let err = crate::database::register_types(&mut registry).unwrap_err();
        assert!(matches!(err, Error::DuplicateType(tag) if tag == Entry::TYPE_TAG));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_snapshot_lists_every_type() {
        let registry = TypeRegistry::with_geo_types();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.types.len(), registry.len());
        assert_eq!(snapshot.id_counter, 2);
        assert_eq!(snapshot.version_of(Entry::TYPE_TAG), Some(Entry::VERSION));
        // ascending tag order
        assert!(snapshot.types.windows(2).all(|w| w[0].tag < w[1].tag));
    }

    #[test]
    fn test_id_counter_is_monotonic() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Entry>().unwrap();
        registry.unregister(Entry::TYPE_TAG).unwrap();
        registry.register_type::<Entry>().unwrap();
        assert_eq!(registry.snapshot().id_counter, 2);
    }
}
