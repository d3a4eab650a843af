//! Geolocation record for one address range.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::coordinate::Coordinates;
use crate::range::Range;
use crate::serial::{Deserializer, Persistent, Record, Serializer, TypeTag};
use crate::Result;

/// Placeholder datasets use for unknown text columns.
const PLACEHOLDER: &str = "-";

/// Geolocation of every address in `range`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    pub range: Range,
    /// ISO 3166 alpha-2 code, e.g. `DE`
    pub country_code: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip: String,
    /// Time zone as given by the dataset, e.g. `+01:00`
    pub tz: String,
    pub coordinates: Coordinates,
}

impl Entry {
    /// Create an entry with only range and country code set.
    pub fn new(range: Range, country_code: impl Into<String>) -> Self {
        Self {
            range,
            country_code: country_code.into(),
            ..Default::default()
        }
    }

    /// Whether country, state and city are all known.
    pub fn is_valid(&self) -> bool {
        [&self.country, &self.state, &self.city]
            .iter()
            .all(|s| !s.is_empty() && s.as_str() != PLACEHOLDER)
    }

    /// Check if the entry's range contains a 32-bit address value.
    pub fn contains(&self, value: u32) -> bool {
        self.range.contains(value)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.city, self.state, self.country)
    }
}

impl Persistent for Entry {
    const TYPE_TAG: TypeTag = TypeTag::from_chars(*b"gipe");
    const NAME: &'static str = "Entry";
}

impl Record for Entry {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn write_body(&self, out: &mut Serializer<'_>) -> Result<()> {
        self.range.write_to(out)?;
        for field in [
            &self.country_code,
            &self.country,
            &self.state,
            &self.city,
            &self.zip,
            &self.tz,
        ] {
            out.write_str(field)?;
        }
        self.coordinates.write_to(out)
    }

    fn read_body(&mut self, input: &mut Deserializer<'_>) -> Result<()> {
        self.range = Range::read_from(input)?;
        for field in [
            &mut self.country_code,
            &mut self.country,
            &mut self.state,
            &mut self.city,
            &mut self.zip,
            &mut self.tz,
        ] {
            *field = input.read_str()?;
        }
        self.coordinates = Coordinates::read_from(input)?;
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
