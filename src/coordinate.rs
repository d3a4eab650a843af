//! Latitude and longitude in degree / minute / second form.
//!
//! Coordinates are kept the way datasets and the wire format carry them:
//! whole degrees, whole minutes, fractional seconds and a hemisphere.
//! Text input is accepted either as signed decimal degrees (`52.52`,
//! `-13.405`) or as `D M S H` (`52 31 12.000 N`).

use std::fmt;

use crate::serial::{Deserializer, Serializer};
use crate::{Error, Result};

/// Hemisphere of a coordinate. Wire values 0 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Hemisphere {
    #[default]
    Unspecified = 0,
    North = 1,
    East = 2,
    South = 3,
    West = 4,
}

impl Hemisphere {
    /// Create from the wire value; unknown values map to `Unspecified`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Hemisphere::North,
            2 => Hemisphere::East,
            3 => Hemisphere::South,
            4 => Hemisphere::West,
            _ => Hemisphere::Unspecified,
        }
    }

    /// Parse a one letter hemisphere (`N`, `E`, `S`, `W`).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Hemisphere::North),
            'E' => Some(Hemisphere::East),
            'S' => Some(Hemisphere::South),
            'W' => Some(Hemisphere::West),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Hemisphere::North => Some('N'),
            Hemisphere::East => Some('E'),
            Hemisphere::South => Some('S'),
            Hemisphere::West => Some('W'),
            Hemisphere::Unspecified => None,
        }
    }

    /// Sign applied when converting to decimal degrees.
    pub fn sign(&self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            _ => 1.0,
        }
    }
}

/// Which axis a coordinate measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn hemisphere(self, negative: bool) -> Hemisphere {
        match (self, negative) {
            (Axis::Latitude, false) => Hemisphere::North,
            (Axis::Latitude, true) => Hemisphere::South,
            (Axis::Longitude, false) => Hemisphere::East,
            (Axis::Longitude, true) => Hemisphere::West,
        }
    }

    fn accepts(self, hemisphere: Hemisphere) -> bool {
        match self {
            Axis::Latitude => matches!(hemisphere, Hemisphere::North | Hemisphere::South),
            Axis::Longitude => matches!(hemisphere, Hemisphere::East | Hemisphere::West),
        }
    }
}

/// One angular coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub degrees: i16,
    pub minutes: i16,
    pub seconds: f32,
    pub hemisphere: Hemisphere,
}

impl Coordinate {
    pub fn new(degrees: i16, minutes: i16, seconds: f32, hemisphere: Hemisphere) -> Self {
        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }

    /// Parse a latitude. Empty text and `-` yield the unspecified default.
    pub fn parse_latitude(s: &str) -> Result<Self> {
        Self::parse(s, Axis::Latitude)
    }

    /// Parse a longitude. Empty text and `-` yield the unspecified default.
    pub fn parse_longitude(s: &str) -> Result<Self> {
        Self::parse(s, Axis::Longitude)
    }

    fn parse(s: &str, axis: Axis) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "-" {
            return Ok(Self::default());
        }
        let invalid = || Error::InvalidCoordinate(s.to_string());

        let parts: Vec<&str> = s.split_whitespace().collect();
        let coordinate = match parts.as_slice() {
            [decimal] => {
                let value: f64 = decimal.parse().map_err(|_| invalid())?;
                if !value.is_finite() || value.abs() > axis.limit() {
                    return Err(invalid());
                }
                Self::from_decimal(value.abs(), axis.hemisphere(value < 0.0))
            }
            [d, m, sec, h] => {
                let mut chars = h.chars();
                let hemisphere = match (chars.next(), chars.next()) {
                    (Some(c), None) => Hemisphere::from_char(c),
                    _ => None,
                }
                .filter(|h| axis.accepts(*h))
                .ok_or_else(invalid)?;
                let degrees: i16 = d.parse().map_err(|_| invalid())?;
                let minutes: i16 = m.parse().map_err(|_| invalid())?;
                let seconds: f32 = sec.parse().map_err(|_| invalid())?;
                if degrees < 0 || !(0..60).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
                    return Err(invalid());
                }
                Self::new(degrees, minutes, seconds, hemisphere)
            }
            _ => return Err(invalid()),
        };

        if coordinate.magnitude() > axis.limit() {
            return Err(invalid());
        }
        Ok(coordinate)
    }

    /// Split non-negative decimal degrees, rounded to the millisecond of arc.
    fn from_decimal(value: f64, hemisphere: Hemisphere) -> Self {
        let millis = (value * 3_600_000.0).round() as i64;
        let degrees = millis / 3_600_000;
        let minutes = millis % 3_600_000 / 60_000;
        let seconds = (millis % 60_000) as f32 / 1000.0;
        Self::new(degrees as i16, minutes as i16, seconds, hemisphere)
    }

    fn magnitude(&self) -> f64 {
        self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds as f64 / 3600.0
    }

    /// Signed decimal degrees.
    pub fn to_degrees(&self) -> f64 {
        self.hemisphere.sign() * self.magnitude()
    }

    pub fn is_specified(&self) -> bool {
        self.hemisphere != Hemisphere::Unspecified
    }

    /// Wire encoding: `i16 degrees, i16 minutes, f32 seconds, u8 hemisphere`.
    pub fn write_to(&self, out: &mut Serializer<'_>) -> Result<()> {
        out.write_i16(self.degrees)?;
        out.write_i16(self.minutes)?;
        out.write_f32(self.seconds)?;
        out.write_u8(self.hemisphere as u8)
    }

    pub fn read_from(input: &mut Deserializer<'_>) -> Result<Self> {
        let degrees = input.read_i16()?;
        let minutes = input.read_i16()?;
        let seconds = input.read_f32()?;
        let hemisphere = Hemisphere::from_u8(input.read_u8()?);
        Ok(Self::new(degrees, minutes, seconds, hemisphere))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hemisphere.as_char() {
            Some(h) => write!(
                f,
                "{:02} {:02} {:06.3} {}",
                self.degrees, self.minutes, self.seconds, h
            ),
            None => write!(f, "-"),
        }
    }
}

/// Latitude and longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinates {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
}

impl Coordinates {
    pub fn new(latitude: Coordinate, longitude: Coordinate) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse latitude and longitude columns.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        Ok(Self::new(
            Coordinate::parse_latitude(latitude)?,
            Coordinate::parse_longitude(longitude)?,
        ))
    }

    /// Latitude first.
    pub fn write_to(&self, out: &mut Serializer<'_>) -> Result<()> {
        self.latitude.write_to(out)?;
        self.longitude.write_to(out)
    }

    pub fn read_from(input: &mut Deserializer<'_>) -> Result<Self> {
        let latitude = Coordinate::read_from(input)?;
        let longitude = Coordinate::read_from(input)?;
        Ok(Self::new(latitude, longitude))
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_latitude() {
        let lat = Coordinate::parse_latitude("52.52").unwrap();
        assert_eq!(lat, Coordinate::new(52, 31, 12.0, Hemisphere::North));

        let south = Coordinate::parse_latitude("-33.8675").unwrap();
        assert_eq!(south.degrees, 33);
        assert_eq!(south.minutes, 52);
        assert_eq!(south.hemisphere, Hemisphere::South);
        assert!((south.to_degrees() + 33.8675).abs() < 1e-6);
    }

    #[test]
    fn test_parse_decimal_longitude() {
        let lon = Coordinate::parse_longitude("-0.1275").unwrap();
        assert_eq!(lon.degrees, 0);
        assert_eq!(lon.minutes, 7);
        assert_eq!(lon.seconds, 39.0);
        assert_eq!(lon.hemisphere, Hemisphere::West);
    }

    #[test]
    fn test_parse_dms() {
        let lat = Coordinate::parse_latitude("52 31 12.000 N").unwrap();
        assert_eq!(lat, Coordinate::new(52, 31, 12.0, Hemisphere::North));

        let lon = Coordinate::parse_longitude("13 24 18 e").unwrap();
        assert_eq!(lon.hemisphere, Hemisphere::East);
        assert_eq!(lon.seconds, 18.0);
    }

    #[test]
    fn test_parse_placeholder() {
        assert_eq!(Coordinate::parse_latitude("").unwrap(), Coordinate::default());
        assert_eq!(Coordinate::parse_longitude(" - ").unwrap(), Coordinate::default());
        assert!(!Coordinate::default().is_specified());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Coordinate::parse_latitude("north").is_err());
        assert!(Coordinate::parse_latitude("91.0").is_err());
        assert!(Coordinate::parse_longitude("181").is_err());
        assert!(Coordinate::parse_latitude("10 00 00 E").is_err());
        assert!(Coordinate::parse_latitude("10 75 00 N").is_err());
        assert!(Coordinate::parse_latitude("NaN").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_decimal() {
        // would wrap to 10 degrees if split before the range check
        assert!(matches!(
            Coordinate::parse_latitude("65546"),
            Err(Error::InvalidCoordinate(_))
        ));
        assert!(Coordinate::parse_longitude("-65716").is_err());
        assert!(Coordinate::parse_latitude("-90").unwrap().is_specified());
    }

    #[test]
    fn test_display() {
        let lat = Coordinate::new(52, 31, 12.0, Hemisphere::North);
        assert_eq!(lat.to_string(), "52 31 12.000 N");
        assert_eq!(Coordinate::default().to_string(), "-");

        let coords = Coordinates::parse("52.52", "13.405").unwrap();
        assert_eq!(coords.to_string(), "52 31 12.000 N, 13 24 18.000 E");
    }

    #[test]
    fn test_hemisphere_wire_values() {
        for value in 0..=4u8 {
            assert_eq!(Hemisphere::from_u8(value) as u8, value);
        }
        assert_eq!(Hemisphere::from_u8(9), Hemisphere::Unspecified);
    }
}
