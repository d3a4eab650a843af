//! Wire format constants and type tags.

use std::fmt;

/// Magic value opening every stream ("shub").
pub const MAGIC: u32 = u32::from_be_bytes(*b"shub");

/// Current stream format version.
pub const FORMAT_VERSION: u16 = 1;

/// Stable 32-bit identifier of a persisted record type.
///
/// Tags are usually built from four ASCII characters so that they can be
/// read back in hex dumps and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeTag(pub u32);

impl TypeTag {
    /// Absent reference.
    pub const NIL: TypeTag = TypeTag(0);
    /// Homogeneous array of records (-1 on the wire).
    pub const ARRAY: TypeTag = TypeTag(-1i32 as u32);
    /// Reference to an instance already written in this session (-2 on the wire).
    pub const BACK_REF: TypeTag = TypeTag(-2i32 as u32);

    /// Build a tag from four characters, most significant first.
    pub const fn from_chars(chars: [u8; 4]) -> Self {
        TypeTag(u32::from_be_bytes(chars))
    }

    /// Raw tag value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this tag is one of the reserved framing tags.
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::NIL.0 || self.0 == Self::ARRAY.0 || self.0 == Self::BACK_REF.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TypeTag::NIL => return write!(f, "<nil>"),
            TypeTag::ARRAY => return write!(f, "<array>"),
            TypeTag::BACK_REF => return write!(f, "<ref>"),
            _ => {}
        }
        let printable: String = self
            .0
            .to_be_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect();
        write!(f, "'{}' ({:#010x})", printable, self.0)
    }
}

/// Check byte stored after a non-empty string length.
///
/// XOR fold of the four length bytes.
pub fn length_check_byte(length: i32) -> u8 {
    let l = length as u32;
    ((l >> 24) ^ (l >> 16) ^ (l >> 8) ^ l) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tags() {
        assert_eq!(TypeTag::NIL.value(), 0);
        assert_eq!(TypeTag::ARRAY.value(), 0xFFFF_FFFF);
        assert_eq!(TypeTag::BACK_REF.value(), 0xFFFF_FFFE);
        assert!(TypeTag::ARRAY.is_reserved());
        assert!(!TypeTag::from_chars(*b"gipe").is_reserved());
    }

    #[test]
    fn test_tag_display() {
        let tag = TypeTag::from_chars(*b"gipe");
        assert_eq!(tag.to_string(), "'gipe' (0x67697065)");

        let odd = TypeTag(0x0100_4142);
        assert!(odd.to_string().starts_with("'??AB'"));
    }

    #[test]
    fn test_length_check_byte() {
        assert_eq!(length_check_byte(0x0102_0304), 0x01 ^ 0x02 ^ 0x03 ^ 0x04);
        assert_eq!(length_check_byte(5), 5);
        assert_ne!(length_check_byte(300), length_check_byte(301));
    }

    #[test]
    fn test_magic() {
        assert_eq!(MAGIC.to_be_bytes(), *b"shub");
    }
}
