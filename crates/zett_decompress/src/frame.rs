use zett_format::WINDOW_SIZE_RANGE;
use zett_foundation::const_assert;
use zett_io::Reader;

use crate::prelude::*;

/// The frame header has a variable size, with a minimum of 2 bytes up to a
/// maximum of 14 bytes depending on optional parameters.
///
/// https://www.rfc-editor.org/rfc/rfc8878.pdf#name-frame-header
pub struct Header {
    descriptor: HeaderDescriptor,
    window_descriptor: WindowDescriptor,
    dictionary_id: Option<u32>,
    content_size: Option<u64>,
}

impl Header {
    pub fn read(src: &mut impl Reader) -> Result<Self, Error> {
        let descriptor = HeaderDescriptor::read(src.read_u8()?)?;

        let window_descriptor = if descriptor.is_single_segment() {
            WindowDescriptor(0)
        } else {
            WindowDescriptor(src.read_u8()?)
        };

        let dictionary_id = match descriptor.did_field_size() {
            DIDFieldSize::Zero => None,
            size => {
                let mut buf = [0u8; 4];
                src.read_exact(&mut buf[..size.as_usize()])?;
                Some(u32::from_le_bytes(buf))
            }
        };

        let content_size = match descriptor.fcs_field_size() {
            FCSFieldSize::Zero => None,
            size => {
                let mut buf = [0u8; 8];
                src.read_exact(&mut buf[..size.as_usize()])?;
                Some(u64::from_le_bytes(buf) + size.offset())
            }
        };

        if descriptor.is_single_segment() && content_size.is_none() {
            return Err(Error::Corruption);
        }

        Ok(Self {
            descriptor,
            window_descriptor,
            dictionary_id,
            content_size,
        })
    }

    /// The original (uncompressed) size.
    pub fn content_size(&self) -> Option<u64> {
        self.content_size
    }

    /// The ID of the dictionary required to properly decode the frame. When
    /// it's not present, it's up to the decoder to know which dictionary to
    /// use.
    pub fn dictionary_id(&self) -> Option<u32> {
        self.dictionary_id
    }

    /// Minimum memory buffer size to decode the compressed data.
    pub fn window_size(&self) -> Result<u64, Error> {
        if self.descriptor.is_single_segment() {
            return self.content_size.ok_or(Error::Corruption);
        }

        let size = self.window_descriptor.size();
        if !WINDOW_SIZE_RANGE.contains(&size) {
            return Err(Error::WindowSizeOutOfBounds(size));
        }

        Ok(size)
    }

    /// Whether the frame ends with a 32-bit checksum.
    pub fn has_checksum(&self) -> bool {
        self.descriptor.content_checksum_flag() == 1
    }
}

/// The first header byte. It describes which other fields are present;
/// decoding it is enough to tell the size of [Header].
///
/// | Bit Number | Field Name              |
/// |------------|-------------------------|
/// | 7-6        | Frame_Content_Size_Flag |
/// | 5          | Single_Segment_Flag     |
/// | 4          | (unused)                |
/// | 3          | (reserved)              |
/// | 2          | Content_Checksum_Flag   |
/// | 1-0        | Dictionary_ID_Flag      |
struct HeaderDescriptor(u8);

impl HeaderDescriptor {
    fn read(val: u8) -> Result<Self, Error> {
        let ret = Self(val);

        if ret.reserved_bit() != 0 {
            return Err(Error::ReservedBitSet);
        }

        Ok(ret)
    }

    /// A 2-bit flag, specifying whether [Header::content_size()] is
    /// provided within the header.
    fn fcs_flag(&self) -> TwoBitFlag {
        TwoBitFlag::from_u8(self.0 >> 6)
    }

    /// The number of bytes used by [Header::content_size()].
    ///
    /// | fcs_flag       | 0      | 1 | 2 | 3 |
    /// |----------------|--------|---|---|---|
    /// | fcs_field_size | 0 or 1 | 2 | 4 | 8 |
    ///
    /// When the flag is 0, the size depends on the single-segment flag:
    /// set means a 1-byte field, clear means no field at all.
    fn fcs_field_size(&self) -> FCSFieldSize {
        match self.fcs_flag() {
            TwoBitFlag::Zero => {
                if self.is_single_segment() {
                    FCSFieldSize::One
                } else {
                    FCSFieldSize::Zero
                }
            }
            TwoBitFlag::One => FCSFieldSize::Two,
            TwoBitFlag::Two => FCSFieldSize::Four,
            TwoBitFlag::Three => FCSFieldSize::Eight,
        }
    }

    /// Whether data must be regenerated within a single continuous memory
    /// segment. In that case no [WindowDescriptor] is present and
    /// [Header::content_size()] doubles as the window size.
    fn is_single_segment(&self) -> bool {
        (self.0 & 0x20) != 0
    }

    fn reserved_bit(&self) -> u8 {
        (self.0 & 0x8) >> 3
    }

    /// Whether a 32-bit content checksum closes the frame.
    fn content_checksum_flag(&self) -> u8 {
        (self.0 & 0x04) >> 2
    }

    /// A 2-bit flag, indicating whether a dictionary ID is provided within
    /// the header; it also specifies the size of this field.
    fn dictionary_id_flag(&self) -> TwoBitFlag {
        TwoBitFlag::from_u8(self.0 & 0x03)
    }

    /// | dictionary_id  | 0 | 1 | 2 | 3 |
    /// |----------------|---|---|---|---|
    /// | did_field_size | 0 | 1 | 2 | 4 |
    fn did_field_size(&self) -> DIDFieldSize {
        match self.dictionary_id_flag() {
            TwoBitFlag::Zero => DIDFieldSize::Zero,
            TwoBitFlag::One => DIDFieldSize::One,
            TwoBitFlag::Two => DIDFieldSize::Two,
            TwoBitFlag::Three => DIDFieldSize::Four,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FCSFieldSize {
    Zero = 0,
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

const_assert!(FCSFieldSize::Zero as usize == 0);
const_assert!(FCSFieldSize::Eight as usize == 8);

impl FCSFieldSize {
    const fn as_usize(self) -> usize {
        self as usize
    }

    /// The 2-byte field stores sizes biased by 256.
    const fn offset(&self) -> u64 {
        match self {
            Self::Two => 256,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DIDFieldSize {
    Zero = 0,
    One = 1,
    Two = 2,
    Four = 4,
}

const_assert!(DIDFieldSize::Zero as usize == 0);
const_assert!(DIDFieldSize::Four as usize == 4);

impl DIDFieldSize {
    pub const fn as_usize(self) -> usize {
        self as usize
    }
}

/// Minimum buffer guarantee for decoding:
/// `windowSize = (1 << (10 + exponent)) * (8 + mantissa) / 8`.
///
/// | Bit number | 7-3      | 2-0      |
/// |------------|----------|----------|
/// | Field name | exponent | mantissa |
struct WindowDescriptor(u8);

impl WindowDescriptor {
    const fn exponent(&self) -> u8 {
        self.0 >> 3
    }

    const fn mantissa(&self) -> u8 {
        self.0 & 0x7
    }

    const fn size(&self) -> u64 {
        zett_format::window_size_from_descriptor(self.exponent(), self.mantissa())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_header() -> Result<(), Error> {
        // Descriptor 0: no content size, window descriptor follows.
        let bytes = [0x00u8, 0x50];
        let header = Header::read(&mut &bytes[..])?;

        assert_eq!(header.content_size(), None);
        assert_eq!(header.dictionary_id(), None);
        assert!(!header.has_checksum());
        assert_eq!(header.window_size()?, 1 << 20);
        Ok(())
    }

    #[test]
    fn test_single_segment_with_byte_size() -> Result<(), Error> {
        let bytes = [0x20u8, 0x2A];
        let header = Header::read(&mut &bytes[..])?;

        assert_eq!(header.content_size(), Some(42));
        assert_eq!(header.window_size()?, 42);
        Ok(())
    }

    #[test]
    fn test_biased_two_byte_size() -> Result<(), Error> {
        let bytes = [0x60u8, 44, 0];
        let header = Header::read(&mut &bytes[..])?;

        assert_eq!(header.content_size(), Some(300));
        Ok(())
    }

    #[test]
    fn test_reserved_bit_rejected() {
        assert!(matches!(
            Header::read(&mut &[0x08u8, 0x00][..]),
            Err(Error::ReservedBitSet)
        ));
    }
}
