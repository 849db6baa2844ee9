use zett_format::MAX_BLOCK_SIZE;
use zett_foundation::const_assert;
use zett_io::Reader;

use crate::{context::Context, prelude::*};

pub const HEADER_SIZE: usize = 3;

impl<R: Reader> Context<R> {
    /// Decode one block into the window. Returns whether it was the
    /// frame's last.
    pub fn block(&mut self) -> Result<bool, Error> {
        let header = Header::read(&mut self.src)?;
        if header.block_size() > self.block_size_max {
            return Err(Error::BlockSizeOutOfBounds(header.block_size()));
        }

        match header.block_type() {
            Type::Raw => {
                let count = header.block_size() as usize;
                let target = &mut self.scratch[..count];
                self.src.read_exact(target)?;
                self.window.push_buf(target);
            }
            Type::RLE => {
                let byte = self.src.read_u8()?;
                self.window.push_rle(byte, header.block_size() as usize);
            }
            Type::Compressed => {
                let count = header.block_size() as usize;
                let content = &mut self.scratch[..count];
                self.src.read_exact(content)?;

                // Sections are parsed from the in-memory block; the
                // sequence bitstream is the remainder after the tables.
                let scratch = std::mem::take(&mut self.scratch);
                let result = self.decode_compressed(&scratch[..count]);
                self.scratch = scratch;
                result?;
            }
        }

        Ok(header.last_block())
    }

    fn decode_compressed(&mut self, content: &[u8]) -> Result<(), Error> {
        let consumed = self.literals_section(content)?;
        self.sequences_section(&content[consumed..])?;
        self.execute_sequences()
    }
}

/// The 3-byte little-endian block header: last flag, type, size.
pub struct Header {
    last_block: bool,
    block_type: Type,
    block_size: u32,
}

impl Header {
    pub fn read(r: &mut impl Reader) -> Result<Self, Error> {
        let raw = {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf[..HEADER_SIZE])?;
            u32::from_le_bytes(buf)
        };

        let last_block = raw & 0x01 != 0;

        let block_type = {
            let block_type = ((raw >> 1) & 0x03) as u8;
            Type::try_from(TwoBitFlag::from_u8(block_type))?
        };

        let block_size = raw >> 3;
        if block_size > MAX_BLOCK_SIZE {
            return Err(Error::BlockSizeOutOfBounds(block_size));
        }

        Ok(Self {
            last_block,
            block_type,
            block_size,
        })
    }

    /// Whether the frame ends after this block (possibly followed by a
    /// content checksum).
    pub fn last_block(&self) -> bool {
        self.last_block
    }

    pub fn block_type(&self) -> Type {
        self.block_type
    }

    /// For raw and compressed blocks, the byte count of the block
    /// content; for RLE, the regenerated count.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Type {
    /// Uncompressed content, `block_size` bytes.
    Raw = 0,

    /// A single byte repeated `block_size` times.
    RLE = 1,

    /// A literals section followed by a sequences section.
    Compressed = 2,
}

const_assert!(Type::Raw.as_u32() == 0);
const_assert!(Type::RLE.as_u32() == 1);
const_assert!(Type::Compressed.as_u32() == 2);

impl Type {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<TwoBitFlag> for Type {
    type Error = Error;

    fn try_from(flag: TwoBitFlag) -> Result<Self, Self::Error> {
        match flag {
            TwoBitFlag::Zero => Ok(Self::Raw),
            TwoBitFlag::One => Ok(Self::RLE),
            TwoBitFlag::Two => Ok(Self::Compressed),
            TwoBitFlag::Three => Err(Error::ReservedBlock),
        }
    }
}
