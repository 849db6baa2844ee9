use zett_format::MAX_BLOCK_SIZE;
use zett_io::{Reader, ReverseBitReader};

use crate::{context::Context, prelude::*};

const RAW_RLE_BUF_SIZE: [usize; 4] = [0, 1, 0, 2];
const RAW_RLE_SHIFT: [usize; 4] = [3, 4, 3, 4];
const COMPRESSED_BUF_SIZE: [usize; 4] = [2, 2, 3, 4];
const COMPRESSED_BITS: [usize; 4] = [10, 10, 14, 18];
const COMPRESSED_STREAMS: [Streams; 4] =
    [Streams::One, Streams::Four, Streams::Four, Streams::Four];

impl<R: Reader> Context<R> {
    /// Parse the literals section from the block slice into
    /// `self.literals`. Returns the bytes consumed.
    pub fn literals_section(&mut self, src: &[u8]) -> Result<usize, Error> {
        let (header, header_size) = Header::read(src)?;
        if header.regenerated_size > MAX_BLOCK_SIZE {
            return Err(Error::LiteralsSizeTooLarge(header.regenerated_size));
        }

        let src = &src[header_size..];
        let regen = header.regenerated_size as usize;
        self.literals.resize(regen, 0);

        match header.ls_type {
            Type::Raw => {
                let bytes = src.get(..regen).ok_or(Error::Corruption)?;
                self.literals.copy_from_slice(bytes);
                Ok(header_size + regen)
            }

            Type::RLE => {
                let byte = *src.first().ok_or(Error::Corruption)?;
                self.literals.fill(byte);
                Ok(header_size + 1)
            }

            Type::Compressed | Type::Treeless => {
                let compressed_size =
                    header.compressed_size.ok_or(Error::Corruption)?;
                if compressed_size > MAX_BLOCK_SIZE {
                    return Err(Error::CompressedSizeTooLarge(compressed_size));
                }

                let payload = src
                    .get(..compressed_size as usize)
                    .ok_or(Error::Corruption)?;

                let read = if header.ls_type == Type::Compressed {
                    let (table, read) = zett_huff0::DecodingTable::read(payload)?;
                    self.huff = Some(table);
                    read
                } else {
                    0
                };

                let table = self.huff.as_ref().ok_or(Error::MissingHuffTable)?;
                huff_streams(
                    &payload[read..],
                    &mut self.literals,
                    table,
                    header.streams,
                )?;

                Ok(header_size + compressed_size as usize)
            }
        }
    }
}

fn huff_streams(
    src: &[u8],
    dst: &mut [u8],
    table: &zett_huff0::DecodingTable,
    streams: Streams,
) -> Result<(), Error> {
    match streams {
        Streams::One => {
            let mut r = ReverseBitReader::new(src)?;
            let mut decoder = zett_huff0::Decoder::new(table, &mut r);

            for d in dst.iter_mut() {
                *d = decoder.decode(&mut r);
            }

            if r.bits_remaining() > 0 {
                return Err(Error::ExtraBitsInStream(r.bits_remaining()));
            }

            Ok(())
        }
        Streams::Four => {
            if src.len() < 6 {
                return Err(Error::JumpTableError);
            }

            let s0 = u16::from_le_bytes([src[0], src[1]]) as usize;
            let s1 = u16::from_le_bytes([src[2], src[3]]) as usize;
            let s2 = u16::from_le_bytes([src[4], src[5]]) as usize;
            let payload = &src[6..];

            let total = s0 + s1 + s2;
            if total >= payload.len() {
                return Err(Error::JumpTableError);
            }
            let bounds = [0, s0, s0 + s1, total, payload.len()];

            let segment = dst.len().div_ceil(4);
            if dst.len() < 3 * segment {
                return Err(Error::JumpTableError);
            }

            for (i, chunk) in dst.chunks_mut(segment).enumerate() {
                let mut r = ReverseBitReader::new(&payload[bounds[i]..bounds[i + 1]])?;
                let mut decoder = zett_huff0::Decoder::new(table, &mut r);

                let batches = chunk.len() / 4;
                for batch in 0..batches {
                    let symbols = decoder.decode4(&mut r);
                    chunk[batch * 4..batch * 4 + 4].copy_from_slice(&symbols);
                }
                for d in chunk.iter_mut().skip(batches * 4) {
                    *d = decoder.decode(&mut r);
                }

                if r.bits_remaining() > 0 {
                    return Err(Error::ExtraBitsInStream(r.bits_remaining()));
                }
            }

            Ok(())
        }
    }
}

pub struct Header {
    ls_type: Type,
    regenerated_size: u32,
    compressed_size: Option<u32>,
    streams: Streams,
}

impl Header {
    /// Parse the 1-5 byte literals header; returns it with its size.
    pub fn read(src: &[u8]) -> Result<(Header, usize), Error> {
        let first = *src.first().ok_or(Error::Corruption)?;

        let ls_type = Type::from(TwoBitFlag::from_u8(first & 0x03));
        let size_format = (first >> 2) & 0x3;

        match ls_type {
            Type::Raw | Type::RLE => {
                let extra = RAW_RLE_BUF_SIZE[size_format as usize];
                let header = {
                    let mut buf = [0u8; 4];
                    buf[..1 + extra]
                        .copy_from_slice(src.get(..1 + extra).ok_or(Error::Corruption)?);
                    u32::from_le_bytes(buf)
                };

                let regenerated_size = header >> RAW_RLE_SHIFT[size_format as usize];
                Ok((
                    Self {
                        ls_type,
                        regenerated_size,
                        streams: Streams::One,
                        compressed_size: None,
                    },
                    1 + extra,
                ))
            }
            Type::Compressed | Type::Treeless => {
                let extra = COMPRESSED_BUF_SIZE[size_format as usize];
                let n_bits = COMPRESSED_BITS[size_format as usize];
                let mask = (1u64 << n_bits) - 1;

                let header = {
                    let mut buf = [0u8; 8];
                    buf[..1 + extra]
                        .copy_from_slice(src.get(..1 + extra).ok_or(Error::Corruption)?);
                    u64::from_le_bytes(buf)
                };
                let header = header >> 4;

                let regenerated_size = (header & mask) as u32;
                let compressed_size = ((header >> n_bits) & mask) as u32;

                Ok((
                    Self {
                        ls_type,
                        regenerated_size,
                        streams: COMPRESSED_STREAMS[size_format as usize],
                        compressed_size: Some(compressed_size),
                    },
                    1 + extra,
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Streams {
    One = 1,
    Four = 4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Type {
    /// Literals are stored uncompressed.
    Raw = 0,

    /// A single byte value repeated `regenerated_size` times.
    RLE = 1,

    /// A Huffman-compressed block, starting with a tree description.
    Compressed = 2,

    /// Huffman-compressed with the tree of the previous compressed
    /// block in this frame; corruption if there was none.
    Treeless = 3,
}

impl From<TwoBitFlag> for Type {
    fn from(value: TwoBitFlag) -> Self {
        match value {
            TwoBitFlag::Zero => Self::Raw,
            TwoBitFlag::One => Self::RLE,
            TwoBitFlag::Two => Self::Compressed,
            TwoBitFlag::Three => Self::Treeless,
        }
    }
}
