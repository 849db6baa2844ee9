use zett_format::{
    DefaultDistribution, LL_BASELINES, LL_DIST, LL_EXTRA_BITS, MAX_LL_CODE, MAX_ML_CODE,
    MAX_OF_CODE, ML_BASELINES, ML_DIST, ML_EXTRA_BITS, OF_DIST, Sequence,
};
use zett_io::{BitReader, Reader, ReverseBitReader};

use crate::{context::Context, prelude::*};

impl<R: Reader> Context<R> {
    /// Parse the sequences section from the remainder of the block and
    /// decode every sequence into `self.sequences`.
    pub fn sequences_section(&mut self, src: &[u8]) -> Result<(), Error> {
        let (n_seqs, mut idx) = read_seq_count(src)?;
        self.sequences.clear();

        if n_seqs == 0 {
            return Ok(());
        }

        let modes = CompressionModes::read(*src.get(idx).ok_or(Error::Corruption)?)?;
        idx += 1;

        idx += update_table(
            modes.literal_lengths(),
            &LL_DIST,
            MAX_LL_CODE,
            &src[idx..],
            &mut self.fse.ll,
        )?;
        idx += update_table(
            modes.offsets(),
            &OF_DIST,
            MAX_OF_CODE,
            &src[idx..],
            &mut self.fse.of,
        )?;
        idx += update_table(
            modes.match_lengths(),
            &ML_DIST,
            MAX_ML_CODE,
            &src[idx..],
            &mut self.fse.ml,
        )?;

        let mut r = ReverseBitReader::new(&src[idx..])?;

        let ll_table = self.fse.ll.as_ref().ok_or(Error::MissingTableForRepeat)?;
        let of_table = self.fse.of.as_ref().ok_or(Error::MissingTableForRepeat)?;
        let ml_table = self.fse.ml.as_ref().ok_or(Error::MissingTableForRepeat)?;

        let mut ll_dec = zett_fse::Decoder::new(ll_table, &mut r)?;
        let mut of_dec = zett_fse::Decoder::new(of_table, &mut r)?;
        let mut ml_dec = zett_fse::Decoder::new(ml_table, &mut r)?;

        self.sequences.reserve(n_seqs);

        for seq_idx in 0..n_seqs {
            if seq_idx > 0 {
                ll_dec.update(&mut r)?;
                ml_dec.update(&mut r)?;
                of_dec.update(&mut r)?;
            }

            let offset = decode_of(of_dec.peek(), &mut r)?;
            let match_len = decode_ml(ml_dec.peek(), &mut r)?;
            let lit_len = decode_ll(ll_dec.peek(), &mut r)?;

            self.sequences.push(Sequence {
                lit_len,
                offset,
                match_len,
            });
        }

        if r.bits_remaining() > 0 {
            return Err(Error::ExtraBitsInStream(r.bits_remaining()));
        }

        Ok(())
    }
}

/// Variable-length sequence count: 1 byte below 128, 2 bytes below
/// 0x7F00, and a 3-byte escape above.
fn read_seq_count(src: &[u8]) -> Result<(usize, usize), Error> {
    let first = *src.first().ok_or(Error::Corruption)? as usize;

    match first {
        0..=127 => Ok((first, 1)),
        128..=254 => {
            let second = *src.get(1).ok_or(Error::Corruption)? as usize;
            Ok((((first - 128) << 8) + second, 2))
        }
        _ => {
            let second = *src.get(1).ok_or(Error::Corruption)? as usize;
            let third = *src.get(2).ok_or(Error::Corruption)? as usize;
            Ok((second + (third << 8) + 0x7F00, 3))
        }
    }
}

#[derive(Debug)]
pub struct CompressionModes(u8);

impl CompressionModes {
    fn read(val: u8) -> Result<Self, Error> {
        let ret = Self(val);

        if ret.reserved() != 0 {
            return Err(Error::ReservedBitSet);
        }
        Ok(ret)
    }

    fn literal_lengths(&self) -> Mode {
        Mode::from(TwoBitFlag::from_u8((self.0 >> 6) & 0x3))
    }

    fn offsets(&self) -> Mode {
        Mode::from(TwoBitFlag::from_u8((self.0 >> 4) & 0x3))
    }

    fn match_lengths(&self) -> Mode {
        Mode::from(TwoBitFlag::from_u8((self.0 >> 2) & 0x3))
    }

    fn reserved(&self) -> u8 {
        self.0 & 0x3
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// The predefined distribution; no table description present.
    Predefined,

    /// A single symbol byte used for every sequence in the block.
    RLE,

    /// A fresh FSE table description follows.
    FSECompressed,

    /// Reuse the table of the previous block that had sequences.
    Repeat,
}

impl From<TwoBitFlag> for Mode {
    fn from(val: TwoBitFlag) -> Self {
        match val {
            TwoBitFlag::Zero => Self::Predefined,
            TwoBitFlag::One => Self::RLE,
            TwoBitFlag::Two => Self::FSECompressed,
            TwoBitFlag::Three => Self::Repeat,
        }
    }
}

fn update_table(
    mode: Mode,
    dist: &DefaultDistribution,
    max_code: u8,
    src: &[u8],
    curr: &mut Option<zett_fse::DecodingTable>,
) -> Result<usize, Error> {
    match mode {
        Mode::Repeat => {
            if curr.is_none() {
                return Err(Error::MissingTableForRepeat);
            }
            Ok(0)
        }
        Mode::Predefined => {
            let norm = zett_fse::NormalizedCounts::from_predefined(
                dist.counts(),
                dist.predefined_accuracy_log(),
            );
            *curr = Some(zett_fse::DecodingTable::from_counts(&norm)?);
            Ok(0)
        }
        Mode::RLE => {
            let sym = *src.first().ok_or(Error::EmptyRLESource)?;
            if sym > max_code {
                return Err(Error::Corruption);
            }
            *curr = Some(zett_fse::DecodingTable::rle(sym));
            Ok(1)
        }
        Mode::FSECompressed => {
            let mut br = BitReader::new(src)?;
            *curr = Some(zett_fse::DecodingTable::read(
                &mut br,
                dist.max_accuracy_log(),
                max_code,
            )?);
            Ok(br.bytes_consumed())
        }
    }
}

#[inline(always)]
fn decode_ll(code: u8, r: &mut ReverseBitReader) -> Result<u32, Error> {
    if code > MAX_LL_CODE {
        return Err(Error::Corruption);
    }

    let baseline = LL_BASELINES[code as usize];
    let n_bits = LL_EXTRA_BITS[code as usize];
    Ok(baseline + r.read(n_bits)? as u32)
}

#[inline(always)]
fn decode_ml(code: u8, r: &mut ReverseBitReader) -> Result<u32, Error> {
    if code > MAX_ML_CODE {
        return Err(Error::Corruption);
    }

    let baseline = ML_BASELINES[code as usize];
    let n_bits = ML_EXTRA_BITS[code as usize];
    Ok(baseline + r.read(n_bits)? as u32)
}

#[inline(always)]
fn decode_of(code: u8, r: &mut ReverseBitReader) -> Result<u32, Error> {
    if code > MAX_OF_CODE {
        return Err(Error::Corruption);
    }

    let extra = r.read(code)?;
    Ok((1u32 << code) + extra as u32)
}
