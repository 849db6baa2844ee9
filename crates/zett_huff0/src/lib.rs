//! Huff0: the canonical, length-limited Huffman coder Zstandard uses for
//! literals. Weights (code lengths biased from the table depth) travel
//! either as raw nibbles or FSE-compressed; the last present symbol's
//! weight is implied by the power-of-two completion of the Kraft sum.

mod decode;
mod encode;
mod errors;

pub use decode::{Decoder, DecodingTable};
pub use encode::{CompressedLiterals, EncodingTable, compress};
pub use errors::Error;

/// Depth cap for literal codes; decode tables never exceed `1 << 11`
/// entries.
pub const MAX_BITS: u8 = 11;

pub(crate) const MAX_SYMBOLS: usize = 256;

/// Weight streams are FSE-coded at this accuracy cap.
pub(crate) const WEIGHTS_ACCURACY_LOG: u8 = 6;
