//! Zett: a Zstandard codec.
//!
//! One-shot entry points live here; the halves are usable on their own
//! through `zett_compress` and `zett_decompress`.
//!
//! ```
//! let frame = zett::compress_to_vec(b"so much data", 3).expect("compresses");
//! let back = zett::decompress_to_vec(&frame).expect("round-trips");
//! assert_eq!(back, b"so much data");
//! ```

pub use zett_compress::{
    CompressionParams, Compressor, DEFAULT_LEVEL, EndDirective, Error as CompressError,
    InBuffer, MAX_LEVEL, MIN_LEVEL, OutBuffer, compress, compress_to_vec,
    compress_to_vec_with, max_compressed_len,
};
pub use zett_decompress::{
    Decoder, Error as DecompressError, decompress, decompress_to_vec,
};
