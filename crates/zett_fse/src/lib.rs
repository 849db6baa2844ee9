//! Finite State Entropy (tANS) over byte alphabets, as Zstandard uses it:
//! normalized distributions with their compact NCount serialization, decode
//! tables read forward, and the dual-state encoder writing in reverse.

mod decode;
mod encode;
mod errors;
mod ncount;

pub use decode::{Decoder, DecodingTable};
pub use encode::{Encoder, EncodingTable};
pub use errors::Error;
pub use ncount::{
    ACCURACY_LOG_RANGE, MAX_SYMBOLS, MAX_TABLE_LOG, MIN_TABLE_LOG, NormalizedCounts,
    ncount_write_bound, optimal_table_log,
};
