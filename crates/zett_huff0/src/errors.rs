#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(code(zett::huff0::io))]
    IO(#[from] zett_io::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::huff0::fse))]
    FSE(#[from] zett_fse::Error),

    #[error("Data corruption detected")]
    #[diagnostic(
        code(zett::huff0::corruption),
        help("The Huff0 encoded data appears to be corrupted.")
    )]
    Corruption,

    #[error("Weight {0} exceeds maximum bits {1}")]
    #[diagnostic(
        code(zett::huff0::weight_too_large),
        help(
            "A weight in the Huffman tree description exceeds the maximum allowed bits."
        )
    )]
    WeightTooLarge(u8, u8),

    #[error("Sum of weights is zero")]
    #[diagnostic(
        code(zett::huff0::zero_weight_sum),
        help(
            "The Huffman tree description is invalid because the sum of weights is zero."
        )
    )]
    ZeroWeightSum,

    #[error("Table log {0} exceeds maximum bits {1}")]
    #[diagnostic(
        code(zett::huff0::table_log_too_large),
        help("The calculated table depth exceeds the maximum allowed bits.")
    )]
    TableLogTooLarge(u8, u8),

    #[error("Invalid inferred weight (remainder: {0})")]
    #[diagnostic(
        code(zett::huff0::invalid_inferred_weight),
        help("The remaining weight for the last symbol is not a power of two.")
    )]
    InvalidInferredWeight(u32),

    #[error("Canonical code ranges do not fill the table")]
    #[diagnostic(
        code(zett::huff0::table_underflow),
        help("The weight ranks are inconsistent with the inferred table size.")
    )]
    TableUnderflow,

    #[error("Alphabet too large for a raw weight header ({0} weights)")]
    #[diagnostic(
        code(zett::huff0::too_many_weights),
        help(
            "Raw nibble headers carry at most 128 weights; wider alphabets need the FSE-compressed form."
        )
    )]
    TooManyWeights(usize),
}
