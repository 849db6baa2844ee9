#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(code(zett::fse::io))]
    IO(#[from] zett_io::Error),

    #[error("Invalid accuracy log: {0}")]
    #[diagnostic(
        code(zett::fse::invalid_accuracy_log),
        help("The accuracy log must be within valid bounds.")
    )]
    InvalidAccuracyLog(u8),

    #[error("FSE accuracy log mismatch. Expected <= {0}, got {1}")]
    #[diagnostic(
        code(zett::fse::accuracy_log_mismatch),
        help("The decoded accuracy log exceeds the table's maximum capability.")
    )]
    AccuracyLogMismatch(u8, u8),

    #[error("Accuracy log {0} is too small for this distribution")]
    #[diagnostic(
        code(zett::fse::accuracy_log_too_small),
        help(
            "Normalizing needs at least one table cell per observed symbol; raise the accuracy log."
        )
    )]
    AccuracyLogTooSmall(u8),

    #[error("Symbol {0} exceeds the maximum symbol value {1}")]
    #[diagnostic(
        code(zett::fse::max_symbol_value_too_large),
        help("The distribution describes symbols beyond the caller's alphabet.")
    )]
    MaxSymbolValueTooLarge(u16, u8),

    #[error("FSE sum mismatch. Expected 0 remaining, got {0}")]
    #[diagnostic(
        code(zett::fse::sum_mismatch),
        help("The sum of probabilities does not match the expected power of 2.")
    )]
    SumMismatch(i32),

    #[error("Distribution is a single symbol ({0})")]
    #[diagnostic(
        code(zett::fse::rle_distribution),
        help("A one-symbol stream must use an RLE table, not a normalized one.")
    )]
    RleDistribution(u8),

    #[error("Distribution could not be normalized")]
    #[diagnostic(
        code(zett::fse::normalization_failed),
        help("Even the corner-case normalizer could not give every symbol a cell.")
    )]
    NormalizationFailed,

    #[error("Spread alignment error (pos: {0})")]
    #[diagnostic(
        code(zett::fse::spread_alignment),
        help(
            "The symbol spread did not return to position 0. The distribution does not sum to the table size."
        )
    )]
    SpreadAlignmentError(usize),

    #[error("Data corruption detected")]
    #[diagnostic(
        code(zett::fse::corruption),
        help("The FSE encoded data appears to be corrupted.")
    )]
    Corruption,
}
