#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Destination buffer too small: need {needed}, have {capacity}")]
    #[diagnostic(
        code(zett::compress::dst_size_too_small),
        help("Size the destination with max_compressed_len().")
    )]
    DstSizeTooSmall { needed: usize, capacity: usize },

    #[error("Compression level {0} is out of bounds")]
    #[diagnostic(
        code(zett::compress::parameter_out_of_bound),
        help("Levels run from 1 to 22.")
    )]
    LevelOutOfBound(i32),

    #[error("Streaming call in the wrong stage")]
    #[diagnostic(
        code(zett::compress::stage_wrong),
        help("A finished stream must be reset before further writes.")
    )]
    StageWrong,

    #[error(transparent)]
    #[diagnostic(code(zett::compress::fse))]
    FSE(#[from] zett_fse::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::compress::huff0))]
    Huff0(#[from] zett_huff0::Error),
}
