use zett_format::MAGIC_NUM;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Invalid magic number. Expected: {MAGIC_NUM:x}, got: {0:x}")]
    #[diagnostic(
        code(zett::decompress::invalid_magic_num),
        help("The input data does not start with the Zstandard magic number.")
    )]
    InvalidMagicNum(u32),

    #[error("Window size {0} is out of bounds")]
    #[diagnostic(
        code(zett::decompress::window_size_out_of_bounds),
        help("The requested window size is too large or invalid.")
    )]
    WindowSizeOutOfBounds(u64),

    #[error("Reserved bit is set")]
    #[diagnostic(
        code(zett::decompress::reserved_bit_set),
        help("A reserved bit in the frame header is set, which is not allowed.")
    )]
    ReservedBitSet,

    #[error("Reserved block type")]
    #[diagnostic(
        code(zett::decompress::reserved_block),
        help("Encountered a block type that is reserved.")
    )]
    ReservedBlock,

    #[error("Block size {0} is out of bounds")]
    #[diagnostic(
        code(zett::decompress::block_size_out_of_bounds),
        help("The block size exceeds the maximum allowed.")
    )]
    BlockSizeOutOfBounds(u32),

    #[error("Missing Huffman table")]
    #[diagnostic(
        code(zett::decompress::missing_huffman_table),
        help(
            "A treeless literals block appeared before any Huffman-compressed one in this frame."
        )
    )]
    MissingHuffTable,

    #[error("Missing table for repeat mode")]
    #[diagnostic(
        code(zett::decompress::missing_table_repeat),
        help("A repeat mode was specified but no previous table exists to repeat.")
    )]
    MissingTableForRepeat,

    #[error("Empty RLE source")]
    #[diagnostic(
        code(zett::decompress::empty_rle_source),
        help("RLE mode specified but source data is empty.")
    )]
    EmptyRLESource,

    #[error("Literals size {0} exceeds max block size")]
    #[diagnostic(
        code(zett::decompress::literals_size_too_large),
        help(
            "The regenerated size of the literals section exceeds the maximum allowed block size."
        )
    )]
    LiteralsSizeTooLarge(u32),

    #[error("Compressed size {0} exceeds max block size")]
    #[diagnostic(
        code(zett::decompress::compressed_size_too_large),
        help(
            "The compressed size of the literals section exceeds the maximum allowed block size."
        )
    )]
    CompressedSizeTooLarge(u32),

    #[error("Extra bits remaining in stream: {0}")]
    #[diagnostic(
        code(zett::decompress::extra_bits),
        help("The stream should be fully consumed, but bits remain.")
    )]
    ExtraBitsInStream(usize),

    #[error("Jump table error")]
    #[diagnostic(
        code(zett::decompress::jump_table_error),
        help("Error parsing the 4-stream jump table in the literals section.")
    )]
    JumpTableError,

    #[error("Literals buffer overread: idx {idx}, len {len}")]
    #[diagnostic(
        code(zett::decompress::literals_buffer_overread),
        help(
            "Attempted to read past the end of the literals buffer during sequence execution."
        )
    )]
    LiteralsBufferOverread { idx: usize, len: usize },

    #[error("Invalid offset {0}")]
    #[diagnostic(
        code(zett::decompress::invalid_offset),
        help("The offset is zero or reaches beyond the decoded history.")
    )]
    InvalidOffset(u64),

    #[error("Content checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    #[diagnostic(
        code(zett::decompress::checksum_wrong),
        help("The frame's xxh64 content checksum does not match the decoded data.")
    )]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Destination buffer too small: need {needed}, have {capacity}")]
    #[diagnostic(
        code(zett::decompress::dst_buffer_too_small),
        help("The decoded data does not fit the provided buffer.")
    )]
    DstBufferTooSmall { needed: usize, capacity: usize },

    #[error("Corrupted data")]
    #[diagnostic(
        code(zett::decompress::corruption),
        help("Generic data corruption detected.")
    )]
    Corruption,

    #[error(transparent)]
    #[diagnostic(code(zett::decompress::io))]
    IO(#[from] zett_io::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::decompress::huff0))]
    Huff0(#[from] zett_huff0::Error),

    #[error(transparent)]
    #[diagnostic(code(zett::decompress::fse))]
    FSE(#[from] zett_fse::Error),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IO(zett_io::Error::IO(value))
    }
}
