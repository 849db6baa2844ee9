use zett_format::{MAX_BLOCK_SIZE, REP_INIT, Sequence};
use zett_io::Reader;

use crate::window::Window;

/// Per-frame decoder state: the output window, per-block literal and
/// sequence buffers, and the entropy tables that persist across blocks
/// for the repeat modes.
pub(crate) struct Context<R: Reader> {
    pub src: R,
    pub window: Window,
    /// `min(window_size, 128 KiB)`: no block may regenerate more.
    pub block_size_max: u32,

    pub literals: Vec<u8>,
    pub sequences: Vec<Sequence>,

    pub huff: Option<zett_huff0::DecodingTable>,
    pub fse: FseTables,
    pub offset_hist: [usize; 3],

    pub scratch: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct FseTables {
    pub ll: Option<zett_fse::DecodingTable>,
    pub of: Option<zett_fse::DecodingTable>,
    pub ml: Option<zett_fse::DecodingTable>,
}

impl<R: Reader> Context<R> {
    pub fn new(src: R) -> Self {
        Self {
            src,
            window: Window::default(),
            block_size_max: MAX_BLOCK_SIZE,
            literals: Vec::with_capacity(MAX_BLOCK_SIZE as usize),
            sequences: Vec::new(),
            huff: None,
            fse: FseTables::default(),
            offset_hist: [REP_INIT[0] as usize, REP_INIT[1] as usize, REP_INIT[2] as usize],
            scratch: vec![0; MAX_BLOCK_SIZE as usize],
        }
    }

    pub fn reset(&mut self, window_size: usize) {
        self.window.reset(window_size);
        self.block_size_max = MAX_BLOCK_SIZE.min(window_size.max(1) as u32);

        self.literals.clear();
        self.sequences.clear();

        self.huff = None;
        self.fse = FseTables::default();
        self.offset_hist =
            [REP_INIT[0] as usize, REP_INIT[1] as usize, REP_INIT[2] as usize];
    }
}
