use zett_format::Sequence;

/// Parsed output of one block: the sequences in input order plus the
/// concatenated literal bytes they reference.
#[derive(Debug, Default)]
pub(crate) struct SequenceStore {
    pub seqs: Vec<Sequence>,
    pub lit: Vec<u8>,
}

impl SequenceStore {
    pub fn reset(&mut self) {
        self.seqs.clear();
        self.lit.clear();
    }

    /// Record one sequence. `off_code` uses the parser convention
    /// (0..=2 repcode index, otherwise distance + 2); storage shifts it
    /// by one into the decoded offset-value space.
    pub fn push(&mut self, literals: &[u8], off_code: u32, match_len: u32) {
        debug_assert!(match_len >= zett_format::MIN_MATCH);

        self.lit.extend_from_slice(literals);
        self.seqs.push(Sequence {
            lit_len: literals.len() as u32,
            offset: off_code + 1,
            match_len,
        });
    }

    /// Literals after the final sequence of the block.
    pub fn push_last_literals(&mut self, literals: &[u8]) {
        self.lit.extend_from_slice(literals);
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty() && self.lit.is_empty()
    }
}
