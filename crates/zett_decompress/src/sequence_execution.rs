use zett_io::Reader;

use crate::{context::Context, prelude::*};

impl<R: Reader> Context<R> {
    /// Replay the decoded sequences against the window: literal run,
    /// offset resolution through the repeat history, match copy.
    pub fn execute_sequences(&mut self) -> Result<(), Error> {
        let regenerated = self.literals.len() as u64
            + self
                .sequences
                .iter()
                .map(|s| s.match_len as u64)
                .sum::<u64>();
        if regenerated > self.block_size_max as u64 {
            return Err(Error::BlockSizeOutOfBounds(self.block_size_max));
        }

        let literals = &self.literals;
        let mut lit_idx = 0usize;

        for seq in &self.sequences {
            let lit_len = seq.lit_len as usize;
            if lit_len > 0 {
                let next = lit_idx
                    .checked_add(lit_len)
                    .filter(|&n| n <= literals.len())
                    .ok_or(Error::LiteralsBufferOverread {
                        idx: lit_idx,
                        len: lit_len,
                    })?;

                self.window.push_buf(&literals[lit_idx..next]);
                lit_idx = next;
            }

            let offset = resolve_offset(&mut self.offset_hist, seq.offset, lit_len)?;

            if seq.match_len > 0 {
                self.window.copy_within(offset, seq.match_len as usize)?;
            }
        }

        if lit_idx < literals.len() {
            self.window.push_buf(&literals[lit_idx..]);
        }

        Ok(())
    }
}

/// Map a decoded offset value to a distance and update the three-slot
/// repeat history: values 1..=3 select (possibly shifted when the
/// literal run is empty) recent offsets, larger values carry
/// `distance + 3` directly.
fn resolve_offset(
    history: &mut [usize; 3],
    offset: u32,
    lit_len: usize,
) -> Result<usize, Error> {
    let offset = offset as usize;

    if offset > 3 {
        let distance = offset - 3;
        history[2] = history[1];
        history[1] = history[0];
        history[0] = distance;
        return Ok(distance);
    }

    // Repcode space, shifted by one when the literal run is empty.
    let rep_code = offset - 1 + (lit_len == 0) as usize;
    let distance = match rep_code {
        0 => return Ok(history[0]),
        1 => history[1],
        2 => history[2],
        _ => history[0].checked_sub(1).ok_or(Error::InvalidOffset(0))?,
    };

    if distance == 0 {
        return Err(Error::InvalidOffset(0));
    }

    if rep_code >= 2 {
        history[2] = history[1];
    }
    history[1] = history[0];
    history[0] = distance;

    Ok(distance)
}
