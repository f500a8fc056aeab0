//! Reference-block selection: the data-independent address stream used for
//! the first two slices of the first pass, and the J1/J2 mapping shared by
//! both addressing modes.

use zeroize::Zeroize;

use crate::block::{Block, Scratch, WORDS_PER_BLOCK};
use crate::SLICES_PER_LANE;

/// Argon2id type tag, word 5 of the address input block.
const ARGON2ID_Y: u64 = 2;

pub fn split_u64(n: u64) -> (u32, u32) {
    ((n & 0xffff_ffff) as u32, (n >> 32) as u32)
}

/// Data-independent (J1, J2) stream for one segment.
///
/// The input block carries (pass, lane, slice, m', t, y, counter); each
/// address block is G(ZERO, G(ZERO, input)) and yields 128 pseudorandom
/// words, consumed in column order. A fresh block is produced up front and
/// then after every 128 consumed columns, incrementing the counter.
pub struct Gen2i {
    input: Block,
    addresses: Block,
    scratch: Scratch,
    idx: usize,
}

impl Gen2i {
    pub fn new(
        start_at: usize,
        pass: u32,
        lane: u32,
        slice: u32,
        total_blocks: u32,
        passes: u32,
    ) -> Gen2i {
        let mut gen = Gen2i {
            input: Block::ZERO,
            addresses: Block::ZERO,
            scratch: Scratch::new(),
            idx: start_at,
        };
        let params = [
            pass as u64,
            lane as u64,
            slice as u64,
            total_blocks as u64,
            passes as u64,
            ARGON2ID_Y,
        ];
        for (i, &v) in params.iter().enumerate() {
            gen.input[i] = v;
        }
        gen.more();
        gen
    }

    /// Next (J1, J2) pair for the current column.
    pub fn nextj(&mut self) -> (u32, u32) {
        let word = self.addresses[self.idx];
        self.idx = (self.idx + 1) % WORDS_PER_BLOCK;
        if self.idx == 0 {
            self.more();
        }
        split_u64(word)
    }

    fn more(&mut self) {
        self.input[6] += 1;
        self.scratch.g2(&self.input, &mut self.addresses);
    }
}

impl Drop for Gen2i {
    fn drop(&mut self) {
        self.input.zeroize();
        self.addresses.zeroize();
    }
}

/// Map J1 onto a column of the reference lane.
///
/// The eligible window covers every block already written in the current
/// filling order, minus the block immediately before the current one when
/// the reference lane is the current lane. J1 is squared so that recently
/// written blocks are favored; the window starts right after the current
/// slice on later passes, wrapping around the lane.
pub fn index_alpha(
    pass: u32,
    slice: u32,
    same_lane: bool,
    sliceidx: u32,
    slicelen: u32,
    j1: u32,
) -> u32 {
    let lanelen = slicelen * SLICES_PER_LANE;
    let area: u32 = match (pass, slice, same_lane) {
        (0, 0, _) => sliceidx - 1,
        (0, _, false) => slice * slicelen - if sliceidx == 0 { 1 } else { 0 },
        (0, _, true) => slice * slicelen + sliceidx - 1,
        (_, _, false) => lanelen - slicelen - if sliceidx == 0 { 1 } else { 0 },
        (_, _, true) => lanelen - slicelen + sliceidx - 1,
    };

    let (area64, j1_64) = (area as u64, j1 as u64);
    let rel = (area64 - 1 - ((area64 * ((j1_64 * j1_64) >> 32)) >> 32)) as u32;

    let start = match (pass, slice) {
        (0, _) | (_, 3) => 0,
        _ => (slice + 1) * slicelen,
    };
    (start + rel) % lanelen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen2i_is_deterministic() {
        let mut a = Gen2i::new(0, 0, 1, 1, 64, 3);
        let mut b = Gen2i::new(0, 0, 1, 1, 64, 3);
        for _ in 0..300 {
            assert_eq!(a.nextj(), b.nextj());
        }
    }

    #[test]
    fn gen2i_depends_on_position() {
        let mut a = Gen2i::new(0, 0, 0, 1, 64, 3);
        let mut b = Gen2i::new(0, 0, 1, 1, 64, 3);
        let av: Vec<_> = (0..16).map(|_| a.nextj()).collect();
        let bv: Vec<_> = (0..16).map(|_| b.nextj()).collect();
        assert_ne!(av, bv);
    }

    #[test]
    fn gen2i_regenerates_after_block() {
        // Values 128.. come from a second address block with counter 2, so
        // the stream must not repeat with period 128.
        let mut gen = Gen2i::new(0, 0, 0, 0, 1024, 1);
        let first: Vec<_> = (0..128).map(|_| gen.nextj()).collect();
        let second: Vec<_> = (0..128).map(|_| gen.nextj()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn gen2i_start_offset_skips_values() {
        let mut from_zero = Gen2i::new(0, 0, 0, 0, 64, 3);
        let mut from_two = Gen2i::new(2, 0, 0, 0, 64, 3);
        from_zero.nextj();
        from_zero.nextj();
        assert_eq!(from_zero.nextj(), from_two.nextj());
    }

    #[test]
    fn alpha_stays_in_lane() {
        let slicelen = 16;
        let lanelen = slicelen * SLICES_PER_LANE;
        let j1s = [0u32, 1, 0x7fff_ffff, 0xffff_ffff, 12345, 0xdead_beef];
        for pass in 0..3 {
            for slice in 0..SLICES_PER_LANE {
                for same_lane in [false, true] {
                    let lo = if pass == 0 && slice == 0 { 2 } else { 0 };
                    // Same-lane is forced in the very first segment.
                    if pass == 0 && slice == 0 && !same_lane {
                        continue;
                    }
                    for sliceidx in lo..slicelen {
                        for &j1 in &j1s {
                            let z = index_alpha(pass, slice, same_lane, sliceidx, slicelen, j1);
                            assert!(z < lanelen);
                            if same_lane {
                                assert_ne!(z, slice * slicelen + sliceidx);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn alpha_first_segment_references_earlier_columns() {
        let slicelen = 16;
        for sliceidx in 2..slicelen {
            for &j1 in &[0u32, 77, 0xffff_ffff] {
                let z = index_alpha(0, 0, true, sliceidx, slicelen, j1);
                assert!(z < sliceidx);
            }
        }
    }

    #[test]
    fn alpha_biases_toward_recent_blocks() {
        // Large J1 maps near the start of the window, small J1 near its end.
        let slicelen = 256;
        let newest = index_alpha(0, 0, true, 255, slicelen, 0);
        let oldest = index_alpha(0, 0, true, 255, slicelen, 0xffff_ffff);
        assert!(newest > oldest);
    }
}
