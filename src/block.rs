//! The 1024-byte memory block, the lane/column matrix, and the compression
//! function G built from the BLAKE2b round permutation.

use std::ops::{BitXorAssign, Index, IndexMut};

use zeroize::Zeroize;

use crate::Error;

pub const ARGON2_BLOCK_BYTES: usize = 1024;
pub const WORDS_PER_BLOCK: usize = ARGON2_BLOCK_BYTES / 8;

/// 128 little-endian 64-bit words.
#[derive(Clone)]
pub struct Block([u64; WORDS_PER_BLOCK]);

impl Block {
    pub const ZERO: Block = Block([0; WORDS_PER_BLOCK]);

    pub fn from_le_bytes(bytes: &[u8; ARGON2_BLOCK_BYTES]) -> Block {
        let mut blk = Block::ZERO;
        for (w, chunk) in blk.0.iter_mut().zip(bytes.chunks_exact(8)) {
            *w = u64::from_le_bytes(chunk.try_into().unwrap());
        }
        blk
    }

    pub fn to_le_bytes(&self, out: &mut [u8; ARGON2_BLOCK_BYTES]) {
        for (chunk, w) in out.chunks_exact_mut(8).zip(self.0.iter()) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
    }
}

impl Index<usize> for Block {
    type Output = u64;
    fn index(&self, i: usize) -> &u64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Block {
    fn index_mut(&mut self, i: usize) -> &mut u64 {
        &mut self.0[i]
    }
}

impl BitXorAssign<&Block> for Block {
    fn bitxor_assign(&mut self, rhs: &Block) {
        for (d, s) in self.0.iter_mut().zip(rhs.0.iter()) {
            *d ^= s;
        }
    }
}

impl Zeroize for Block {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// The memory matrix: `lanes` rows of `lanelen` blocks, stored lane-major.
/// Wipes itself before releasing its storage, also when unwinding.
pub struct Matrix {
    blocks: Vec<Block>,
    lanelen: u32,
}

impl Matrix {
    pub fn new(lanes: u32, lanelen: u32) -> Result<Matrix, Error> {
        let total = (lanes as usize)
            .checked_mul(lanelen as usize)
            .ok_or(Error::AllocFailed)?;
        let mut blocks = Vec::new();
        blocks.try_reserve_exact(total).map_err(|_| Error::AllocFailed)?;
        blocks.resize(total, Block::ZERO);
        Ok(Matrix { blocks, lanelen })
    }

    fn idx(&self, lane: u32, col: u32) -> usize {
        debug_assert!(col < self.lanelen);
        lane as usize * self.lanelen as usize + col as usize
    }

    /// XOR of every lane's final column.
    pub fn last_column_xor(&self) -> Block {
        let last = (self.lanelen - 1) as usize;
        let mut acc = Block::ZERO;
        for lane in self.blocks.chunks_exact(self.lanelen as usize) {
            acc ^= &lane[last];
        }
        acc
    }

    pub fn wipe(&mut self) {
        for blk in self.blocks.iter_mut() {
            blk.zeroize();
        }
    }
}

impl Index<(u32, u32)> for Matrix {
    type Output = Block;
    fn index(&self, (lane, col): (u32, u32)) -> &Block {
        &self.blocks[self.idx(lane, col)]
    }
}

impl IndexMut<(u32, u32)> for Matrix {
    fn index_mut(&mut self, (lane, col): (u32, u32)) -> &mut Block {
        let i = self.idx(lane, col);
        &mut self.blocks[i]
    }
}

impl Drop for Matrix {
    fn drop(&mut self) {
        self.wipe();
    }
}

#[inline(always)]
fn lower_mult(a: u64, b: u64) -> u64 {
    (a & 0xffff_ffff).wrapping_mul(b & 0xffff_ffff).wrapping_mul(2)
}

// GB extends BLAKE2b's quarter-round with a low-32-bit product; everything
// is wrapping 64-bit arithmetic.
macro_rules! gb {
    ($a: expr, $b: expr, $c: expr, $d: expr) => {
        $a = $a.wrapping_add($b).wrapping_add(lower_mult($a, $b));
        $d = ($d ^ $a).rotate_right(32);
        $c = $c.wrapping_add($d).wrapping_add(lower_mult($c, $d));
        $b = ($b ^ $c).rotate_right(24);
        $a = $a.wrapping_add($b).wrapping_add(lower_mult($a, $b));
        $d = ($d ^ $a).rotate_right(16);
        $c = $c.wrapping_add($d).wrapping_add(lower_mult($c, $d));
        $b = ($b ^ $c).rotate_right(63);
    };
}

// The permutation P over 16 words: GB down the columns, then the diagonals.
macro_rules! p {
    ($v0: expr, $v1: expr, $v2: expr, $v3: expr,
     $v4: expr, $v5: expr, $v6: expr, $v7: expr,
     $v8: expr, $v9: expr, $v10: expr, $v11: expr,
     $v12: expr, $v13: expr, $v14: expr, $v15: expr) => {
        gb!($v0, $v4, $v8, $v12);
        gb!($v1, $v5, $v9, $v13);
        gb!($v2, $v6, $v10, $v14);
        gb!($v3, $v7, $v11, $v15);
        gb!($v0, $v5, $v10, $v15);
        gb!($v1, $v6, $v11, $v12);
        gb!($v2, $v7, $v8, $v13);
        gb!($v3, $v4, $v9, $v14);
    };
}

/// P applied to each of the eight 16-word rows, then to each of the eight
/// column groups of two adjacent words per row.
fn permute(b: &mut [u64; WORDS_PER_BLOCK]) {
    for row in b.chunks_exact_mut(16) {
        p!(row[0], row[1], row[2], row[3], row[4], row[5], row[6], row[7],
           row[8], row[9], row[10], row[11], row[12], row[13], row[14], row[15]);
    }

    for col in (0..16).step_by(2) {
        p!(b[col], b[col + 1],
           b[col + 16], b[col + 17],
           b[col + 32], b[col + 33],
           b[col + 48], b[col + 49],
           b[col + 64], b[col + 65],
           b[col + 80], b[col + 81],
           b[col + 96], b[col + 97],
           b[col + 112], b[col + 113]);
    }
}

/// Workspace for G, reused across a whole segment and wiped when it goes
/// out of scope. Splitting `mix` from the write step lets the caller hold
/// shared borrows of `prev`/`reference` while mixing and take the unique
/// borrow of the destination only for the final write.
pub struct Scratch {
    r: Block,
    z: Block,
}

impl Scratch {
    pub fn new() -> Scratch {
        Scratch { r: Block::ZERO, z: Block::ZERO }
    }

    /// R = prev XOR reference; Z = P(R). After this, `write`/`write_xor`
    /// produce G(prev, reference) = Z XOR R.
    pub fn mix(&mut self, prev: &Block, reference: &Block) {
        for (r, (x, y)) in self.r.0.iter_mut().zip(prev.0.iter().zip(reference.0.iter())) {
            *r = x ^ y;
        }
        self.z.0.copy_from_slice(&self.r.0);
        permute(&mut self.z.0);
    }

    /// dest = G(prev, reference). First-pass write mode.
    pub fn write(&self, dest: &mut Block) {
        for (d, (z, r)) in dest.0.iter_mut().zip(self.z.0.iter().zip(self.r.0.iter())) {
            *d = z ^ r;
        }
    }

    /// dest ^= G(prev, reference). Rewrite mode for passes after the first.
    pub fn write_xor(&self, dest: &mut Block) {
        for (d, (z, r)) in dest.0.iter_mut().zip(self.z.0.iter().zip(self.r.0.iter())) {
            *d ^= z ^ r;
        }
    }

    /// dest = G(ZERO, G(ZERO, src)), the double compression used for
    /// data-independent address blocks. G(0, Y) reduces to P(Y) XOR Y.
    pub fn g2(&mut self, src: &Block, dest: &mut Block) {
        self.z.0.copy_from_slice(&src.0);
        permute(&mut self.z.0);
        self.z ^= src;

        self.r.0.copy_from_slice(&self.z.0);
        permute(&mut self.z.0);
        self.z ^= &self.r;

        dest.0.copy_from_slice(&self.z.0);
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.r.zeroize();
        self.z.zeroize();
    }
}
