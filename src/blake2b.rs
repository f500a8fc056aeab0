//! Keyless BLAKE2b (RFC 7693) with digest lengths of 1 to 64 bytes.
//!
//! Argon2 uses BLAKE2b in two places: the initial hash H0 and the
//! variable-length hash H'. Both run over short inputs, so this is a
//! straightforward portable implementation; the hot path of the algorithm
//! (the compression function G) never touches it.

use zeroize::Zeroize;

pub const BLOCK_BYTES: usize = 128;
pub const OUT_BYTES: usize = 64;

const IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

/// Message schedule permutations. Rounds 10 and 11 reuse rows 0 and 1.
const SIGMA: [[usize; 16]; 12] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
];

#[inline(always)]
fn mix(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// The compression function F. `t` is the byte counter; Argon2 message
/// sizes never exceed 2^64, so the high counter word stays zero.
fn compress(h: &mut [u64; 8], block: &[u8; BLOCK_BYTES], t: u64, last: bool) {
    let mut m = [0u64; 16];
    for (w, chunk) in m.iter_mut().zip(block.chunks_exact(8)) {
        *w = u64::from_le_bytes(chunk.try_into().unwrap());
    }

    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&IV);
    v[12] ^= t;
    if last {
        v[14] = !v[14];
    }

    for s in SIGMA.iter() {
        mix(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        mix(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        mix(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        mix(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        mix(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        mix(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        mix(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        mix(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }

    m.zeroize();
    v.zeroize();
}

/// Incremental BLAKE2b state.
///
/// The final block is held back in the buffer until `finalize`, so hashing
/// in any split of chunks equals hashing the concatenation in one call.
pub struct Blake2b {
    h: [u64; 8],
    t: u64,
    buf: [u8; BLOCK_BYTES],
    buflen: usize,
    nn: usize,
}

impl Blake2b {
    /// Start a keyless hash with digest length `nn` in 1..=64. The length
    /// is folded into the parameter word, so different lengths produce
    /// unrelated digests for the same message.
    pub fn new(nn: usize) -> Blake2b {
        assert!(nn >= 1 && nn <= OUT_BYTES);
        let mut h = IV;
        h[0] ^= 0x0101_0000 ^ nn as u64;
        Blake2b { h, t: 0, buf: [0; BLOCK_BYTES], buflen: 0, nn }
    }

    pub fn update(&mut self, mut bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let fill = BLOCK_BYTES - self.buflen;
        if bytes.len() > fill {
            self.buf[self.buflen..].copy_from_slice(&bytes[..fill]);
            self.t = self.t.wrapping_add(BLOCK_BYTES as u64);
            compress(&mut self.h, &self.buf, self.t, false);
            self.buflen = 0;
            bytes = &bytes[fill..];

            while bytes.len() > BLOCK_BYTES {
                self.t = self.t.wrapping_add(BLOCK_BYTES as u64);
                let block: &[u8; BLOCK_BYTES] = bytes[..BLOCK_BYTES].try_into().unwrap();
                compress(&mut self.h, block, self.t, false);
                bytes = &bytes[BLOCK_BYTES..];
            }
        }

        self.buf[self.buflen..self.buflen + bytes.len()].copy_from_slice(bytes);
        self.buflen += bytes.len();
    }

    pub fn finalize(mut self) -> Digest {
        self.t = self.t.wrapping_add(self.buflen as u64);
        self.buf[self.buflen..].fill(0);
        compress(&mut self.h, &self.buf, self.t, true);

        let mut out = Digest { bytes: [0; OUT_BYTES], len: self.nn };
        for (chunk, word) in out.bytes.chunks_exact_mut(8).zip(self.h.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

impl Drop for Blake2b {
    fn drop(&mut self) {
        self.h.zeroize();
        self.t.zeroize();
        self.buf.zeroize();
    }
}

/// A finished digest of `len` bytes, wiped on drop.
pub struct Digest {
    bytes: [u8; OUT_BYTES],
    len: usize,
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Drop for Digest {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// One-shot convenience over `Blake2b`.
pub fn blake2b(nn: usize, bytes: &[u8]) -> Digest {
    let mut state = Blake2b::new(nn);
    state.update(bytes);
    state.finalize()
}
