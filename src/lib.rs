//! Pure-Rust Argon2id (RFC 9106, version 0x13) password hashing and key
//! derivation, bit-exact against the reference implementation.
//!
//! The whole computation is memory-hard: a matrix of 1024-byte blocks is
//! filled slice by slice, mixing each new block from its predecessor and a
//! pseudorandomly referenced earlier block. The first two slices of the
//! first pass pick references data-independently (Argon2i), everything after
//! that data-dependently (Argon2d). Every secret byte — the initial hash,
//! the matrix, and all transient buffers — is wiped before its storage is
//! released, on success and on every failure path.
//!
//! ```
//! let hasher = argon2id::Argon2id::new(2, 1, 16)?;
//! let mut tag = [0u8; 32];
//! hasher.derive(&mut tag, b"password", b"somesalt")?;
//! # Ok::<(), argon2id::Error>(())
//! ```
//!
//! Salts are supplied by the caller and must be 8..=64 bytes. An optional
//! secret key (pepper, up to 64 bytes) and associated data can be mixed in
//! via [`Argon2id::derive_keyed`]. Lanes of a slice may run on worker
//! threads with the `threaded` cargo feature; output is identical either
//! way.

mod blake2b;
mod block;
mod index;
mod workers;

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use block::{Block, Matrix, Scratch, ARGON2_BLOCK_BYTES};
use index::{index_alpha, split_u64, Gen2i};
use workers::Workers;

pub(crate) const SLICES_PER_LANE: u32 = 4;
const ARGON2_VERSION: u32 = 0x13;
const ARGON2ID_Y: u32 = 2;

const MIN_TAG_LENGTH: usize = 4;
const MAX_TAG_LENGTH: usize = 4096;
const MIN_SALT_LENGTH: usize = 8;
const MAX_SALT_LENGTH: usize = 64;
const MAX_SECRET_LENGTH: usize = 64;
const MAX_LANES: u32 = 255;

/// Cost parameters recommended by RFC 9106 for memory-constrained hosts.
pub mod defaults {
    /// Passes over memory.
    pub const PASSES: u32 = 3;
    /// Memory cost in KiB (64 MiB).
    pub const KIB: u32 = 64 * 1024;
    /// Lanes.
    pub const LANES: u32 = 4;
    /// Tag length in bytes.
    pub const LENGTH: usize = 32;
}

/// Rejection reasons. Whenever a derivation fails, the caller's output
/// buffer has been zero-filled before the error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("at least one pass over memory is required")]
    TooFewPasses,
    #[error("at least one lane is required")]
    TooFewLanes,
    #[error("at most 255 lanes are supported")]
    TooManyLanes,
    #[error("memory cost must be at least {0} KiB")]
    MemoryTooSmall(u64),
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password exceeds 2^32 - 1 bytes")]
    PasswordTooLong,
    #[error("salt length must be 8..=64 bytes")]
    SaltLength,
    #[error("secret key exceeds 64 bytes")]
    SecretTooLong,
    #[error("associated data exceeds 2^32 - 1 bytes")]
    AssociatedDataTooLong,
    #[error("tag length must be 4..=4096 bytes")]
    TagLength,
    #[error("memory matrix allocation failed")]
    AllocFailed,
}

fn as32le(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

fn len32(t: &[u8]) -> [u8; 4] {
    as32le(t.len() as u32)
}

macro_rules! b2hash {
    ($($bytes: expr),*) => {
        {
            let mut out = [0u8; blake2b::OUT_BYTES];
            b2hash!(&mut out[..]; $($bytes),*);
            out
        }
    };
    ($out: expr; $($bytes: expr),*) => {
        {
            let mut b = blake2b::Blake2b::new($out.len());
            $(b.update($bytes);)*
            let digest = b.finalize();
            $out.copy_from_slice(digest.as_bytes());
        }
    };
}

/// Argon2id with validated cost parameters. One instance may serve any
/// number of derivations, also concurrently.
#[derive(Debug)]
pub struct Argon2id {
    passes: u32,
    lanes: u32,
    lanelen: u32,
    kib: u32,
}

impl Argon2id {
    /// Validates the cost triple. `memory_kib` is rounded down to a multiple
    /// of `4 * lanes` blocks; values below `8 * lanes` are rejected rather
    /// than raised to the floor.
    pub fn new(passes: u32, lanes: u32, memory_kib: u32) -> Result<Argon2id, Error> {
        if passes < 1 {
            Err(Error::TooFewPasses)
        } else if lanes < 1 {
            Err(Error::TooFewLanes)
        } else if lanes > MAX_LANES {
            Err(Error::TooManyLanes)
        } else if (memory_kib as u64) < 8 * lanes as u64 {
            Err(Error::MemoryTooSmall(8 * lanes as u64))
        } else {
            Ok(Argon2id {
                passes,
                lanes,
                lanelen: memory_kib / (SLICES_PER_LANE * lanes) * SLICES_PER_LANE,
                kib: memory_kib,
            })
        }
    }

    /// Derives `out.len()` tag bytes from password and salt.
    pub fn derive(&self, out: &mut [u8], password: &[u8], salt: &[u8]) -> Result<(), Error> {
        self.derive_keyed(out, password, salt, &[], &[])
    }

    /// Derives `out.len()` tag bytes, additionally mixing a secret key and
    /// associated data into the initial hash.
    pub fn derive_keyed(
        &self,
        out: &mut [u8],
        password: &[u8],
        salt: &[u8],
        secret: &[u8],
        ad: &[u8],
    ) -> Result<(), Error> {
        match self.derive_inner(out, password, salt, secret, ad) {
            Ok(()) => Ok(()),
            Err(e) => {
                out.fill(0);
                Err(e)
            }
        }
    }

    fn derive_inner(
        &self,
        out: &mut [u8],
        password: &[u8],
        salt: &[u8],
        secret: &[u8],
        ad: &[u8],
    ) -> Result<(), Error> {
        validate_inputs(out, password, salt, secret, ad)?;

        let mut blocks = Matrix::new(self.lanes, self.lanelen)?;
        let h0 = self.h0(out.len() as u32, password, salt, secret, ad);

        let mut workers = Workers::new(self.lanes);
        workers.map(&mut blocks, &|m: &mut Matrix, lane| {
            self.fill_first_slice(m, &h0, lane)
        });

        // Remaining slices of the first pass; slices are global barriers.
        for slice in 1..SLICES_PER_LANE {
            workers.map(&mut blocks, &|m: &mut Matrix, lane| {
                self.fill_segment(m, 0, slice, lane)
            });
        }

        for pass in 1..self.passes {
            for slice in 0..SLICES_PER_LANE {
                workers.map(&mut blocks, &|m: &mut Matrix, lane| {
                    self.fill_segment(m, pass, slice, lane)
                });
            }
        }

        self.finalize(&blocks, out);
        Ok(())
    }

    /// H0 plus eight spare bytes, so per-lane initial-block derivation can
    /// splice the block index and lane id in place.
    #[rustfmt::skip]
    fn h0(&self, taglen: u32, p: &[u8], s: &[u8], k: &[u8], x: &[u8])
          -> Zeroizing<[u8; 72]> {
        let mut rv = Zeroizing::new([0u8; 72]);
        b2hash!(&mut rv[..blake2b::OUT_BYTES];
                &as32le(self.lanes), &as32le(taglen), &as32le(self.kib),
                &as32le(self.passes), &as32le(ARGON2_VERSION), &as32le(ARGON2ID_Y),
                &len32(p), p,
                &len32(s), s,
                &len32(k), k,
                &len32(x), x);
        rv
    }

    /// Columns 0 and 1 come from H'(H0 || LE32(col) || LE32(lane)); the rest
    /// of the first slice fills normally.
    fn fill_first_slice(&self, blks: &mut Matrix, h0: &[u8; 72], lane: u32) {
        let mut h = Zeroizing::new(*h0);
        h[68..72].copy_from_slice(&as32le(lane));

        let mut bytes = Zeroizing::new([0u8; ARGON2_BLOCK_BYTES]);
        for col in 0..2u32 {
            h[64..68].copy_from_slice(&as32le(col));
            h_prime(&mut bytes[..], &h[..]);
            blks[(lane, col)] = Block::from_le_bytes(&bytes);
        }

        self.fill_segment(blks, 0, 0, lane);
    }

    fn fill_segment(&self, blks: &mut Matrix, pass: u32, slice: u32, lane: u32) {
        let slicelen = self.lanelen / SLICES_PER_LANE;
        let offset = if pass == 0 && slice == 0 { 2 } else { 0 };

        // Argon2i addressing for the first half of the first pass.
        let mut gen = if pass == 0 && slice < 2 {
            Some(Gen2i::new(
                offset as usize,
                pass,
                lane,
                slice,
                self.lanes * self.lanelen,
                self.passes,
            ))
        } else {
            None
        };

        let mut scratch = Scratch::new();
        for idx in offset..slicelen {
            let col = slice * slicelen + idx;
            let prev = self.prev(col);

            let (j1, j2) = match gen.as_mut() {
                Some(g) => g.nextj(),
                None => split_u64(blks[(lane, prev)][0]),
            };

            // Other lanes hold no data yet in the very first slice.
            let ref_lane = if pass == 0 && slice == 0 {
                lane
            } else {
                j2 % self.lanes
            };
            let z = index_alpha(pass, slice, ref_lane == lane, idx, slicelen, j1);

            scratch.mix(&blks[(lane, prev)], &blks[(ref_lane, z)]);
            let dest = &mut blks[(lane, col)];
            if pass == 0 {
                scratch.write(dest);
            } else {
                scratch.write_xor(dest);
            }
        }
    }

    fn prev(&self, col: u32) -> u32 {
        if col > 0 { col - 1 } else { self.lanelen - 1 }
    }

    fn finalize(&self, blks: &Matrix, out: &mut [u8]) {
        let mut c = blks.last_column_xor();
        let mut bytes = Zeroizing::new([0u8; ARGON2_BLOCK_BYTES]);
        c.to_le_bytes(&mut bytes);
        h_prime(out, &bytes[..]);
        c.zeroize();
    }
}

fn validate_inputs(
    out: &[u8],
    password: &[u8],
    salt: &[u8],
    secret: &[u8],
    ad: &[u8],
) -> Result<(), Error> {
    if out.len() < MIN_TAG_LENGTH || out.len() > MAX_TAG_LENGTH {
        Err(Error::TagLength)
    } else if password.is_empty() {
        Err(Error::EmptyPassword)
    } else if password.len() > u32::MAX as usize {
        Err(Error::PasswordTooLong)
    } else if salt.len() < MIN_SALT_LENGTH || salt.len() > MAX_SALT_LENGTH {
        Err(Error::SaltLength)
    } else if secret.len() > MAX_SECRET_LENGTH {
        Err(Error::SecretTooLong)
    } else if ad.len() > u32::MAX as usize {
        Err(Error::AssociatedDataTooLong)
    } else {
        Ok(())
    }
}

/// One-shot derivation with the `defaults` cost parameters.
pub fn argon2id_simple(password: &str, salt: &str) -> Result<[u8; defaults::LENGTH], Error> {
    let mut out = [0; defaults::LENGTH];
    let a2 = Argon2id::new(defaults::PASSES, defaults::LANES, defaults::KIB)?;
    a2.derive(&mut out, password.as_bytes(), salt.as_bytes())?;
    Ok(out)
}

/// The variable-length hash H'. Up to 64 bytes it is a single BLAKE2b call
/// with the length in the parameter block; beyond that, a chain of 64-byte
/// digests emitted at a 32-byte stride, the final link sized to the
/// remainder.
fn h_prime(out: &mut [u8], input: &[u8]) {
    if out.len() <= blake2b::OUT_BYTES {
        b2hash!(out; &len32(out), input);
    } else {
        let mut tmp = Zeroizing::new(b2hash!(&len32(out), input));
        out[..blake2b::OUT_BYTES].copy_from_slice(&tmp[..]);
        let mut wr_at = blake2b::OUT_BYTES / 2;

        while out.len() - wr_at > blake2b::OUT_BYTES {
            let link = blake2b::blake2b(blake2b::OUT_BYTES, &tmp[..]);
            tmp.copy_from_slice(link.as_bytes());
            out[wr_at..wr_at + blake2b::OUT_BYTES].copy_from_slice(&tmp[..]);
            wr_at += blake2b::OUT_BYTES / 2;
        }

        let last = blake2b::blake2b(out.len() - wr_at, &tmp[..]);
        out[wr_at..].copy_from_slice(last.as_bytes());
    }
}
