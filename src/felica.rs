//! FeliCa data structures.
//!
//! FeliCa cards store everything in 16-byte blocks, grouped into services. Reading them is
//! someone else's job; this module only deals with blocks that have already been read.
pub mod cybernet;

use crate::Error;

pub type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// Length of a single FeliCa block.
pub const BLOCK_LEN: usize = 16;

/// A single raw block, as read from a card (or a dump of one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block([u8; BLOCK_LEN]);

impl Block {
    pub const fn new(bytes: [u8; BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }
}

impl From<[u8; BLOCK_LEN]> for Block {
    fn from(bytes: [u8; BLOCK_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Block {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; BLOCK_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidLength {
                expected: BLOCK_LEN,
                actual: bytes.len(),
            })
    }
}
