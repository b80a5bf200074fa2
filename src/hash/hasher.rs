//! Hash quality traits and the non-avalanching FNV-1a builder.
//!
//! A filter derives all of its probe positions from a single 64-bit digest, so the digest
//! must spread entropy evenly over all 64 bits. Hash builders that guarantee this are
//! marked with [`HashQuality::IS_AVALANCHING`]; digests from any other builder are passed
//! through [`mulx64_mix`](super::mulx64_mix) before use.
//!
//! # Marking a hash function
//!
//! ```
//! use bloomforge::hash::{Avalanching, FnvHashBuilder, HashQuality};
//!
//! assert!(!FnvHashBuilder::IS_AVALANCHING);
//!
//! // Vouch for a builder without implementing the trait on it directly.
//! type Trusted = Avalanching<FnvHashBuilder>;
//! assert!(Trusted::IS_AVALANCHING);
//! ```

use std::collections::hash_map::{DefaultHasher, RandomState};
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

/// Declares whether a [`BuildHasher`] produces avalanching digests.
///
/// A hash function avalanches when flipping any single input bit flips each output bit
/// with probability close to one half. The default is `false`, which is always safe: the
/// filter then applies an extra mixing step to every digest.
pub trait HashQuality: BuildHasher {
    /// Whether digests may be used without additional mixing.
    const IS_AVALANCHING: bool = false;
}

impl HashQuality for RandomState {
    // SipHash-1-3
    const IS_AVALANCHING: bool = true;
}

impl HashQuality for BuildHasherDefault<DefaultHasher> {
    const IS_AVALANCHING: bool = true;
}

impl HashQuality for FnvHashBuilder {}

/// Wrapper asserting that `H` avalanches.
///
/// Delegates hashing to `H` unchanged; only the quality marker differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Avalanching<H>(pub H);

impl<H> Avalanching<H> {
    /// Wrap a hash builder.
    pub const fn new(inner: H) -> Self {
        Self(inner)
    }

    /// Borrow the wrapped builder.
    pub const fn get(&self) -> &H {
        &self.0
    }

    /// Unwrap into the inner builder.
    pub fn into_inner(self) -> H {
        self.0
    }
}

impl<H: BuildHasher> BuildHasher for Avalanching<H> {
    type Hasher = H::Hasher;

    #[inline]
    fn build_hasher(&self) -> H::Hasher {
        self.0.build_hasher()
    }
}

impl<H: BuildHasher> HashQuality for Avalanching<H> {
    const IS_AVALANCHING: bool = true;
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the bytes written to it.
///
/// Cheap and deterministic across runs and platforms, but its low-order bits depend
/// only on low-order input bits, so it does not avalanche.
#[derive(Debug, Clone, Copy)]
pub struct FnvHasher {
    state: u64,
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }
}

impl Hasher for FnvHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// [`BuildHasher`] for [`FnvHasher`].
///
/// # Examples
///
/// ```
/// use bloomforge::hash::FnvHashBuilder;
/// use std::hash::BuildHasher;
///
/// let fnv = FnvHashBuilder;
/// assert_eq!(fnv.hash_one(7u32), fnv.hash_one(7u32));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FnvHashBuilder;

impl BuildHasher for FnvHashBuilder {
    type Hasher = FnvHasher;

    #[inline]
    fn build_hasher(&self) -> FnvHasher {
        FnvHasher::default()
    }
}
