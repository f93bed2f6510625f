//! Proof-of-work: a difficulty-derived target and a linear nonce search.

use crate::error::{ChainError, Result};
use crate::merkle::Sha256Hash;

/// Leading-zero bits every block hash needs. There is no retargeting.
pub const DIFFICULTY: u32 = 12;

/// Nonces are hashed as big-endian `i64`, so the search stops at `i64::MAX`.
pub const MAX_NONCE: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
    target: Sha256Hash,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofOfWork {
    pub fn new() -> Self {
        Self::with_difficulty(DIFFICULTY)
    }

    fn with_difficulty(difficulty: u32) -> Self {
        ProofOfWork {
            difficulty,
            target: hash_to_target(difficulty),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// 2^(256 - difficulty) as a big-endian 256-bit integer.
    pub fn target(&self) -> &Sha256Hash {
        &self.target
    }

    /// `hash < target`, both read as big-endian unsigned integers.
    pub fn meets_target(&self, hash: &[u8]) -> bool {
        hash.len() == self.target.len() && hash < &self.target[..]
    }

    /// Try nonces 0, 1, 2, ... until `hash_at(nonce)` meets the target.
    ///
    /// Single-threaded and deterministic: the same hashing closure always
    /// yields the same `(nonce, hash)` pair.
    pub fn search<F>(&self, mut hash_at: F) -> Result<(u64, Sha256Hash)>
    where
        F: FnMut(u64) -> Sha256Hash,
    {
        for nonce in 0..=MAX_NONCE {
            let hash = hash_at(nonce);
            if self.meets_target(&hash) {
                return Ok((nonce, hash));
            }
        }
        Err(ChainError::HashComputation(format!(
            "nonce space exhausted at difficulty {}",
            self.difficulty
        )))
    }
}

pub fn hash_to_target(difficulty: u32) -> Sha256Hash {
    let mut target = [0u8; 32];
    let exponent = 256u32.saturating_sub(difficulty.max(1));
    let byte = 31 - (exponent / 8) as usize;
    target[byte] = 1 << (exponent % 8);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn test_target_is_two_to_the_244() {
        let pow = ProofOfWork::new();
        let mut expected = [0u8; 32];
        expected[1] = 0x10;

        assert_eq!(pow.difficulty(), 12);
        assert_eq!(pow.target(), &expected);
    }

    #[test]
    fn test_default_uses_fixed_difficulty() {
        assert_eq!(ProofOfWork::default(), ProofOfWork::new());
        assert_eq!(ProofOfWork::default().difficulty(), DIFFICULTY);
    }

    #[test]
    fn test_harder_difficulty_means_smaller_target() {
        let easy = ProofOfWork::with_difficulty(4);
        let hard = ProofOfWork::with_difficulty(20);
        assert!(hard.target() < easy.target());
    }

    #[test]
    fn test_meets_target_is_strict() {
        let pow = ProofOfWork::new();
        let target = *pow.target();
        assert!(!pow.meets_target(&target));

        let mut below = [0u8; 32];
        below[1] = 0x0f;
        below[31] = 0xff;
        assert!(pow.meets_target(&below));

        let mut above = target;
        above[31] = 1;
        assert!(!pow.meets_target(&above));
    }

    #[test]
    fn test_meets_target_rejects_short_hash() {
        assert!(!ProofOfWork::new().meets_target(&[]));
    }

    #[test]
    fn test_search_is_deterministic() {
        let pow = ProofOfWork::with_difficulty(8);
        let hash_at = |nonce: u64| -> Sha256Hash {
            let mut hasher = Sha256::new();
            hasher.update(b"payload");
            hasher.update(nonce.to_be_bytes());
            hasher.finalize().into()
        };

        let first = pow.search(hash_at).unwrap();
        let second = pow.search(hash_at).unwrap();

        assert_eq!(first, second);
        assert!(pow.meets_target(&first.1));
        for nonce in 0..first.0 {
            assert!(!pow.meets_target(&hash_at(nonce)));
        }
    }
}
