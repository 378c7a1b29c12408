//! Nut generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Pluggable source of nut entropy.
///
/// Implementations must be thread-safe; the engine calls this from
/// concurrent request tasks. An implementation may return fewer or more
/// bytes, but anything under 16 weakens the single-use guarantee.
pub trait NutGenerator: Send + Sync {
    /// Produce the raw bytes of one fresh nut.
    fn generate(&self) -> Vec<u8>;
}

/// Default generator: 128 bits from the operating system CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNutGenerator;

impl NutGenerator for RandomNutGenerator {
    fn generate(&self) -> Vec<u8> {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        bytes.to_vec()
    }
}
