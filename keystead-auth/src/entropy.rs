//! Secure random source used for tokens and session identifiers

use rand::rngs::OsRng;
use rand::RngCore;

pub const TOKEN_BYTES: usize = 32;
pub const SESSION_ID_BYTES: usize = 16;

pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// Operating-system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// `len` random bytes, hex-encoded
pub fn random_hex(source: &dyn EntropySource, len: usize) -> Result<String, rand::Error> {
    let mut bytes = vec![0u8; len];
    source.fill(&mut bytes)?;
    Ok(hex::encode(bytes))
}
