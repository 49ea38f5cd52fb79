//! Checksum utilities for upload payload addressing

use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::Result;

/// Compute the SHA-256 digest of an in-memory payload, hex encoded
pub fn payload_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 digest of any readable source, hex encoded
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Short digest prefix used in content-addressed upload filenames
pub fn short_digest(data: &[u8]) -> String {
    let mut digest = payload_digest(data);
    digest.truncate(8);
    digest
}
