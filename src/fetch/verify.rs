// src/fetch/verify.rs

//! Source archive integrity checks

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

/// Digest algorithm named by a checksum declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `bytes`
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        match self {
            Self::Sha256 => format!("{:x}", Sha256::digest(bytes)),
            Self::Sha512 => format!("{:x}", Sha512::digest(bytes)),
        }
    }
}

/// A declared checksum: algorithm plus expected hex digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl Checksum {
    /// Parse `sha256:<hex>`, `sha512:<hex>` or a bare hex digest (SHA-256)
    pub fn parse(declared: &str) -> Result<Self> {
        let declared = declared.trim();

        let (algorithm, hex) = match declared.split_once(':') {
            Some(("sha256", hex)) => (DigestAlgorithm::Sha256, hex),
            Some(("sha512", hex)) => (DigestAlgorithm::Sha512, hex),
            Some((other, _)) => {
                return Err(Error::MalformedFormula(format!(
                    "Unsupported checksum algorithm: {} (supported: sha256, sha512)",
                    other
                )));
            }
            None => (DigestAlgorithm::Sha256, declared),
        };

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::MalformedFormula(format!(
                "Checksum is not a hex digest: {}",
                declared
            )));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }
}

/// Verify that `bytes` match the declared checksum
///
/// Any difference, including a digest of the wrong length, is a mismatch.
pub fn verify(bytes: &[u8], expected: &str) -> Result<()> {
    let checksum = Checksum::parse(expected)?;
    let actual = checksum.algorithm.hex_digest(bytes);

    debug!(
        "Verifying {} bytes against {}:{}",
        bytes.len(),
        checksum.algorithm.name(),
        checksum.hex
    );

    if actual != checksum.hex {
        return Err(Error::ChecksumMismatch {
            expected: checksum.hex,
            actual,
        });
    }

    debug!("Checksum verified: {}", actual);
    Ok(())
}
