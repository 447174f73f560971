//! Signer identity of package files
//!
//! Cryptographic verification is delegated to a [`SigningVerifier`]. The
//! bundled [`MetaInfCollector`] enumerates JAR signature blocks and treats
//! each block as one signer certificate.

use crate::archive::{ArchiveError, ResourceArchive};
use crate::result::{ErrorCode, ParseError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Target SDK from which v2 signatures are mandatory
pub const MIN_SDK_FOR_V2_SIGNATURES: i32 = 30;

/// Encoded signer certificate
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    pub fn new(encoded: impl Into<Vec<u8>>) -> Self {
        Self(encoded.into())
    }

    pub fn encoded(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Certificate({} bytes)", self.0.len())
    }
}

impl Serialize for Certificate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    #[default]
    Unknown,
    /// JAR signing (v1)
    Jar,
    V2,
    V3,
    V4,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureScheme::Unknown => "unknown",
            SignatureScheme::Jar => "v1",
            SignatureScheme::V2 => "v2",
            SignatureScheme::V3 => "v3",
            SignatureScheme::V4 => "v4",
        };
        write!(f, "{}", name)
    }
}

/// Signers of a package file plus the optional rotation history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SigningDetails {
    pub signatures: Vec<Certificate>,
    pub scheme: SignatureScheme,
    pub past_signing_certificates: Vec<Certificate>,
}

impl SigningDetails {
    pub fn new(signatures: Vec<Certificate>, scheme: SignatureScheme) -> Self {
        Self {
            signatures,
            scheme,
            past_signing_certificates: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn has_signatures(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Same certificate set, ignoring order and scheme
    pub fn signatures_match_exactly(&self, other: &SigningDetails) -> bool {
        let ours: BTreeSet<&Certificate> = self.signatures.iter().collect();
        let theirs: BTreeSet<&Certificate> = other.signatures.iter().collect();
        ours == theirs
    }
}

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Package {0} has no certificates")]
    NoCertificates(PathBuf),
    #[error("Failed to collect certificates from {path}: {reason}")]
    Encoding { path: PathBuf, reason: String },
    #[error("Failed to verify signatures of {path}: {reason}")]
    Verification { path: PathBuf, reason: String },
    #[error("No signature found in package of version {required} or newer for package {path}")]
    Unsupported {
        path: PathBuf,
        required: SignatureScheme,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl SignatureError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SignatureError::Encoding { .. } => ErrorCode::CertificateEncoding,
            SignatureError::Archive(_) => ErrorCode::UnexpectedException,
            _ => ErrorCode::NoCertificates,
        }
    }
}

impl From<SignatureError> for ParseError {
    fn from(err: SignatureError) -> Self {
        ParseError::new(err.code(), err.to_string()).with_cause(err)
    }
}

/// Signer identity capability
pub trait SigningVerifier: Sync {
    /// Verify every signed entry and return the signers
    fn verify(
        &self,
        archive: &dyn ResourceArchive,
        min_scheme: SignatureScheme,
    ) -> Result<SigningDetails, SignatureError>;

    /// Enumerate signers without cryptographic checks, for trusted locations
    fn collect_unverified(
        &self,
        archive: &dyn ResourceArchive,
        min_scheme: SignatureScheme,
    ) -> Result<SigningDetails, SignatureError>;
}

/// Minimum signature scheme a package must carry
pub fn min_signature_scheme(target_sdk: i32, is_static_library: bool) -> SignatureScheme {
    if target_sdk >= MIN_SDK_FOR_V2_SIGNATURES || is_static_library {
        SignatureScheme::V2
    } else {
        SignatureScheme::Jar
    }
}

/// Collect signers of one file, verified unless the file is system-trusted
pub fn collect(
    verifier: &dyn SigningVerifier,
    archive: &dyn ResourceArchive,
    min_scheme: SignatureScheme,
    skip_verify: bool,
) -> Result<SigningDetails, SignatureError> {
    let details = if skip_verify {
        verifier.collect_unverified(archive, min_scheme)?
    } else {
        verifier.verify(archive, min_scheme)?
    };
    if !details.has_signatures() {
        return Err(SignatureError::NoCertificates(archive.path().to_path_buf()));
    }
    Ok(details)
}

/// Require a split's signers to equal the base's
pub fn ensure_consistent(
    base: &SigningDetails,
    split: &SigningDetails,
    split_path: &Path,
) -> Result<(), ParseError> {
    if base.signatures_match_exactly(split) {
        Ok(())
    } else {
        Err(ParseError::new(
            ErrorCode::InconsistentCertificates,
            format!("{} has mismatched certificates", split_path.display()),
        ))
    }
}

/// Reads `META-INF/*.{RSA,DSA,EC}` signature blocks
///
/// Block contents are not cryptographically checked, so only JAR signatures
/// can be reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaInfCollector;

impl MetaInfCollector {
    fn is_signature_block(name: &str) -> bool {
        let Some(file) = name.strip_prefix("META-INF/") else {
            return false;
        };
        if file.contains('/') {
            return false;
        }
        let upper = file.to_ascii_uppercase();
        upper.ends_with(".RSA") || upper.ends_with(".DSA") || upper.ends_with(".EC")
    }

    fn collect_blocks(&self, archive: &dyn ResourceArchive) -> Result<Vec<Certificate>, SignatureError> {
        let mut blocks: Vec<String> = archive
            .entry_names()
            .into_iter()
            .filter(|name| Self::is_signature_block(name))
            .collect();
        blocks.sort();

        let mut certificates = Vec::with_capacity(blocks.len());
        for name in blocks {
            let data = archive.read_entry(&name)?;
            if data.is_empty() {
                return Err(SignatureError::Encoding {
                    path: archive.path().to_path_buf(),
                    reason: format!("empty signature block {}", name),
                });
            }
            certificates.push(Certificate::new(data));
        }
        debug!(
            "Found {} signature block(s) in {}",
            certificates.len(),
            archive.path().display()
        );
        Ok(certificates)
    }
}

impl SigningVerifier for MetaInfCollector {
    fn verify(
        &self,
        archive: &dyn ResourceArchive,
        min_scheme: SignatureScheme,
    ) -> Result<SigningDetails, SignatureError> {
        if min_scheme > SignatureScheme::Jar {
            return Err(SignatureError::Unsupported {
                path: archive.path().to_path_buf(),
                required: min_scheme,
            });
        }
        self.collect_unverified(archive, min_scheme)
    }

    fn collect_unverified(
        &self,
        archive: &dyn ResourceArchive,
        _min_scheme: SignatureScheme,
    ) -> Result<SigningDetails, SignatureError> {
        let certificates = self.collect_blocks(archive)?;
        if certificates.is_empty() {
            return Err(SignatureError::NoCertificates(archive.path().to_path_buf()));
        }
        Ok(SigningDetails::new(certificates, SignatureScheme::Jar))
    }
}
