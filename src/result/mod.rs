//! Parse outcomes shared by the locator and the manifest parser
//!
//! Every step of the pipeline returns a [`ParseResult`]. Expected failures are
//! values, never panics. A step may also report [`Parsed::Skipped`] for an
//! element that is well-formed but does not apply to this device; a skip never
//! stops sibling processing.

mod deferred;

pub use deferred::{DeferredKind, ParseInput};

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Flat install/parse failure codes, numbered like the platform's install codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidApk,
    OlderSdk,
    NotApk,
    BadManifest,
    UnexpectedException,
    NoCertificates,
    InconsistentCertificates,
    CertificateEncoding,
    BadPackageName,
    BadSharedUserId,
    ManifestMalformed,
    ManifestEmpty,
    OnlyCoreAppAllowed,
    ResourcesArscCompressed,
}

impl ErrorCode {
    /// Stable numeric value
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::InvalidApk => -2,
            ErrorCode::OlderSdk => -12,
            ErrorCode::NotApk => -100,
            ErrorCode::BadManifest => -101,
            ErrorCode::UnexpectedException => -102,
            ErrorCode::NoCertificates => -103,
            ErrorCode::InconsistentCertificates => -104,
            ErrorCode::CertificateEncoding => -105,
            ErrorCode::BadPackageName => -106,
            ErrorCode::BadSharedUserId => -107,
            ErrorCode::ManifestMalformed => -108,
            ErrorCode::ManifestEmpty => -109,
            ErrorCode::OnlyCoreAppAllowed => -112,
            ErrorCode::ResourcesArscCompressed => -124,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::InvalidApk => "INSTALL_FAILED_INVALID_APK",
            ErrorCode::OlderSdk => "INSTALL_FAILED_OLDER_SDK",
            ErrorCode::NotApk => "INSTALL_PARSE_FAILED_NOT_APK",
            ErrorCode::BadManifest => "INSTALL_PARSE_FAILED_BAD_MANIFEST",
            ErrorCode::UnexpectedException => "INSTALL_PARSE_FAILED_UNEXPECTED_EXCEPTION",
            ErrorCode::NoCertificates => "INSTALL_PARSE_FAILED_NO_CERTIFICATES",
            ErrorCode::InconsistentCertificates => "INSTALL_PARSE_FAILED_INCONSISTENT_CERTIFICATES",
            ErrorCode::CertificateEncoding => "INSTALL_PARSE_FAILED_CERTIFICATE_ENCODING",
            ErrorCode::BadPackageName => "INSTALL_PARSE_FAILED_BAD_PACKAGE_NAME",
            ErrorCode::BadSharedUserId => "INSTALL_PARSE_FAILED_BAD_SHARED_USER_ID",
            ErrorCode::ManifestMalformed => "INSTALL_PARSE_FAILED_MANIFEST_MALFORMED",
            ErrorCode::ManifestEmpty => "INSTALL_PARSE_FAILED_MANIFEST_EMPTY",
            ErrorCode::OnlyCoreAppAllowed => "INSTALL_PARSE_FAILED_ONLY_COREAPP_ALLOWED",
            ErrorCode::ResourcesArscCompressed => "INSTALL_PARSE_FAILED_RESOURCES_ARSC_COMPRESSED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// A failed parse step
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ParseError {
    code: ErrorCode,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ParseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Handler-level failure; malformed manifest content is the default code
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ManifestMalformed, message)
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Re-tag an error with a different code, keeping message and cause
    pub fn recode(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Prefix the message with the offending file and parser position
    pub fn at(mut self, path: &Path, position: Option<&str>) -> Self {
        self.message = match position {
            Some(pos) => format!("{}: {} ({})", path.display(), self.message, pos),
            None => format!("{}: {}", path.display(), self.message),
        };
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Successful outcome of a step: a value, or an element that was skipped
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    Skipped(String),
}

impl<T> Parsed<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Parsed::Value(v) => Some(v),
            Parsed::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Parsed::Skipped(_))
    }
}

/// Outcome of a tag handler
pub type Step = ParseResult<Parsed<()>>;

pub fn done() -> Step {
    Ok(Parsed::Value(()))
}

pub fn skipped(reason: impl Into<String>) -> Step {
    Ok(Parsed::Skipped(reason.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::BadManifest.code(), -101);
        assert_eq!(ErrorCode::OlderSdk.code(), -12);
        assert_eq!(ErrorCode::ResourcesArscCompressed.code(), -124);
        assert_eq!(
            ErrorCode::BadSharedUserId.name(),
            "INSTALL_PARSE_FAILED_BAD_SHARED_USER_ID"
        );
    }

    #[test]
    fn test_context_is_appended_by_caller() {
        let err = ParseError::malformed("No <manifest> tag").at(Path::new("/data/app/base.apk"), Some("line 3"));
        assert_eq!(err.code(), ErrorCode::ManifestMalformed);
        assert_eq!(err.message(), "/data/app/base.apk: No <manifest> tag (line 3)");
    }

    #[test]
    fn test_skip_is_not_a_value() {
        let parsed: Parsed<u32> = Parsed::Skipped("gated".into());
        assert!(parsed.is_skipped());
        assert_eq!(parsed.value(), None);
        assert_eq!(Parsed::Value(3).value(), Some(3));
    }
}
