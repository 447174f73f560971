mod json;
mod terminal;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::model::{Package, PackageLite};
use crate::result::{ParseError, ParseResult};
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

impl ReportFormat {
    /// Format named in a config file
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "terminal" => Some(ReportFormat::Terminal),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// What the report shows for a successfully read package
#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub package_name: String,
    pub version_code: i64,
    pub version_name: Option<String>,
    pub min_sdk_version: Option<i32>,
    pub target_sdk_version: i32,
    pub splits: Vec<String>,
    pub debuggable: bool,
    pub profileable_by_shell: bool,
    pub signers: usize,
    pub activities: Vec<String>,
    pub services: Vec<String>,
    pub receivers: Vec<String>,
    pub providers: Vec<String>,
    pub requested_permissions: Vec<String>,
}

impl PackageSummary {
    pub fn from_package(pkg: &Package) -> Self {
        Self {
            package_name: pkg.package_name().to_string(),
            version_code: pkg.long_version_code(),
            version_name: pkg.version_name.clone(),
            min_sdk_version: Some(pkg.min_sdk_version),
            target_sdk_version: pkg.target_sdk_version,
            splits: pkg.split_names.clone(),
            debuggable: pkg.flags.debuggable,
            profileable_by_shell: pkg.flags.profileable_by_shell,
            signers: pkg.signing_details.signatures.len(),
            activities: pkg.activities.iter().map(|a| a.component.name.clone()).collect(),
            services: pkg.services.iter().map(|s| s.component.name.clone()).collect(),
            receivers: pkg.receivers.iter().map(|r| r.component.name.clone()).collect(),
            providers: pkg.providers.iter().map(|p| p.component.name.clone()).collect(),
            requested_permissions: pkg.requested_permissions.clone(),
        }
    }

    /// Topology only; components are not read by the locator
    pub fn from_lite(lite: &PackageLite) -> Self {
        Self {
            package_name: lite.package_name.clone(),
            version_code: lite.long_version_code(),
            version_name: None,
            min_sdk_version: None,
            target_sdk_version: lite.target_sdk_version,
            splits: lite.split_names.clone(),
            debuggable: lite.debuggable,
            profileable_by_shell: lite.profileable_by_shell,
            signers: lite.signing_details.signatures.len(),
            activities: Vec::new(),
            services: Vec::new(),
            receivers: Vec::new(),
            providers: Vec::new(),
            requested_permissions: Vec::new(),
        }
    }
}

/// A failed parse as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub code: &'static str,
    pub status: i32,
    pub message: String,
}

impl From<&ParseError> for FailureSummary {
    fn from(err: &ParseError) -> Self {
        Self {
            code: err.code().name(),
            status: err.code().code(),
            message: err.message().to_string(),
        }
    }
}

/// Result of processing one input path
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureSummary>,
}

impl Outcome {
    fn new<T>(path: &Path, result: ParseResult<T>, summarize: impl FnOnce(&T) -> PackageSummary) -> Self {
        match result {
            Ok(value) => Self {
                path: path.to_path_buf(),
                package: Some(summarize(&value)),
                error: None,
            },
            Err(err) => Self {
                path: path.to_path_buf(),
                package: None,
                error: Some(FailureSummary::from(&err)),
            },
        }
    }

    pub fn from_package(path: &Path, result: ParseResult<Package>) -> Self {
        Self::new(path, result, PackageSummary::from_package)
    }

    pub fn from_lite(path: &Path, result: ParseResult<PackageLite>) -> Self {
        Self::new(path, result, PackageSummary::from_lite)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Reporter for parse outcomes
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
    show_components: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            output_path,
            show_components: true,
        }
    }

    pub fn with_components(mut self, show: bool) -> Self {
        self.show_components = show;
        self
    }

    /// Report every outcome
    pub fn report(&self, outcomes: &[Outcome]) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => TerminalReporter::new()
                .with_components(self.show_components)
                .report(outcomes),
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).report(outcomes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageBuilder;
    use crate::result::ErrorCode;

    #[test]
    fn test_format_names() {
        assert_eq!(ReportFormat::from_name("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_name("terminal"), Some(ReportFormat::Terminal));
        assert_eq!(ReportFormat::from_name("sarif"), None);
    }

    #[test]
    fn test_outcome_from_error() {
        let err = ParseError::new(ErrorCode::OlderSdk, "Requires newer sdk version #29 (current version is #28)");
        let outcome = Outcome::from_package(Path::new("/a.apk"), Err(err));
        assert!(!outcome.is_success());
        let failure = outcome.error.unwrap();
        assert_eq!(failure.code, "INSTALL_FAILED_OLDER_SDK");
        assert_eq!(failure.status, -12);
    }

    #[test]
    fn test_outcome_from_package() {
        let mut builder = PackageBuilder::new("com.example", Path::new("/a.apk"), Path::new("/a.apk"));
        builder.version_code = 5;
        builder.requested_permissions.push("android.permission.INTERNET".into());
        let outcome = Outcome::from_package(Path::new("/a.apk"), Ok(builder.build()));
        let summary = outcome.package.unwrap();
        assert_eq!(summary.package_name, "com.example");
        assert_eq!(summary.version_code, 5);
        assert_eq!(summary.requested_permissions.len(), 1);
    }
}
