use super::Platform;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for apkparse
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment manifests are validated against
    pub platform: Platform,

    /// Parser behavior
    pub parser: ParserConfig,

    /// Report configuration
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Fail on unknown manifest tags instead of skipping them
    pub strict: bool,

    /// Collect and cross-check signer certificates
    pub collect_certificates: bool,

    /// Treat packages as living in a trusted system directory
    pub system_dir: bool,

    /// Packages come from external storage
    pub external_storage: bool,

    /// Require a classes.dex in every file that declares code
    pub enforce_code: bool,

    /// Ignore `process` attributes
    pub ignore_processes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: String,

    /// List components in terminal output
    pub show_components: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict: false,
            collect_certificates: false,
            system_dir: false,
            external_storage: false,
            enforce_code: false,
            ignore_processes: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "terminal".to_string(),
            show_components: true,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(root: &Path) -> Result<Self> {
        let default_names = [
            ".apkparse.yml",
            ".apkparse.yaml",
            ".apkparse.toml",
            "apkparse.yml",
            "apkparse.yaml",
            "apkparse.toml",
        ];

        for name in &default_names {
            let path = root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}
