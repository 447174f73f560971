//! Tool configuration and the platform environment

mod loader;
mod platform;

pub use loader::{Config, ParserConfig, ReportConfig};
pub use platform::{version_codes, Platform, SplitPermission, FEATURE_WATCH};
