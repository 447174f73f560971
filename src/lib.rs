//! apkparse - Android package manifest locator, parser and validator
//!
//! Reads the manifest of a single package file, or of a directory holding a
//! base file and its splits, and produces one validated package descriptor.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! 1. **Location** - Read package identity from every file and validate the
//!    base/split topology ([`locator`])
//! 2. **Parsing** - Walk each manifest and populate one package builder,
//!    base file first, then every split in split-name order ([`parser`])
//! 3. **Validation** - Version-gated checks resolved against the declared
//!    target SDK ([`result`]) and signer consistency across files
//!    ([`signing`])
//! 4. **Reporting** - Terminal or JSON output of parse outcomes ([`report`])

pub mod archive;
pub mod config;
pub mod document;
pub mod locator;
pub mod model;
pub mod parser;
pub mod report;
pub mod result;
pub mod signing;

pub use archive::{ApkArchive, ArchiveError, ArchiveOpener, MemoryArchive, MemoryOpener, ResourceArchive, ZipOpener};
pub use config::{Config, Platform};
pub use document::{XmlCursor, XmlDocument};
pub use locator::{ClusterBuilder, Locator};
pub use model::{ApkLite, Package, PackageBuilder, PackageLite};
pub use parser::{PackageParser, ParseFlags, ParsingCallback, UnknownTagPolicy};
pub use report::{Outcome, ReportFormat, Reporter};
pub use result::{ErrorCode, ParseError, ParseResult};
pub use signing::{MetaInfCollector, SigningDetails, SigningVerifier};
