//! Package archives
//!
//! A package file is a zip archive holding the manifest, the resource table
//! and code. The parser only sees archives through [`ResourceArchive`], so
//! tests and embedders can substitute [`MemoryArchive`] for real files.

mod apk;
mod memory;
mod resources;

pub use apk::{ApkArchive, ZipOpener};
pub use memory::{MemoryArchive, MemoryOpener};
pub use resources::{ResourceTable, ResourceValue};

use crate::document::{DocumentError, XmlDocument};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest entry name inside every package archive
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
/// Compiled resource table entry name
pub const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";
/// Primary dex entry name
pub const CLASSES_DEX_ENTRY: &str = "classes.dex";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid archive: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{entry} not found in {path}")]
    MissingEntry { path: PathBuf, entry: String },
    #[error("{entry} in {path} is not valid UTF-8")]
    Encoding { path: PathBuf, entry: String },
    #[error("failed to parse {entry} in {path}: {source}")]
    Document {
        path: PathBuf,
        entry: String,
        #[source]
        source: DocumentError,
    },
}

/// Storage layout of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub compressed: bool,
    /// Entry data starts on a 4-byte boundary
    pub aligned: bool,
}

impl TableLayout {
    pub const STORED_ALIGNED: TableLayout = TableLayout {
        compressed: false,
        aligned: true,
    };

    /// Whether the platform can memory-map the entry in place
    pub fn is_mappable(&self) -> bool {
        !self.compressed && self.aligned
    }
}

/// An opened package archive with resource resolution
pub trait ResourceArchive {
    fn path(&self) -> &Path;

    fn has_entry(&self, entry: &str) -> bool;

    /// Names of all entries, in archive order
    fn entry_names(&self) -> Vec<String>;

    fn read_entry(&self, entry: &str) -> Result<Vec<u8>, ArchiveError>;

    /// Layout of an entry, `None` when absent
    fn entry_layout(&self, entry: &str) -> Option<TableLayout>;

    fn resources(&self) -> &ResourceTable;

    /// Open a text XML entry as an attributed tree
    fn open_xml(&self, entry: &str) -> Result<XmlDocument, ArchiveError> {
        let bytes = self.read_entry(entry)?;
        let text = String::from_utf8(bytes).map_err(|_| ArchiveError::Encoding {
            path: self.path().to_path_buf(),
            entry: entry.to_string(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        XmlDocument::parse(text).map_err(|source| ArchiveError::Document {
            path: self.path().to_path_buf(),
            entry: entry.to_string(),
            source,
        })
    }

    fn open_manifest(&self) -> Result<XmlDocument, ArchiveError> {
        self.open_xml(MANIFEST_ENTRY)
    }

    /// Layout of the compiled resource table, if the archive has one
    fn resource_table(&self) -> Option<TableLayout> {
        self.entry_layout(RESOURCE_TABLE_ENTRY)
    }

    /// Resource id for `@type/name` or `@0x7f010001` references
    fn resolve_reference(&self, reference: &str) -> Option<u32> {
        self.resources().resolve(reference)
    }

    fn value(&self, id: u32) -> Option<&ResourceValue> {
        self.resources().value(id)
    }
}

/// Maps filesystem paths to archives
///
/// The opener also answers the directory questions the locator asks, so a
/// whole package tree can live in memory.
pub trait ArchiveOpener: Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn ResourceArchive>, ArchiveError>;

    fn is_dir(&self, path: &Path) -> bool;

    /// Immediate children of a directory, sorted by name
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ArchiveError>;
}
