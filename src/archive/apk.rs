use super::{ArchiveError, ArchiveOpener, ResourceArchive, ResourceTable, TableLayout};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

const VALUES_DIR: &str = "res/values/";
/// Largest buffer reserved before an entry is actually read
const MAX_PREALLOCATION: u64 = 1 << 20;

/// A zip-backed package file
///
/// The underlying file handle is owned by the archive and closed when it is
/// dropped.
pub struct ApkArchive {
    path: PathBuf,
    zip: RefCell<ZipArchive<BufReader<File>>>,
    resources: ResourceTable,
}

impl ApkArchive {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(|source| ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive = Self {
            path: path.to_path_buf(),
            zip: RefCell::new(zip),
            resources: ResourceTable::new(),
        };
        archive.resources = archive.load_resources()?;
        trace!("Opened {}", path.display());
        Ok(archive)
    }

    fn load_resources(&self) -> Result<ResourceTable, ArchiveError> {
        let mut files: Vec<String> = self
            .entry_names()
            .into_iter()
            .filter(|name| {
                name.strip_prefix(VALUES_DIR)
                    .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".xml"))
            })
            .collect();
        // Fixed ids first so definitions reuse them
        files.sort_by_key(|name| (!name.ends_with("/public.xml"), name.clone()));

        let mut table = ResourceTable::new();
        for name in files {
            let doc = self.open_xml(&name)?;
            table.load_values(&doc);
        }
        if !table.is_empty() {
            debug!("Loaded resource values from {}", self.path.display());
        }
        Ok(table)
    }

    fn zip_error(&self, entry: &str, source: ZipError) -> ArchiveError {
        match source {
            ZipError::FileNotFound => ArchiveError::MissingEntry {
                path: self.path.clone(),
                entry: entry.to_string(),
            },
            source => ArchiveError::Zip {
                path: self.path.clone(),
                source,
            },
        }
    }
}

impl ResourceArchive for ApkArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_entry(&self, entry: &str) -> bool {
        self.zip.borrow().index_for_name(entry).is_some()
    }

    fn entry_names(&self) -> Vec<String> {
        self.zip.borrow().file_names().map(str::to_string).collect()
    }

    fn read_entry(&self, entry: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = self.zip.borrow_mut();
        let mut file = zip.by_name(entry).map_err(|e| self.zip_error(entry, e))?;
        let mut data = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut data).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(data)
    }

    fn entry_layout(&self, entry: &str) -> Option<TableLayout> {
        let mut zip = self.zip.borrow_mut();
        let file = zip.by_name(entry).ok()?;
        Some(TableLayout {
            compressed: file.compression() != CompressionMethod::Stored,
            aligned: file.data_start() % 4 == 0,
        })
    }

    fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}

/// Buffer size reserved for an entry before reading it
///
/// The size in the zip header is untrusted, so the reservation is capped and
/// `read_to_end` grows the buffer for genuinely large entries.
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

/// Opens archives from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipOpener;

impl ArchiveOpener for ZipOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ResourceArchive>, ArchiveError> {
        Ok(Box::new(ApkArchive::open(path)?))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| {
                entry.map(|e| e.into_path()).map_err(|e| ArchiveError::Io {
                    path: path.to_path_buf(),
                    source: e.into(),
                })
            })
            .collect()
    }
}
