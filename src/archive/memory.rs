use super::{
    ArchiveError, ArchiveOpener, ResourceArchive, ResourceTable, TableLayout, MANIFEST_ENTRY,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    layout: TableLayout,
}

/// An archive held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    path: PathBuf,
    entries: BTreeMap<String, MemoryEntry>,
    resources: ResourceTable,
}

impl MemoryArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Archive containing only a manifest
    pub fn with_manifest(path: impl Into<PathBuf>, manifest: &str) -> Self {
        Self::new(path).with_entry(MANIFEST_ENTRY, manifest.as_bytes())
    }

    pub fn with_entry(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data, TableLayout::STORED_ALIGNED);
        self
    }

    pub fn with_layout(mut self, name: &str, data: impl Into<Vec<u8>>, layout: TableLayout) -> Self {
        self.insert(name, data, layout);
        self
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Vec<u8>>, layout: TableLayout) {
        self.entries.insert(
            name.to_string(),
            MemoryEntry {
                data: data.into(),
                layout,
            },
        );
    }

    pub fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }
}

impl ResourceArchive for MemoryArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_entry(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    fn entry_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn read_entry(&self, entry: &str) -> Result<Vec<u8>, ArchiveError> {
        self.entries
            .get(entry)
            .map(|e| e.data.clone())
            .ok_or_else(|| ArchiveError::MissingEntry {
                path: self.path.clone(),
                entry: entry.to_string(),
            })
    }

    fn entry_layout(&self, entry: &str) -> Option<TableLayout> {
        self.entries.get(entry).map(|e| e.layout)
    }

    fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}

/// Serves [`MemoryArchive`]s keyed by path; directories are implied by the
/// paths of the archives below them
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    archives: HashMap<PathBuf, MemoryArchive>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, archive: MemoryArchive) {
        self.archives.insert(archive.path.clone(), archive);
    }

    pub fn with(mut self, archive: MemoryArchive) -> Self {
        self.add(archive);
        self
    }
}

impl ArchiveOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ResourceArchive>, ArchiveError> {
        self.archives
            .get(path)
            .map(|a| Box::new(a.clone()) as Box<dyn ResourceArchive>)
            .ok_or_else(|| ArchiveError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.archives
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        let children: BTreeSet<PathBuf> = self
            .archives
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| path.join(first))
            .collect();
        Ok(children.into_iter().collect())
    }
}
