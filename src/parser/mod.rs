//! Manifest semantic parser
//!
//! Turns the manifest of a base file, and then of every split, into one
//! [`PackageBuilder`]. The builder is owned by exactly one step at a time:
//! the base parse returns it, each split parse takes it and hands it back.

mod application;
mod components;
mod defaults;
mod key_sets;
mod manifest;
mod names;
mod permissions;
mod queries;
mod sdk;
mod split;
mod walker;

pub use defaults::{FlagRule, SdkGate, APPLICATION_FLAGS, BACKUP_AGENT_FLAGS};
pub use manifest::{INSTALL_LOCATIONS, MAX_OVERLAY_PRIORITY};
pub use names::{
    build_class_name, build_process_name, build_task_affinity_name, parse_package_split_names,
    validate_name, MAX_FILE_NAME_SIZE,
};
pub use sdk::{
    compute_min_sdk_version, compute_target_sdk_version, match_target_code, resolve_sdk_versions,
    SdkValue, UsesSdk, DEFAULT_MIN_SDK_VERSION, DEFAULT_TARGET_SDK_VERSION,
};
pub use walker::{ignore, unknown_tag, walk_children, UnknownTagPolicy};

pub(crate) use sdk::declared_sdk_value;

use crate::archive::{ArchiveError, ArchiveOpener, ResourceArchive, CLASSES_DEX_ENTRY};
use crate::config::{ParserConfig, Platform};
use crate::document::{Attribute, Attrs, DocumentError, XmlCursor, XmlDocument};
use crate::locator::{split_dependencies, Locator};
use crate::model::{Package, PackageBuilder};
use crate::result::{DeferredKind, ErrorCode, ParseError, ParseInput, ParseResult};
use crate::signing::{self, SigningVerifier};
use bitflags::bitflags;
use std::path::Path;
use tracing::debug;

bitflags! {
    /// Behavior switches for one parse call
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParseFlags: u32 {
        /// Single files must carry the `.apk` extension
        const MUST_BE_APK = 1 << 0;
        /// Ignore `process` attributes
        const IGNORE_PROCESSES = 1 << 1;
        /// Package lives on external storage
        const EXTERNAL_STORAGE = 1 << 3;
        /// Package lives in a trusted system directory
        const IS_SYSTEM_DIR = 1 << 4;
        /// Collect signer certificates and require them to agree
        const COLLECT_CERTIFICATES = 1 << 5;
        /// Every file declaring code must contain a dex file
        const ENFORCE_CODE = 1 << 6;
    }
}

impl ParseFlags {
    /// Flags selected by the tool configuration
    pub fn from_config(config: &ParserConfig) -> Self {
        let mut flags = ParseFlags::empty();
        flags.set(ParseFlags::COLLECT_CERTIFICATES, config.collect_certificates);
        flags.set(ParseFlags::IS_SYSTEM_DIR, config.system_dir);
        flags.set(ParseFlags::EXTERNAL_STORAGE, config.external_storage);
        flags.set(ParseFlags::ENFORCE_CODE, config.enforce_code);
        flags.set(ParseFlags::IGNORE_PROCESSES, config.ignore_processes);
        flags
    }
}

/// Embedding hooks consulted while parsing
pub trait ParsingCallback: Sync {
    fn has_feature(&self, name: &str) -> bool;

    /// Create the builder for a base file; embedders may pre-populate it
    fn start_package(
        &self,
        package_name: &str,
        base_code_path: &Path,
        code_path: &Path,
        _manifest_attributes: &[Attribute],
        is_core_app: bool,
    ) -> PackageBuilder {
        let mut pkg = PackageBuilder::new(package_name, base_code_path, code_path);
        pkg.core_app = is_core_app;
        pkg
    }
}

impl ParsingCallback for Platform {
    fn has_feature(&self, name: &str) -> bool {
        Platform::has_feature(self, name)
    }
}

/// Read-only state shared by every handler of one file
#[derive(Clone, Copy)]
pub(crate) struct Ctx<'d, 'p> {
    pub res: &'d dyn ResourceArchive,
    pub platform: &'p Platform,
    pub callback: &'p dyn ParsingCallback,
    pub policy: UnknownTagPolicy,
    pub flags: ParseFlags,
}

impl<'d, 'p> Ctx<'d, 'p> {
    pub fn attrs(&self, cursor: &XmlCursor<'d>) -> Attrs<'d> {
        Attrs::of(cursor, self.res)
    }

    pub fn ignore_processes(&self) -> bool {
        self.flags.contains(ParseFlags::IGNORE_PROCESSES)
    }
}

/// Read the manifest of an opened archive
///
/// A manifest without any element is `ManifestEmpty`; every other read
/// failure is unexpected.
pub(crate) fn open_manifest(archive: &dyn ResourceArchive, path: &Path) -> ParseResult<XmlDocument> {
    archive.open_manifest().map_err(|err| match err {
        ArchiveError::Document {
            source: DocumentError::Empty,
            ..
        } => ParseError::new(ErrorCode::ManifestEmpty, "No start tag found"),
        err => ParseError::new(
            ErrorCode::UnexpectedException,
            format!("Failed to read manifest from {}", path.display()),
        )
        .with_cause(err),
    })
}

/// Full package parser
///
/// Holds only shared, read-only collaborators; every call owns its own
/// diagnostics channel and builder, so one parser may serve many threads.
pub struct PackageParser<'a> {
    platform: &'a Platform,
    callback: &'a dyn ParsingCallback,
    opener: &'a dyn ArchiveOpener,
    verifier: &'a dyn SigningVerifier,
    policy: UnknownTagPolicy,
}

impl<'a> PackageParser<'a> {
    pub fn new(
        platform: &'a Platform,
        opener: &'a dyn ArchiveOpener,
        verifier: &'a dyn SigningVerifier,
    ) -> Self {
        Self {
            platform,
            callback: platform,
            opener,
            verifier,
            policy: UnknownTagPolicy::default(),
        }
    }

    pub fn with_callback(mut self, callback: &'a dyn ParsingCallback) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_policy(mut self, policy: UnknownTagPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn locator(&self) -> Locator<'a> {
        Locator::new(self.opener, self.platform, self.verifier)
    }

    fn ctx<'d>(&self, res: &'d dyn ResourceArchive, flags: ParseFlags) -> Ctx<'d, 'a> {
        Ctx {
            res,
            platform: self.platform,
            callback: self.callback,
            policy: self.policy,
            flags,
        }
    }

    fn open(&self, path: &Path) -> ParseResult<Box<dyn ResourceArchive>> {
        self.opener.open(path).map_err(|err| {
            ParseError::new(
                ErrorCode::NotApk,
                format!("Failed to open {}", path.display()),
            )
            .with_cause(err)
        })
    }

    /// Parse a single package file or a directory holding a base and splits
    pub fn parse_package(&self, path: &Path, flags: ParseFlags) -> ParseResult<Package> {
        if self.opener.is_dir(path) {
            self.parse_cluster(path, flags)
        } else {
            self.parse_monolithic(path, flags)
        }
    }

    fn parse_monolithic(&self, path: &Path, flags: ParseFlags) -> ParseResult<Package> {
        // Certificates are collected by the full pass below
        let lite = self
            .locator()
            .locate(path, flags - ParseFlags::COLLECT_CERTIFICATES)?;
        if self.platform.only_core_apps && !lite.core_app {
            return Err(ParseError::new(
                ErrorCode::OnlyCoreAppAllowed,
                format!("Not a coreApp: {}", path.display()),
            ));
        }

        let archive = self.open(path)?;
        let mut input = ParseInput::new();
        let pkg = self.parse_base_apk(&mut input, path, path, archive.as_ref(), flags)?;
        debug!("Parsed {} from {}", pkg.package_name(), path.display());
        Ok(pkg.build())
    }

    fn parse_cluster(&self, path: &Path, flags: ParseFlags) -> ParseResult<Package> {
        let lite = self
            .locator()
            .locate(path, flags - ParseFlags::COLLECT_CERTIFICATES)?;
        if self.platform.only_core_apps && !lite.core_app {
            return Err(ParseError::new(
                ErrorCode::OnlyCoreAppAllowed,
                format!("Not a coreApp: {}", path.display()),
            ));
        }

        let dependencies = if lite.isolated_splits && !lite.split_names.is_empty() {
            Some(split_dependencies(&lite)?)
        } else {
            None
        };

        let mut input = ParseInput::new();
        let base = self.open(&lite.base_apk_path)?;
        let mut pkg =
            self.parse_base_apk(&mut input, &lite.base_apk_path, &lite.path, base.as_ref(), flags)?;
        drop(base);

        let count = lite.split_names.len();
        pkg.split_names = lite.split_names.clone();
        pkg.split_code_paths = lite.split_apk_paths.clone();
        pkg.split_revision_codes = lite.split_revision_codes.clone();
        pkg.split_has_code = vec![true; count];
        pkg.split_class_loader_names = vec![None; count];
        pkg.split_dependencies = dependencies;

        for (index, split_path) in lite.split_apk_paths.iter().enumerate() {
            let archive = self.open(split_path)?;
            pkg = self.parse_split_apk(&mut input, pkg, index, split_path, archive.as_ref(), flags)?;
        }

        debug!(
            "Parsed {} with {} split(s) from {}",
            pkg.package_name(),
            count,
            lite.path.display()
        );
        Ok(pkg.build())
    }

    fn parse_base_apk(
        &self,
        input: &mut ParseInput,
        path: &Path,
        code_path: &Path,
        archive: &dyn ResourceArchive,
        flags: ParseFlags,
    ) -> ParseResult<PackageBuilder> {
        let doc = open_manifest(archive, path)?;
        let ctx = self.ctx(archive, flags);
        let mut cursor = doc.cursor();
        let mut pkg = manifest::parse_base(&ctx, input, path, code_path, &mut cursor)
            .map_err(|err| err.at(path, Some(&cursor.position_description())))?;

        if let Some(layout) = archive.resource_table() {
            if !layout.is_mappable() {
                input
                    .defer_error(
                        DeferredKind::ResourcesArscCompressed,
                        "Targeting R+ (version 30 and above) requires the resources.arsc of \
                         installed APKs to be stored uncompressed and aligned on a 4-byte boundary",
                    )
                    .map_err(|err| err.at(path, None))?;
            }
        }

        if flags.contains(ParseFlags::ENFORCE_CODE)
            && pkg.flags.has_code
            && !archive.has_entry(CLASSES_DEX_ENTRY)
        {
            return Err(ParseError::new(
                ErrorCode::InvalidApk,
                format!("Package {} code is missing", path.display()),
            ));
        }

        if flags.contains(ParseFlags::COLLECT_CERTIFICATES) {
            let min_scheme =
                signing::min_signature_scheme(pkg.target_sdk_version, pkg.is_static_shared_library());
            pkg.signing_details = signing::collect(
                self.verifier,
                archive,
                min_scheme,
                flags.contains(ParseFlags::IS_SYSTEM_DIR),
            )?;
        }

        Ok(pkg)
    }

    fn parse_split_apk(
        &self,
        input: &mut ParseInput,
        pkg: PackageBuilder,
        index: usize,
        path: &Path,
        archive: &dyn ResourceArchive,
        flags: ParseFlags,
    ) -> ParseResult<PackageBuilder> {
        let doc = open_manifest(archive, path)?;
        let ctx = self.ctx(archive, flags);
        let mut cursor = doc.cursor();
        let pkg = split::parse_split(&ctx, input, pkg, index, path, &mut cursor)
            .map_err(|err| err.at(path, Some(&cursor.position_description())))?;

        if flags.contains(ParseFlags::ENFORCE_CODE)
            && pkg.split_has_code.get(index).copied().unwrap_or(false)
            && !archive.has_entry(CLASSES_DEX_ENTRY)
        {
            return Err(ParseError::new(
                ErrorCode::InvalidApk,
                format!("Package {} code is missing", path.display()),
            ));
        }

        if flags.contains(ParseFlags::COLLECT_CERTIFICATES) {
            let min_scheme =
                signing::min_signature_scheme(pkg.target_sdk_version, pkg.is_static_shared_library());
            let details = signing::collect(
                self.verifier,
                archive,
                min_scheme,
                flags.contains(ParseFlags::IS_SYSTEM_DIR),
            )?;
            signing::ensure_consistent(&pkg.signing_details, &details, path)?;
        }

        Ok(pkg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_config() {
        let config = ParserConfig {
            collect_certificates: true,
            system_dir: true,
            ..ParserConfig::default()
        };
        let flags = ParseFlags::from_config(&config);
        assert!(flags.contains(ParseFlags::COLLECT_CERTIFICATES | ParseFlags::IS_SYSTEM_DIR));
        assert!(!flags.contains(ParseFlags::ENFORCE_CODE));
        assert_eq!(ParseFlags::MUST_BE_APK.bits(), 1);
    }
}
