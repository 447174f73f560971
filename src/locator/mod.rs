//! Lightweight package locator
//!
//! Reads only the identity of each package file: the `<manifest>` start tag
//! and a handful of its direct children. A directory is treated as one
//! package made of a base file and its splits.

mod topology;

pub use topology::{split_dependencies, ClusterBuilder};

use crate::archive::{ArchiveOpener, ResourceArchive};
use crate::config::Platform;
use crate::document::{Attrs, Token, XmlCursor};
use crate::model::{ApkLite, PackageLite, VerifierInfo, INSTALL_LOCATION_UNSPECIFIED};
use crate::parser::{
    compute_min_sdk_version, compute_target_sdk_version, declared_sdk_value, ignore, open_manifest,
    parse_package_split_names, walk_children, ParseFlags, SdkValue, UnknownTagPolicy,
    DEFAULT_MIN_SDK_VERSION, DEFAULT_TARGET_SDK_VERSION, INSTALL_LOCATIONS,
};
use crate::result::{done, skipped, ErrorCode, ParseError, ParseResult, Step};
use crate::signing::{self, SigningVerifier};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `rollbackDataPolicy` names
const ROLLBACK_DATA_POLICIES: &[(&str, i32)] = &[("restore", 0), ("wipe", 1), ("retain", 2)];

/// Whether a path names a package file
pub fn is_apk_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "apk")
}

/// Resolves a path to a validated package topology
pub struct Locator<'a> {
    opener: &'a dyn ArchiveOpener,
    platform: &'a Platform,
    verifier: &'a dyn SigningVerifier,
}

impl<'a> Locator<'a> {
    pub fn new(opener: &'a dyn ArchiveOpener, platform: &'a Platform, verifier: &'a dyn SigningVerifier) -> Self {
        Self {
            opener,
            platform,
            verifier,
        }
    }

    /// Topology of a single file or of a package directory
    pub fn locate(&self, path: &Path, flags: ParseFlags) -> ParseResult<PackageLite> {
        if self.opener.is_dir(path) {
            self.locate_cluster(path, flags)
        } else {
            let lite = self.parse_apk_lite(path, flags)?;
            Ok(PackageLite::monolithic(path, lite))
        }
    }

    fn list(&self, dir: &Path) -> ParseResult<Vec<PathBuf>> {
        self.opener.list_dir(dir).map_err(|err| {
            ParseError::new(
                ErrorCode::NotApk,
                format!("Failed to list {}", dir.display()),
            )
            .with_cause(err)
        })
    }

    fn locate_cluster(&self, dir: &Path, flags: ParseFlags) -> ParseResult<PackageLite> {
        let mut children = self.list(dir)?;
        // A directory holding only one directory is unwrapped once
        if let [only] = children.as_slice() {
            if self.opener.is_dir(only) {
                children = self.list(only)?;
            }
        }

        let mut cluster = ClusterBuilder::new();
        for file in children.iter().filter(|p| is_apk_file(p) && !self.opener.is_dir(p)) {
            let lite = self.parse_apk_lite(file, flags | ParseFlags::MUST_BE_APK)?;
            debug!(
                "Located {} split {} in {}",
                lite.package_name,
                lite.split_name.as_deref().unwrap_or("base"),
                file.display()
            );
            cluster.add(lite)?;
        }

        if cluster.is_empty() {
            return Err(ParseError::new(ErrorCode::NotApk, "No packages found in split"));
        }
        cluster.build(dir)
    }

    /// Identity of one package file
    pub fn parse_apk_lite(&self, path: &Path, flags: ParseFlags) -> ParseResult<ApkLite> {
        if flags.contains(ParseFlags::MUST_BE_APK) && !is_apk_file(path) {
            return Err(ParseError::new(
                ErrorCode::NotApk,
                format!("Invalid package file: {}", path.display()),
            ));
        }

        let archive = self.opener.open(path).map_err(|err| {
            ParseError::new(ErrorCode::NotApk, format!("Failed to parse {}", path.display())).with_cause(err)
        })?;
        let doc = open_manifest(archive.as_ref(), path).map_err(|err| err.at(path, None))?;
        let mut cursor = doc.cursor();
        let mut lite = parse_manifest_lite(archive.as_ref(), self.platform, path, &mut cursor)
            .map_err(|err| err.at(path, Some(&cursor.position_description())))?;

        if flags.contains(ParseFlags::COLLECT_CERTIFICATES) {
            let min_scheme = signing::min_signature_scheme(lite.target_sdk_version, false);
            lite.signing_details = signing::collect(
                self.verifier,
                archive.as_ref(),
                min_scheme,
                flags.contains(ParseFlags::IS_SYSTEM_DIR),
            )?;
        }
        Ok(lite)
    }
}

/// Read the identity fields from a manifest document
pub fn parse_manifest_lite<'d>(
    archive: &'d dyn ResourceArchive,
    platform: &Platform,
    path: &Path,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<ApkLite> {
    if cursor.next_start_tag() == Token::EndDocument {
        return Err(ParseError::new(ErrorCode::ManifestEmpty, "No start tag found"));
    }
    let (package_name, split_name) = parse_package_split_names(cursor)?;
    let attrs = Attrs::of(cursor, archive);

    let mut lite = ApkLite {
        path: path.to_path_buf(),
        package_name,
        split_name,
        config_for_split: attrs
            .unqualified("configForSplit")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        version_code: attrs.int("versionCode", 0),
        version_code_major: attrs.int("versionCodeMajor", 0),
        revision_code: attrs.int("revisionCode", 0),
        install_location: attrs.enum_int("installLocation", INSTALL_LOCATIONS, INSTALL_LOCATION_UNSPECIFIED),
        min_sdk_version: DEFAULT_MIN_SDK_VERSION,
        target_sdk_version: DEFAULT_TARGET_SDK_VERSION,
        core_app: attrs.unqualified("coreApp") == Some("true"),
        extract_native_libs: true,
        feature_split: attrs.bool("isFeatureSplit", false),
        isolated_splits: attrs.bool("isolatedSplits", false),
        split_required: attrs.bool("isSplitRequired", false),
        ..Default::default()
    };

    walk_children(cursor, "<manifest>", UnknownTagPolicy::Lenient, |tag, cursor| match tag {
        "package-verifier" => Some(lite_verifier(archive, &mut lite, cursor)),
        "application" => Some(lite_application(archive, &mut lite, cursor)),
        "overlay" => Some(lite_overlay(archive, platform, &mut lite, cursor)),
        "uses-split" => Some(lite_uses_split(archive, &mut lite, cursor)),
        "uses-sdk" => Some(lite_uses_sdk(archive, platform, &mut lite, cursor)),
        _ => ignore(cursor),
    })?;
    Ok(lite)
}

fn lite_verifier(archive: &dyn ResourceArchive, lite: &mut ApkLite, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, archive);
    let name = attrs.non_resource_string("name").unwrap_or_default();
    let key = attrs.non_resource_string("publicKey").unwrap_or_default();
    if name.is_empty() {
        info!("verifier package name was null; skipping");
        return skipped("package-verifier without a name");
    }
    let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(public_key) if !public_key.is_empty() => {
            lite.verifiers.push(VerifierInfo {
                name: name.to_string(),
                public_key,
            });
            done()
        }
        _ => {
            info!("Unable to parse verifier public key for {}", name);
            skipped("package-verifier with an unreadable key")
        }
    }
}

fn lite_application<'d>(archive: &'d dyn ResourceArchive, lite: &mut ApkLite, cursor: &mut XmlCursor<'d>) -> Step {
    let attrs = Attrs::of(cursor, archive);
    lite.debuggable = attrs.bool("debuggable", false);
    if lite.debuggable {
        // Debuggable implies profileable
        lite.profileable_by_shell = true;
    }
    lite.multi_arch = attrs.bool("multiArch", false);
    lite.use_32bit_abi = attrs.bool("use32bitAbi", false);
    lite.extract_native_libs = attrs.bool("extractNativeLibs", true);
    lite.use_embedded_dex = attrs.bool("useEmbeddedDex", false);
    lite.rollback_data_policy = attrs.enum_int("rollbackDataPolicy", ROLLBACK_DATA_POLICIES, 0);

    walk_children(cursor, "<application>", UnknownTagPolicy::Lenient, |tag, cursor| match tag {
        "profileable" => {
            // Debuggable stays profileable by shell whatever the tag says
            lite.profileable_by_shell |= Attrs::of(cursor, archive).bool("shell", false);
            Some(done())
        }
        _ => ignore(cursor),
    })?;
    done()
}

fn lite_overlay(archive: &dyn ResourceArchive, platform: &Platform, lite: &mut ApkLite, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, archive);
    let property_name = attrs.non_config_string("requiredSystemPropertyName");
    let property_value = attrs.non_config_string("requiredSystemPropertyValue");
    if !platform.check_required_system_properties(property_name.as_deref(), property_value.as_deref()) {
        info!(
            "Ignoring overlay {} due to required system property: {} with value: {}",
            lite.path.display(),
            property_name.as_deref().unwrap_or("null"),
            property_value.as_deref().unwrap_or("null")
        );
        lite.target_package_name = None;
        lite.overlay_is_static = false;
        lite.overlay_priority = 0;
        return skipped("overlay gated by system property");
    }
    lite.target_package_name = attrs.non_config_string("targetPackage");
    lite.overlay_is_static = attrs.bool("isStatic", false);
    lite.overlay_priority = attrs.int("priority", 0);
    done()
}

fn lite_uses_split(archive: &dyn ResourceArchive, lite: &mut ApkLite, cursor: &XmlCursor<'_>) -> Step {
    if lite.uses_split_name.is_some() {
        warn!("Only one <uses-split> permitted. Ignoring others.");
        return skipped("extra <uses-split>");
    }
    match Attrs::of(cursor, archive).non_resource_string("name") {
        Some(name) if !name.is_empty() => {
            lite.uses_split_name = Some(name.to_string());
            done()
        }
        _ => Err(ParseError::new(
            ErrorCode::BadManifest,
            "<uses-split> tag requires 'android:name' attribute",
        )),
    }
}

fn lite_uses_sdk(
    archive: &dyn ResourceArchive,
    platform: &Platform,
    lite: &mut ApkLite,
    cursor: &XmlCursor<'_>,
) -> Step {
    let attrs = Attrs::of(cursor, archive);
    // Absent values keep their defaults here; the full parse derives the
    // target from the minimum instead
    lite.min_sdk_version = match declared_sdk_value(&attrs, "minSdkVersion", archive) {
        None => DEFAULT_MIN_SDK_VERSION,
        Some(SdkValue::Version(v)) => {
            compute_min_sdk_version(v, None, platform.sdk_version, &platform.codenames)?
        }
        Some(SdkValue::Codename(code)) => compute_min_sdk_version(
            DEFAULT_MIN_SDK_VERSION,
            Some(&code),
            platform.sdk_version,
            &platform.codenames,
        )?,
    };
    lite.target_sdk_version = match declared_sdk_value(&attrs, "targetSdkVersion", archive) {
        None => DEFAULT_TARGET_SDK_VERSION,
        Some(SdkValue::Version(v)) => v,
        Some(SdkValue::Codename(code)) => {
            compute_target_sdk_version(DEFAULT_TARGET_SDK_VERSION, Some(&code), &platform.codenames)?
        }
    };
    done()
}
