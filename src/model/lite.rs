use crate::signing::SigningDetails;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `installLocation` when the manifest does not declare one
pub const INSTALL_LOCATION_UNSPECIFIED: i32 = -1;

/// Compose the 64-bit version code from its two halves
pub fn long_version_code(major: i32, minor: i32) -> i64 {
    ((major as i64) << 32) | (minor as u32 as i64)
}

/// Declared package verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifierInfo {
    pub name: String,
    /// Decoded X.509 SubjectPublicKeyInfo
    pub public_key: Vec<u8>,
}

/// Identity of a single package file, read without a full parse
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApkLite {
    pub path: PathBuf,
    pub package_name: String,
    pub split_name: Option<String>,
    pub uses_split_name: Option<String>,
    pub config_for_split: Option<String>,
    pub version_code: i32,
    pub version_code_major: i32,
    pub revision_code: i32,
    pub install_location: i32,
    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub verifiers: Vec<VerifierInfo>,
    pub signing_details: SigningDetails,
    pub core_app: bool,
    pub debuggable: bool,
    pub profileable_by_shell: bool,
    pub multi_arch: bool,
    pub use_32bit_abi: bool,
    pub extract_native_libs: bool,
    pub use_embedded_dex: bool,
    pub feature_split: bool,
    pub isolated_splits: bool,
    pub split_required: bool,
    pub overlay_is_static: bool,
    pub overlay_priority: i32,
    pub target_package_name: Option<String>,
    pub rollback_data_policy: i32,
}

impl ApkLite {
    pub fn long_version_code(&self) -> i64 {
        long_version_code(self.version_code_major, self.version_code)
    }
}

/// Validated topology of a logical package: one base file plus splits
///
/// All per-split vectors are index-aligned with `split_names`, which is in
/// lexicographic order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageLite {
    /// Directory for clusters, the file itself for monolithic packages
    pub path: PathBuf,
    pub package_name: String,
    pub base_apk_path: PathBuf,
    pub split_names: Vec<String>,
    pub split_apk_paths: Vec<PathBuf>,
    pub split_revision_codes: Vec<i32>,
    pub is_feature_split: Vec<bool>,
    pub uses_split_names: Vec<Option<String>>,
    pub config_for_split: Vec<Option<String>>,
    pub base_revision_code: i32,
    pub version_code: i32,
    pub version_code_major: i32,
    pub install_location: i32,
    pub target_sdk_version: i32,
    pub verifiers: Vec<VerifierInfo>,
    pub signing_details: SigningDetails,
    pub core_app: bool,
    pub debuggable: bool,
    pub profileable_by_shell: bool,
    pub multi_arch: bool,
    pub use_32bit_abi: bool,
    pub extract_native_libs: bool,
    pub isolated_splits: bool,
    pub split_required: bool,
    pub use_embedded_dex: bool,
    /// Split index (0 = base) to dependency indices, first entry is the
    /// parent; only present for isolated splits
    pub split_dependencies: Option<BTreeMap<usize, Vec<i32>>>,
}

impl PackageLite {
    /// Topology of a single file with no splits
    pub fn monolithic(path: &Path, base: ApkLite) -> Self {
        Self::compose(path, base, Vec::new())
    }

    /// Topology from a base and splits already sorted by split name
    pub(crate) fn compose(path: &Path, base: ApkLite, splits: Vec<ApkLite>) -> Self {
        let mut lite = PackageLite {
            path: path.to_path_buf(),
            package_name: base.package_name.clone(),
            base_apk_path: base.path.clone(),
            base_revision_code: base.revision_code,
            version_code: base.version_code,
            version_code_major: base.version_code_major,
            install_location: base.install_location,
            target_sdk_version: base.target_sdk_version,
            core_app: base.core_app,
            debuggable: base.debuggable,
            profileable_by_shell: base.profileable_by_shell,
            multi_arch: base.multi_arch,
            use_32bit_abi: base.use_32bit_abi,
            extract_native_libs: base.extract_native_libs,
            isolated_splits: base.isolated_splits,
            split_required: base.split_required,
            use_embedded_dex: base.use_embedded_dex,
            ..Default::default()
        };

        for split in splits {
            lite.split_names.push(split.split_name.unwrap_or_default());
            lite.split_apk_paths.push(split.path);
            lite.split_revision_codes.push(split.revision_code);
            lite.is_feature_split.push(split.feature_split);
            lite.uses_split_names.push(split.uses_split_name);
            lite.config_for_split.push(split.config_for_split);
        }
        lite.verifiers = base.verifiers;
        lite.signing_details = base.signing_details;
        lite
    }

    pub fn long_version_code(&self) -> i64 {
        long_version_code(self.version_code_major, self.version_code)
    }

    pub fn is_cluster(&self) -> bool {
        self.path != self.base_apk_path
    }

    /// Base path followed by every split path, in split order
    pub fn all_code_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.base_apk_path.clone())
            .chain(self.split_apk_paths.iter().cloned())
            .collect()
    }
}
