use super::component::*;
use crate::signing::SigningDetails;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Application-level boolean flags
///
/// Version-gated defaults are applied by the parser's flag table; the
/// `Default` values here are what an absent `<application>` leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppFlags {
    pub allow_backup: bool,
    pub allow_clear_user_data: bool,
    pub allow_clear_user_data_on_failed_restore: bool,
    pub allow_native_heap_pointer_tagging: bool,
    pub allow_audio_playback_capture: bool,
    pub allow_task_reparenting: bool,
    pub attributions_are_user_visible: bool,
    pub backup_in_foreground: bool,
    pub cant_save_state: bool,
    pub cross_profile: bool,
    pub debuggable: bool,
    pub default_to_device_protected_storage: bool,
    pub direct_boot_aware: bool,
    pub enabled: bool,
    pub external_storage: bool,
    pub extract_native_libs: bool,
    pub full_backup_only: bool,
    pub hardware_accelerated: bool,
    pub has_code: bool,
    pub has_fragile_user_data: bool,
    pub is_game: bool,
    pub kill_after_restore: bool,
    pub large_heap: bool,
    pub multi_arch: bool,
    pub partially_direct_boot_aware: bool,
    pub persistent: bool,
    pub preserve_legacy_external_storage: bool,
    pub profileable: bool,
    pub profileable_by_shell: bool,
    pub request_legacy_external_storage: bool,
    pub reset_enabled_settings_on_app_data_cleared: bool,
    pub restore_any_version: bool,
    pub supports_rtl: bool,
    pub test_only: bool,
    pub use_32bit_abi: bool,
    pub use_embedded_dex: bool,
    pub uses_cleartext_traffic: bool,
    pub uses_non_sdk_api: bool,
    pub vm_safe_mode: bool,
}

impl Default for AppFlags {
    fn default() -> Self {
        Self {
            allow_backup: true,
            allow_clear_user_data: true,
            allow_clear_user_data_on_failed_restore: true,
            allow_native_heap_pointer_tagging: true,
            allow_audio_playback_capture: false,
            allow_task_reparenting: false,
            attributions_are_user_visible: false,
            backup_in_foreground: false,
            cant_save_state: false,
            cross_profile: false,
            debuggable: false,
            default_to_device_protected_storage: false,
            direct_boot_aware: false,
            enabled: true,
            external_storage: false,
            extract_native_libs: true,
            full_backup_only: false,
            hardware_accelerated: false,
            has_code: true,
            has_fragile_user_data: false,
            is_game: false,
            kill_after_restore: true,
            large_heap: false,
            multi_arch: false,
            partially_direct_boot_aware: false,
            persistent: false,
            preserve_legacy_external_storage: false,
            profileable: true,
            profileable_by_shell: false,
            request_legacy_external_storage: false,
            reset_enabled_settings_on_app_data_cleared: false,
            restore_any_version: false,
            supports_rtl: false,
            test_only: false,
            use_32bit_abi: false,
            use_embedded_dex: false,
            uses_cleartext_traffic: true,
            uses_non_sdk_api: false,
            vm_safe_mode: false,
        }
    }
}

/// Package descriptor under construction
///
/// Identity (package name and code paths) is fixed when the builder is
/// created. One builder is threaded through the base file and then every
/// split of the same package before being frozen with [`build`].
///
/// [`build`]: PackageBuilder::build
#[derive(Debug, Clone, Serialize)]
pub struct PackageBuilder {
    package_name: String,
    base_code_path: PathBuf,
    code_path: PathBuf,

    pub core_app: bool,
    pub real_package: Option<String>,
    pub original_packages: Vec<String>,
    pub adopt_permissions: Vec<String>,

    pub version_code: i32,
    pub version_code_major: i32,
    pub version_name: Option<String>,
    pub base_revision_code: i32,
    pub compile_sdk_version: i32,
    pub compile_sdk_version_codename: Option<String>,
    pub shared_user_id: Option<String>,
    pub shared_user_label: u32,
    pub install_location: i32,

    pub split_names: Vec<String>,
    pub split_code_paths: Vec<PathBuf>,
    pub split_revision_codes: Vec<i32>,
    pub split_has_code: Vec<bool>,
    pub split_class_loader_names: Vec<Option<String>>,
    pub split_dependencies: Option<BTreeMap<usize, Vec<i32>>>,
    pub isolated_split_loading: bool,
    pub split_required: bool,

    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub min_extension_versions: Option<BTreeMap<i32, i32>>,

    pub flags: AppFlags,
    pub class_name: Option<String>,
    pub label: Option<String>,
    pub label_res: u32,
    pub icon: u32,
    pub round_icon: u32,
    pub banner: u32,
    pub logo: u32,
    pub theme: u32,
    pub description: u32,
    pub permission: Option<String>,
    pub task_affinity: Option<String>,
    pub process_name: Option<String>,
    pub zygote_preload_name: Option<String>,
    pub class_loader_name: Option<String>,
    pub backup_agent_name: Option<String>,
    /// -1 disabled, 0 default rules, otherwise an XML resource id
    pub full_backup_content: i32,
    pub data_extraction_rules: u32,
    pub manage_space_activity_name: Option<String>,
    pub app_component_factory: Option<String>,
    pub network_security_config: u32,
    pub category: i32,
    pub ui_options: i32,
    pub gwp_asan_mode: i32,
    pub memtag_mode: i32,
    pub native_heap_zero_init: i32,
    pub max_aspect_ratio: Option<f32>,
    pub min_aspect_ratio: Option<f32>,
    pub resizeable_activity: Option<bool>,
    pub resizeable_activity_via_sdk_version: bool,
    pub supports_size_changes: bool,
    pub has_domain_urls: bool,

    pub activities: Vec<Activity>,
    pub receivers: Vec<Activity>,
    pub services: Vec<Service>,
    pub providers: Vec<Provider>,
    pub instrumentations: Vec<Instrumentation>,
    pub permissions: Vec<Permission>,
    pub permission_groups: Vec<PermissionGroup>,
    pub attributions: Vec<Attribution>,

    pub requested_permissions: Vec<String>,
    pub uses_permissions: Vec<UsesPermission>,
    pub implicit_permissions: Vec<String>,
    pub config_preferences: Vec<ConfigurationInfo>,
    pub req_features: Vec<FeatureInfo>,
    pub feature_groups: Vec<FeatureGroup>,
    pub protected_broadcasts: Vec<String>,
    pub queries: Queries,
    pub overlay: Option<Overlay>,
    pub screens: SupportsScreens,
    pub mime_groups: BTreeSet<String>,
    pub processes: BTreeMap<String, ProcessInfo>,

    pub static_library: Option<StaticLibrary>,
    pub libraries: Vec<String>,
    pub uses_libraries: Vec<String>,
    pub uses_optional_libraries: Vec<String>,
    pub uses_native_libraries: Vec<String>,
    pub uses_optional_native_libraries: Vec<String>,
    pub uses_static_libraries: Vec<StaticLibraryDependency>,

    pub meta_data: MetaData,
    pub properties: MetaData,

    pub signing_details: SigningDetails,
    /// Key set name to base64 public keys
    pub key_sets: BTreeMap<String, BTreeSet<String>>,
    pub upgrade_key_sets: BTreeSet<String>,
    pub restrict_update_hash: Option<Vec<u8>>,
}

impl PackageBuilder {
    pub fn new(package_name: impl Into<String>, base_code_path: &Path, code_path: &Path) -> Self {
        Self {
            package_name: package_name.into(),
            base_code_path: base_code_path.to_path_buf(),
            code_path: code_path.to_path_buf(),
            core_app: false,
            real_package: None,
            original_packages: Vec::new(),
            adopt_permissions: Vec::new(),
            version_code: 0,
            version_code_major: 0,
            version_name: None,
            base_revision_code: 0,
            compile_sdk_version: 0,
            compile_sdk_version_codename: None,
            shared_user_id: None,
            shared_user_label: 0,
            install_location: super::INSTALL_LOCATION_UNSPECIFIED,
            split_names: Vec::new(),
            split_code_paths: Vec::new(),
            split_revision_codes: Vec::new(),
            split_has_code: Vec::new(),
            split_class_loader_names: Vec::new(),
            split_dependencies: None,
            isolated_split_loading: false,
            split_required: false,
            min_sdk_version: 1,
            target_sdk_version: 0,
            min_extension_versions: None,
            flags: AppFlags::default(),
            class_name: None,
            label: None,
            label_res: 0,
            icon: 0,
            round_icon: 0,
            banner: 0,
            logo: 0,
            theme: 0,
            description: 0,
            permission: None,
            task_affinity: None,
            process_name: None,
            zygote_preload_name: None,
            class_loader_name: None,
            backup_agent_name: None,
            full_backup_content: 0,
            data_extraction_rules: 0,
            manage_space_activity_name: None,
            app_component_factory: None,
            network_security_config: 0,
            category: -1,
            ui_options: 0,
            gwp_asan_mode: -1,
            memtag_mode: -1,
            native_heap_zero_init: -1,
            max_aspect_ratio: None,
            min_aspect_ratio: None,
            resizeable_activity: None,
            resizeable_activity_via_sdk_version: false,
            supports_size_changes: false,
            has_domain_urls: false,
            activities: Vec::new(),
            receivers: Vec::new(),
            services: Vec::new(),
            providers: Vec::new(),
            instrumentations: Vec::new(),
            permissions: Vec::new(),
            permission_groups: Vec::new(),
            attributions: Vec::new(),
            requested_permissions: Vec::new(),
            uses_permissions: Vec::new(),
            implicit_permissions: Vec::new(),
            config_preferences: Vec::new(),
            req_features: Vec::new(),
            feature_groups: Vec::new(),
            protected_broadcasts: Vec::new(),
            queries: Queries::default(),
            overlay: None,
            screens: SupportsScreens::default(),
            mime_groups: BTreeSet::new(),
            processes: BTreeMap::new(),
            static_library: None,
            libraries: Vec::new(),
            uses_libraries: Vec::new(),
            uses_optional_libraries: Vec::new(),
            uses_native_libraries: Vec::new(),
            uses_optional_native_libraries: Vec::new(),
            uses_static_libraries: Vec::new(),
            meta_data: MetaData::new(),
            properties: MetaData::new(),
            signing_details: SigningDetails::unknown(),
            key_sets: BTreeMap::new(),
            upgrade_key_sets: BTreeSet::new(),
            restrict_update_hash: None,
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn base_code_path(&self) -> &Path {
        &self.base_code_path
    }

    /// Directory of a cluster, or the file of a monolithic package
    pub fn code_path(&self) -> &Path {
        &self.code_path
    }

    pub fn long_version_code(&self) -> i64 {
        super::long_version_code(self.version_code_major, self.version_code)
    }

    pub fn is_static_shared_library(&self) -> bool {
        self.static_library.is_some()
    }

    /// Record a requested permission once
    pub fn add_requested_permission(&mut self, name: &str) -> bool {
        if self.requested_permissions.iter().any(|p| p == name) {
            return false;
        }
        self.requested_permissions.push(name.to_string());
        true
    }

    /// Add a permission the platform grants implicitly for compatibility
    pub fn add_implicit_permission(&mut self, name: &str) {
        if self.add_requested_permission(name) {
            self.implicit_permissions.push(name.to_string());
        }
    }

    /// Index of a split by name, aligned with `split_names`
    pub fn split_index(&self, split_name: &str) -> Option<usize> {
        self.split_names.iter().position(|s| s == split_name)
    }

    /// Freeze into the read-only view
    pub fn build(self) -> Package {
        Package { inner: self }
    }
}

/// Read-only package descriptor
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Package {
    inner: PackageBuilder,
}

impl Deref for Package {
    type Target = PackageBuilder;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Package {
    /// Reopen for modification
    pub fn into_builder(self) -> PackageBuilder {
        self.inner
    }
}
