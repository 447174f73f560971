use serde::Serialize;
use std::collections::BTreeMap;

/// Typed `<meta-data>` / `<property>` value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Resource id from a `resource` attribute
    Resource(u32),
}

impl MetaValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            MetaValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }
}

pub type MetaData = BTreeMap<String, MetaValue>;

/// Fields shared by every manifest component
#[derive(Debug, Clone, Default, Serialize)]
pub struct Component {
    /// Fully qualified class name
    pub name: String,
    pub package_name: String,
    pub label: Option<String>,
    pub label_res: u32,
    pub icon: u32,
    pub round_icon: u32,
    pub banner: u32,
    pub logo: u32,
    pub description: u32,
    pub enabled: bool,
    pub exported: bool,
    pub direct_boot_aware: bool,
    pub split_name: Option<String>,
    pub order: i32,
    pub process_name: Option<String>,
    pub permission: Option<String>,
    pub intents: Vec<IntentFilter>,
    pub meta_data: MetaData,
    pub properties: MetaData,
}

impl Component {
    pub fn new(name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_name: package_name.into(),
            enabled: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntentFilter {
    pub actions: Vec<String>,
    pub categories: Vec<String>,
    pub schemes: Vec<String>,
    pub hosts: Vec<String>,
    pub paths: Vec<String>,
    pub mime_types: Vec<String>,
    pub mime_groups: Vec<String>,
    pub priority: i32,
    pub order: i32,
    pub auto_verify: bool,
    pub label_res: u32,
    pub icon: u32,
}

impl IntentFilter {
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s == scheme)
    }
}

/// `<activity>`, `<activity-alias>` and `<receiver>`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Activity {
    #[serde(flatten)]
    pub component: Component,
    /// Set on aliases only
    pub target_activity: Option<String>,
    pub task_affinity: Option<String>,
    pub theme: u32,
    pub launch_mode: i32,
    pub screen_orientation: i32,
    pub config_changes: i32,
    pub soft_input_mode: i32,
    pub resize_mode: ResizeMode,
    pub supports_picture_in_picture: bool,
    pub max_aspect_ratio: Option<f32>,
    pub min_aspect_ratio: Option<f32>,
    pub supports_size_changes: bool,
    pub hardware_accelerated: bool,
    pub multiprocess: bool,
    pub exclude_from_recents: bool,
    pub no_history: bool,
    pub allow_task_reparenting: bool,
    pub persistable_mode: i32,
    pub color_mode: i32,
    pub document_launch_mode: i32,
}

impl Activity {
    pub fn name(&self) -> &str {
        &self.component.name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    #[default]
    Resizeable,
    Unresizeable,
    ResizeableViaSdkVersion,
    /// Pre-N package that never declared resizeability
    ForceResizeable,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Service {
    #[serde(flatten)]
    pub component: Component,
    pub foreground_service_type: i32,
    pub isolated: bool,
    pub external: bool,
    pub stop_with_task: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Provider {
    #[serde(flatten)]
    pub component: Component,
    /// `;`-separated authority list as declared
    pub authority: String,
    pub syncable: bool,
    pub read_permission: Option<String>,
    pub write_permission: Option<String>,
    pub grant_uri_permissions: bool,
    pub multiprocess: bool,
    pub init_order: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Instrumentation {
    #[serde(flatten)]
    pub component: Component,
    pub target_package: String,
    pub target_processes: Option<String>,
    pub handle_profiling: bool,
    pub functional_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Permission {
    pub name: String,
    pub group: Option<String>,
    pub protection_level: i32,
    pub background_permission: Option<String>,
    pub request_res: u32,
    pub label_res: u32,
    pub description: u32,
    /// Declared through `<permission-tree>`
    pub tree: bool,
}

impl Permission {
    /// Attribute-level equality used to detect conflicting redeclarations
    pub fn same_declaration(&self, other: &Permission) -> bool {
        self.group == other.group
            && self.protection_level == other.protection_level
            && self.background_permission == other.background_permission
            && self.tree == other.tree
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionGroup {
    pub name: String,
    pub priority: i32,
    pub request_detail: u32,
    pub background_request: u32,
    pub background_request_detail: u32,
    pub label_res: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attribution {
    pub tag: String,
    pub label: u32,
    pub inherit_from: Vec<String>,
}

/// `<uses-permission>` as declared
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsesPermission {
    pub name: String,
    pub max_sdk_version: Option<i32>,
    pub flags: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureInfo {
    pub name: Option<String>,
    pub version: i32,
    /// OpenGL ES version for the unnamed GL feature
    pub gl_es_version: i32,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureGroup {
    pub features: Vec<FeatureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigurationInfo {
    pub touchscreen: i32,
    pub keyboard_type: i32,
    pub navigation: i32,
    pub req_gl_es_version: i32,
    pub hard_keyboard: bool,
    pub five_way_nav: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub denied_permissions: Vec<String>,
    pub gwp_asan_mode: i32,
    pub memtag_mode: i32,
    pub native_heap_zero_init: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Queries {
    pub intents: Vec<IntentFilter>,
    pub packages: Vec<String>,
    pub provider_authorities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overlay {
    pub target_package: String,
    pub target_name: Option<String>,
    pub category: Option<String>,
    pub priority: i32,
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticLibrary {
    pub name: String,
    pub version: i64,
}

/// `<uses-static-library>` dependency
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticLibraryDependency {
    pub name: String,
    pub version: i64,
    /// Lowercase hex digests, ':' separators removed
    pub cert_digests: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupportsScreens {
    pub small: Option<bool>,
    pub normal: Option<bool>,
    pub large: Option<bool>,
    pub xlarge: Option<bool>,
    pub resizeable: Option<bool>,
    pub any_density: Option<bool>,
    pub requires_smallest_width_dp: i32,
    pub compatible_width_limit_dp: i32,
    pub largest_width_limit_dp: i32,
}

impl SupportsScreens {
    /// Whether any screen-size support attribute was declared
    pub fn any_declared(&self) -> bool {
        self.small.is_some()
            || self.normal.is_some()
            || self.large.is_some()
            || self.xlarge.is_some()
            || self.resizeable.is_some()
            || self.any_density.is_some()
    }
}
