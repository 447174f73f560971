//! Runtime environment a package is parsed against
//!
//! The platform answers feature, property and SDK questions for the parser.
//! It is read-only while parses are running and shared between threads.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Platform SDK levels referenced by manifest rules
pub mod version_codes {
    pub const BASE: i32 = 1;
    pub const DONUT: i32 = 4;
    pub const FROYO: i32 = 8;
    pub const ICE_CREAM_SANDWICH: i32 = 14;
    pub const JELLY_BEAN: i32 = 16;
    pub const JELLY_BEAN_MR1: i32 = 17;
    pub const N: i32 = 24;
    pub const O: i32 = 26;
    pub const O_MR1: i32 = 27;
    pub const P: i32 = 28;
    pub const Q: i32 = 29;
    pub const R: i32 = 30;
    pub const S: i32 = 31;
    pub const TIRAMISU: i32 = 33;
    pub const UPSIDE_DOWN_CAKE: i32 = 34;
    /// Sentinel for a pre-release SDK matched by codename
    pub const CUR_DEVELOPMENT: i32 = 10000;
}

/// Feature reported by watches
pub const FEATURE_WATCH: &str = "android.hardware.type.watch";

/// A permission split into finer-grained permissions at some SDK level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPermission {
    pub split_permission: String,
    pub new_permissions: Vec<String>,
    /// Apps targeting below this level get the new permissions implicitly
    pub target_sdk: i32,
}

impl SplitPermission {
    fn new(split: &str, new: &[&str], target_sdk: i32) -> Self {
        Self {
            split_permission: split.to_string(),
            new_permissions: new.iter().map(|p| p.to_string()).collect(),
            target_sdk,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    /// Numeric SDK of the running platform
    pub sdk_version: i32,

    /// Accepted pre-release codenames; empty on release builds
    pub codenames: Vec<String>,

    /// SDK extension id to installed extension version
    pub extension_versions: BTreeMap<i32, i32>,

    /// Features answered by `has_feature`
    pub features: BTreeSet<String>,

    pub system_properties: BTreeMap<String, String>,

    /// Packages forced into their own process, `*` for all
    pub separate_processes: Vec<String>,

    pub split_permissions: Vec<SplitPermission>,

    /// Only packages declaring `coreApp="true"` may be parsed
    pub only_core_apps: bool,
}

impl Default for Platform {
    fn default() -> Self {
        use version_codes::*;

        Self {
            sdk_version: UPSIDE_DOWN_CAKE,
            codenames: vec![],
            extension_versions: [(R, 10), (S, 10), (TIRAMISU, 10), (UPSIDE_DOWN_CAKE, 10)]
                .into_iter()
                .collect(),
            features: BTreeSet::new(),
            system_properties: BTreeMap::new(),
            separate_processes: vec![],
            split_permissions: default_split_permissions(),
            only_core_apps: false,
        }
    }
}

fn default_split_permissions() -> Vec<SplitPermission> {
    use version_codes::*;

    vec![
        SplitPermission::new(
            "android.permission.ACCESS_FINE_LOCATION",
            &["android.permission.ACCESS_BACKGROUND_LOCATION"],
            Q,
        ),
        SplitPermission::new(
            "android.permission.ACCESS_COARSE_LOCATION",
            &["android.permission.ACCESS_BACKGROUND_LOCATION"],
            Q,
        ),
        SplitPermission::new(
            "android.permission.READ_EXTERNAL_STORAGE",
            &["android.permission.ACCESS_MEDIA_LOCATION"],
            Q,
        ),
        SplitPermission::new(
            "android.permission.READ_CONTACTS",
            &["android.permission.READ_CALL_LOG"],
            JELLY_BEAN,
        ),
        SplitPermission::new(
            "android.permission.WRITE_CONTACTS",
            &["android.permission.WRITE_CALL_LOG"],
            JELLY_BEAN,
        ),
        SplitPermission::new(
            "android.permission.BLUETOOTH",
            &[
                "android.permission.BLUETOOTH_SCAN",
                "android.permission.BLUETOOTH_CONNECT",
                "android.permission.BLUETOOTH_ADVERTISE",
            ],
            S,
        ),
    ]
}

impl Platform {
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains(name)
    }

    pub fn is_watch(&self) -> bool {
        self.has_feature(FEATURE_WATCH)
    }

    /// Value of a system property; unset properties read as empty
    pub fn property(&self, name: &str) -> &str {
        self.system_properties
            .get(name)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Evaluate a `requiredSystemPropertyName`/`Value` gate
    ///
    /// Both lists are comma separated and matched pairwise. A gate with only
    /// one side present, or lists of different length, never matches.
    pub fn check_required_system_properties(&self, names: Option<&str>, values: Option<&str>) -> bool {
        let names = names.filter(|n| !n.is_empty());
        let values = values.filter(|v| !v.is_empty());
        let (names, values) = match (names, values) {
            (None, None) => return true,
            (Some(n), Some(v)) => (n, v),
            _ => return false,
        };

        let names: Vec<&str> = names.split(',').collect();
        let values: Vec<&str> = values.split(',').collect();
        if names.len() != values.len() {
            return false;
        }
        names
            .iter()
            .zip(values.iter())
            .all(|(name, value)| self.property(name) == *value)
    }

    /// Installed version of an SDK extension, 0 when unknown
    pub fn extension_version(&self, sdk: i32) -> Option<i32> {
        self.extension_versions.get(&sdk).copied()
    }

    /// Whether `package` must run in its own process
    pub fn is_separate_process(&self, package: &str) -> bool {
        self.separate_processes
            .iter()
            .any(|p| p == "*" || p == package)
    }
}
