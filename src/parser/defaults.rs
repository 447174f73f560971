//! Version-gated defaults for `<application>` flags
//!
//! Each boolean attribute is one row: attribute name, how its default depends
//! on the package's target SDK, and the field it lands in. Rows are evaluated
//! once per attribute, in table order.

use crate::config::version_codes::*;
use crate::document::Attrs;
use crate::model::AppFlags;

/// Default of a flag as a function of target SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkGate {
    Always(bool),
    /// `true` when target SDK >= the level
    AtLeast(i32),
    /// `true` when target SDK < the level
    Below(i32),
}

impl SdkGate {
    pub fn default_for(self, target_sdk: i32) -> bool {
        match self {
            SdkGate::Always(value) => value,
            SdkGate::AtLeast(level) => target_sdk >= level,
            SdkGate::Below(level) => target_sdk < level,
        }
    }
}

pub struct FlagRule {
    pub attr: &'static str,
    pub default: SdkGate,
    pub set: fn(&mut AppFlags, bool),
}

macro_rules! rule {
    ($attr:literal, $default:expr, $field:ident) => {
        FlagRule {
            attr: $attr,
            default: $default,
            set: |flags, value| flags.$field = value,
        }
    };
}

/// Flags read from every `<application>`
pub const APPLICATION_FLAGS: &[FlagRule] = &[
    rule!("allowBackup", SdkGate::Always(true), allow_backup),
    rule!("allowClearUserData", SdkGate::Always(true), allow_clear_user_data),
    rule!(
        "allowClearUserDataOnFailedRestore",
        SdkGate::Always(true),
        allow_clear_user_data_on_failed_restore
    ),
    rule!(
        "allowNativeHeapPointerTagging",
        SdkGate::Always(true),
        allow_native_heap_pointer_tagging
    ),
    rule!("allowAudioPlaybackCapture", SdkGate::AtLeast(Q), allow_audio_playback_capture),
    rule!("allowTaskReparenting", SdkGate::Always(false), allow_task_reparenting),
    rule!(
        "attributionsAreUserVisible",
        SdkGate::Always(false),
        attributions_are_user_visible
    ),
    rule!("cantSaveState", SdkGate::Always(false), cant_save_state),
    rule!("crossProfile", SdkGate::Always(false), cross_profile),
    rule!("debuggable", SdkGate::Always(false), debuggable),
    rule!(
        "defaultToDeviceProtectedStorage",
        SdkGate::Always(false),
        default_to_device_protected_storage
    ),
    rule!("directBootAware", SdkGate::Always(false), direct_boot_aware),
    rule!("enabled", SdkGate::Always(true), enabled),
    rule!("extractNativeLibs", SdkGate::Always(true), extract_native_libs),
    rule!("hardwareAccelerated", SdkGate::AtLeast(ICE_CREAM_SANDWICH), hardware_accelerated),
    rule!("hasCode", SdkGate::Always(true), has_code),
    rule!("hasFragileUserData", SdkGate::Always(false), has_fragile_user_data),
    rule!("isGame", SdkGate::Always(false), is_game),
    rule!("largeHeap", SdkGate::Always(false), large_heap),
    rule!("multiArch", SdkGate::Always(false), multi_arch),
    rule!("persistent", SdkGate::Always(false), persistent),
    rule!(
        "preserveLegacyExternalStorage",
        SdkGate::Always(false),
        preserve_legacy_external_storage
    ),
    rule!("requestLegacyExternalStorage", SdkGate::Below(Q), request_legacy_external_storage),
    rule!(
        "resetEnabledSettingsOnAppDataCleared",
        SdkGate::Always(false),
        reset_enabled_settings_on_app_data_cleared
    ),
    rule!("supportsRtl", SdkGate::Always(false), supports_rtl),
    rule!("testOnly", SdkGate::Always(false), test_only),
    rule!("use32bitAbi", SdkGate::Always(false), use_32bit_abi),
    rule!("useEmbeddedDex", SdkGate::Always(false), use_embedded_dex),
    rule!("usesCleartextTraffic", SdkGate::Below(P), uses_cleartext_traffic),
    rule!("usesNonSdkApi", SdkGate::Always(false), uses_non_sdk_api),
    rule!("vmSafeMode", SdkGate::Always(false), vm_safe_mode),
];

/// Flags that only exist when the package declares a backup agent
pub const BACKUP_AGENT_FLAGS: &[FlagRule] = &[
    rule!("killAfterRestore", SdkGate::Always(true), kill_after_restore),
    rule!("restoreAnyVersion", SdkGate::Always(false), restore_any_version),
    rule!("fullBackupOnly", SdkGate::Always(false), full_backup_only),
    rule!("backupInForeground", SdkGate::Always(false), backup_in_foreground),
];

/// Evaluate every rule against the tag's attributes
pub fn apply(rules: &[FlagRule], attrs: &Attrs<'_>, target_sdk: i32, flags: &mut AppFlags) {
    for rule in rules {
        let value = attrs.bool(rule.attr, rule.default.default_for(target_sdk));
        (rule.set)(flags, value);
    }
}
