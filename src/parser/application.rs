//! `<application>` of the base file
//!
//! Reads the application attributes, dispatches its children, then runs the
//! post-pass: the synthesized app-details activity, `order` sorting, aspect
//! ratio and size-change defaults, and the verified-links hint.

use super::components::{
    add_main_component, add_meta, label, ComponentOrders, APP_DETAILS_ACTIVITY_CLASS_NAME,
};
use super::defaults::{self, APPLICATION_FLAGS, BACKUP_AGENT_FLAGS};
use super::names::{build_class_name, build_process_name, build_task_affinity_name};
use super::walker::{ignore, walk_children};
use super::{Ctx, ParsingCallback};
use crate::config::version_codes::{FROYO, N, O, O_MR1, Q};
use crate::config::FEATURE_WATCH;
use crate::document::{Attrs, TypedValue, XmlCursor};
use crate::model::{
    long_version_code, Activity, Component, PackageBuilder, ProcessInfo, ResizeMode, StaticLibrary,
    StaticLibraryDependency,
};
use crate::result::{done, ErrorCode, ParseError, ParseInput, ParseResult, Step};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PRE_O_MAX_ASPECT_RATIO: f32 = 1.86;
pub const DEFAULT_PRE_Q_MIN_ASPECT_RATIO: f32 = 1.333;
pub const DEFAULT_PRE_Q_MIN_ASPECT_RATIO_WATCH: f32 = 1.0;

const METADATA_MAX_ASPECT_RATIO: &str = "android.max_aspect";
const METADATA_SUPPORTS_SIZE_CHANGES: &str = "android.supports_size_changes";

/// `Theme.NoDisplay`
const THEME_NO_DISPLAY: u32 = 0x0103_0055;

const ACTION_VIEW: &str = "android.intent.action.VIEW";
/// Platform alias of `ACTION_VIEW`
const ACTION_DEFAULT: &str = ACTION_VIEW;

const GWP_ASAN_MODES: &[(&str, i32)] = &[("default", -1), ("never", 0), ("always", 1)];
const MEMTAG_MODES: &[(&str, i32)] = &[("default", -1), ("off", 0), ("async", 1), ("sync", 2)];
const APP_CATEGORIES: &[(&str, i32)] = &[
    ("game", 0),
    ("audio", 1),
    ("video", 2),
    ("image", 3),
    ("social", 4),
    ("news", 5),
    ("maps", 6),
    ("productivity", 7),
    ("accessibility", 8),
];

pub(super) fn is_valid_class_loader_name(name: &str) -> bool {
    matches!(
        name,
        "dalvik.system.PathClassLoader" | "dalvik.system.DelegateLastClassLoader"
    )
}

/// String attribute; resource references are not followed before FROYO
fn legacy_string(attrs: &Attrs<'_>, name: &str, target_sdk: i32) -> Option<String> {
    if target_sdk >= FROYO {
        attrs.non_config_string(name)
    } else {
        attrs.non_resource_string(name).map(str::to_string)
    }
}

pub(super) fn parse_base_application<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    let package_name = pkg.package_name().to_string();
    let target_sdk = pkg.target_sdk_version;

    if let Some(name) = attrs.non_config_string("name") {
        let class_name = build_class_name(&package_name, &name)?;
        if class_name == APP_DETAILS_ACTIVITY_CLASS_NAME {
            return Err(ParseError::malformed("<application> invalid android:name"));
        }
        pkg.class_name = Some(class_name);
    }

    let (app_label, label_res) = label(&attrs);
    pkg.label = app_label;
    pkg.label_res = label_res;
    pkg.icon = attrs.resource_id("icon");
    pkg.round_icon = attrs.resource_id("roundIcon");
    pkg.banner = attrs.resource_id("banner");
    pkg.logo = attrs.resource_id("logo");
    pkg.theme = attrs.resource_id("theme");
    pkg.description = attrs.resource_id("description");
    pkg.network_security_config = attrs.resource_id("networkSecurityConfig");
    pkg.data_extraction_rules = attrs.resource_id("dataExtractionRules");

    if let Some(activity) = attrs.non_config_string("manageSpaceActivity") {
        pkg.manage_space_activity_name = Some(build_class_name(&package_name, &activity)?);
    }
    if let Some(factory) = attrs.non_config_string("appComponentFactory") {
        pkg.app_component_factory = Some(build_class_name(&package_name, &factory)?);
    }

    defaults::apply(APPLICATION_FLAGS, &attrs, target_sdk, &mut pkg.flags);
    if pkg.flags.debuggable {
        pkg.flags.profileable_by_shell = true;
    }
    if pkg.flags.persistent {
        if let Some(feature) = attrs.non_resource_string("persistentWhenFeatureAvailable") {
            pkg.flags.persistent = ctx.callback.has_feature(feature);
        }
    }

    if pkg.flags.allow_backup {
        if let Some(agent) = attrs.non_config_string("backupAgent") {
            pkg.backup_agent_name = Some(build_class_name(&package_name, &agent)?);
            defaults::apply(BACKUP_AGENT_FLAGS, &attrs, target_sdk, &mut pkg.flags);
        }
        if let Some(value) = attrs.peek("fullBackupContent") {
            pkg.full_backup_content = match value {
                TypedValue::Reference(id) if id != 0 => id as i32,
                TypedValue::Bool(false) | TypedValue::Int(0) => -1,
                _ => 0,
            };
        }
    }

    pkg.permission = attrs.non_config_string("permission").filter(|p| !p.is_empty());
    pkg.task_affinity = build_task_affinity_name(
        &package_name,
        Some(&package_name),
        legacy_string(&attrs, "taskAffinity", target_sdk).as_deref(),
    )?;
    let process = build_process_name(
        &package_name,
        None,
        legacy_string(&attrs, "process", target_sdk).as_deref(),
        ctx.ignore_processes(),
        ctx.platform,
    )?;
    let process = process.unwrap_or_else(|| package_name.clone());
    if pkg.flags.cant_save_state && process != package_name {
        return Err(ParseError::malformed(
            "cantSaveState applications can not use custom processes",
        ));
    }
    pkg.process_name = Some(process);

    pkg.zygote_preload_name = attrs.non_config_string("zygotePreloadName");
    let class_loader = attrs.string("classLoader");
    if let Some(name) = &class_loader {
        if !is_valid_class_loader_name(name) {
            return Err(ParseError::malformed(format!("Invalid class loader name: {}", name)));
        }
    }
    pkg.class_loader_name = class_loader;

    pkg.category = attrs.enum_int("appCategory", APP_CATEGORIES, -1);
    pkg.ui_options = attrs.int("uiOptions", 0);
    pkg.gwp_asan_mode = attrs.enum_int("gwpAsanMode", GWP_ASAN_MODES, -1);
    pkg.memtag_mode = attrs.enum_int("memtagMode", MEMTAG_MODES, -1);
    if attrs.has_value("nativeHeapZeroInitialized") {
        pkg.native_heap_zero_init = attrs.bool("nativeHeapZeroInitialized", false) as i32;
    }
    if attrs.has_value("maxAspectRatio") {
        pkg.max_aspect_ratio = Some(attrs.float("maxAspectRatio", 0.0));
    }
    if attrs.has_value("minAspectRatio") {
        pkg.min_aspect_ratio = Some(attrs.float("minAspectRatio", 0.0));
    }
    if attrs.has_value_or_empty("resizeableActivity") {
        pkg.resizeable_activity = Some(attrs.bool("resizeableActivity", true));
    } else {
        pkg.resizeable_activity_via_sdk_version = target_sdk >= N;
    }

    let mut orders = ComponentOrders::default();
    walk_children(cursor, "<application>", ctx.policy, |tag, cursor| match tag {
        "activity" | "receiver" | "service" | "provider" | "activity-alias" => Some(
            add_main_component(ctx, input, pkg, cursor, tag, None, &mut orders),
        ),
        "meta-data" => Some(add_meta(ctx, &mut pkg.meta_data, cursor, "<meta-data>")),
        "property" => Some(add_meta(ctx, &mut pkg.properties, cursor, "<property>")),
        "static-library" => Some(parse_static_library(ctx, pkg, cursor)),
        "library" => Some(parse_library(ctx, pkg, cursor)),
        "processes" => Some(parse_processes(ctx, pkg, cursor)),
        "profileable" => Some(parse_profileable(ctx, pkg, cursor)),
        _ => parse_library_uses(ctx, pkg, tag, cursor),
    })?;

    if !pkg.is_static_shared_library() {
        let details = app_details_activity(pkg)?;
        pkg.activities.push(details);
    }

    orders.sort(pkg);
    set_max_aspect_ratio(pkg);
    set_min_aspect_ratio(pkg, ctx.callback);
    set_supports_size_changes(pkg);
    pkg.has_domain_urls = has_domain_urls(pkg);
    done()
}

/// Library dependency tags accepted under both base and split applications
pub(super) fn parse_library_uses<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    tag: &str,
    cursor: &mut XmlCursor<'d>,
) -> Option<Step> {
    match tag {
        "uses-static-library" => Some(parse_uses_static_library(ctx, pkg, cursor)),
        "uses-library" => Some(parse_uses_library(ctx, pkg, cursor)),
        "uses-native-library" => Some(parse_uses_native_library(ctx, pkg, cursor)),
        "uses-package" => ignore(cursor),
        _ => None,
    }
}

fn parse_static_library(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let name = attrs.non_resource_string("name");
    let version = attrs.int("version", -1);
    let major = attrs.int("versionMajor", 0);

    let name = match name {
        Some(name) if version >= 0 => name,
        _ => {
            return Err(ParseError::malformed(format!(
                "Bad static-library declaration name: {} version: {}",
                name.unwrap_or("null"),
                version
            )))
        }
    };
    if pkg.shared_user_id.is_some() {
        return Err(ParseError::new(
            ErrorCode::BadSharedUserId,
            "sharedUserId not allowed in static shared library",
        ));
    }
    if pkg.static_library.is_some() {
        return Err(ParseError::malformed(format!(
            "Multiple static-shared libs for package {}",
            pkg.package_name()
        )));
    }
    pkg.static_library = Some(StaticLibrary {
        name: name.to_string(),
        version: long_version_code(major, version),
    });
    done()
}

fn parse_library(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    if let Some(name) = Attrs::of(cursor, ctx.res).non_resource_string("name") {
        if !pkg.libraries.iter().any(|l| l == name) {
            pkg.libraries.push(name.to_string());
        }
    }
    done()
}

fn normalize_digest(digest: &str) -> String {
    digest.replace(':', "").to_lowercase()
}

fn parse_uses_static_library<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    let name = attrs.non_resource_string("name");
    let version = attrs.int("version", -1);
    let digest = attrs.non_resource_string("certDigest").filter(|d| !d.is_empty());

    let (name, digest) = match (name, digest) {
        (Some(name), Some(digest)) if version >= 0 => (name, digest),
        _ => {
            return Err(ParseError::malformed(format!(
                "Bad uses-static-library declaration name: {} version: {} certDigest{}",
                name.unwrap_or("null"),
                version,
                digest.unwrap_or("null")
            )))
        }
    };
    if pkg.uses_static_libraries.iter().any(|l| l.name == name) {
        return Err(ParseError::malformed(format!(
            "Depending on multiple versions of static library {}",
            name
        )));
    }

    let mut cert_digests = vec![normalize_digest(digest)];
    if pkg.target_sdk_version >= O_MR1 {
        walk_children(cursor, "<uses-static-library>", ctx.policy, |tag, cursor| match tag {
            "additional-certificate" => Some(
                match ctx.attrs(cursor).non_resource_string("certDigest").filter(|d| !d.is_empty()) {
                    Some(extra) => {
                        cert_digests.push(normalize_digest(extra));
                        done()
                    }
                    None => Err(ParseError::malformed(
                        "Bad additional-certificate declaration with empty certDigest:null",
                    )),
                },
            ),
            _ => None,
        })?;
    }

    pkg.uses_static_libraries.push(StaticLibraryDependency {
        name: name.to_string(),
        version: i64::from(version),
        cert_digests,
    });
    done()
}

/// Required entries win over optional declarations of the same library
fn add_library_use(required_list: &mut Vec<String>, optional_list: &mut Vec<String>, name: &str, required: bool) {
    if required {
        if !required_list.iter().any(|l| l == name) {
            required_list.push(name.to_string());
        }
        optional_list.retain(|l| l != name);
    } else if !required_list.iter().any(|l| l == name) && !optional_list.iter().any(|l| l == name) {
        optional_list.push(name.to_string());
    }
}

fn parse_uses_library(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    if let Some(name) = attrs.non_resource_string("name") {
        let required = attrs.bool("required", true);
        add_library_use(&mut pkg.uses_libraries, &mut pkg.uses_optional_libraries, name, required);
    }
    done()
}

fn parse_uses_native_library(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    if let Some(name) = attrs.non_resource_string("name") {
        let required = attrs.bool("required", true);
        add_library_use(
            &mut pkg.uses_native_libraries,
            &mut pkg.uses_optional_native_libraries,
            name,
            required,
        );
    }
    done()
}

/// Permission overrides from `<deny-permission>`/`<allow-permission>`
fn update_denied(ctx: &Ctx<'_, '_>, tag: &str, cursor: &XmlCursor<'_>, denied: &mut BTreeSet<String>) -> Option<Step> {
    let name = Attrs::of(cursor, ctx.res).non_config_string("name");
    match (tag, name) {
        ("deny-permission", Some(name)) => {
            denied.insert(name);
        }
        ("allow-permission", Some(name)) => {
            denied.remove(&name);
        }
        ("deny-permission" | "allow-permission", None) => {}
        _ => return None,
    }
    Some(done())
}

fn parse_processes<'d>(ctx: &Ctx<'d, '_>, pkg: &mut PackageBuilder, cursor: &mut XmlCursor<'d>) -> Step {
    let package_name = pkg.package_name().to_string();
    let mut denied = BTreeSet::new();
    let mut processes = BTreeMap::new();

    walk_children(cursor, "<processes>", ctx.policy, |tag, cursor| match tag {
        "process" => Some(parse_process(ctx, &package_name, &denied, &mut processes, cursor)),
        _ => update_denied(ctx, tag, cursor, &mut denied),
    })?;

    pkg.processes = processes;
    done()
}

fn parse_process<'d>(
    ctx: &Ctx<'d, '_>,
    package_name: &str,
    default_denied: &BTreeSet<String>,
    processes: &mut BTreeMap<String, ProcessInfo>,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    let Some(declared) = attrs.non_config_string("process") else {
        return Err(ParseError::malformed("<process> does not specify android:process"));
    };
    let name = build_process_name(
        package_name,
        Some(package_name),
        Some(&declared),
        ctx.ignore_processes(),
        ctx.platform,
    )?
    .unwrap_or_else(|| package_name.to_string());
    if processes.contains_key(&name) {
        return Err(ParseError::malformed(format!(
            "<process> specified existing name '{}'",
            name
        )));
    }

    let gwp_asan_mode = attrs.enum_int("gwpAsanMode", GWP_ASAN_MODES, -1);
    let memtag_mode = attrs.enum_int("memtagMode", MEMTAG_MODES, -1);
    let native_heap_zero_init = if attrs.has_value("nativeHeapZeroInitialized") {
        attrs.bool("nativeHeapZeroInitialized", false) as i32
    } else {
        -1
    };

    let mut denied = default_denied.clone();
    walk_children(cursor, "<process>", ctx.policy, |tag, cursor| {
        update_denied(ctx, tag, cursor, &mut denied)
    })?;

    processes.insert(
        name.clone(),
        ProcessInfo {
            name,
            denied_permissions: denied.into_iter().collect(),
            gwp_asan_mode,
            memtag_mode,
            native_heap_zero_init,
        },
    );
    done()
}

fn parse_profileable(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    pkg.flags.profileable_by_shell |= attrs.bool("shell", false);
    pkg.flags.profileable &= attrs.bool("enabled", true);
    done()
}

/// Activity the platform launches for the package's details screen
fn app_details_activity(pkg: &PackageBuilder) -> ParseResult<Activity> {
    let package_name = pkg.package_name();
    let mut component = Component::new(APP_DETAILS_ACTIVITY_CLASS_NAME, package_name);
    component.exported = true;
    component.process_name = pkg.process_name.clone();
    Ok(Activity {
        component,
        theme: THEME_NO_DISPLAY,
        task_affinity: build_task_affinity_name(package_name, Some(package_name), Some(":app_details"))?,
        hardware_accelerated: pkg.flags.hardware_accelerated,
        resize_mode: ResizeMode::ForceResizeable,
        screen_orientation: -1,
        exclude_from_recents: true,
        ..Activity::default()
    })
}

fn accepted_ratio(ratio: f32) -> Option<f32> {
    // Below 1.0 is invalid and 0 means unset
    (ratio >= 1.0).then_some(ratio)
}

fn set_max_aspect_ratio(pkg: &mut PackageBuilder) {
    let mut max = if pkg.target_sdk_version < O {
        DEFAULT_PRE_O_MAX_ASPECT_RATIO
    } else {
        0.0
    };
    match pkg.max_aspect_ratio {
        Some(ratio) if ratio != 0.0 => max = ratio,
        _ => {
            if let Some(ratio) = pkg
                .meta_data
                .get(METADATA_MAX_ASPECT_RATIO)
                .and_then(|v| v.as_float())
            {
                max = ratio;
            }
        }
    }

    for activity in &mut pkg.activities {
        if activity.max_aspect_ratio.is_some() {
            continue;
        }
        let ratio = activity
            .component
            .meta_data
            .get(METADATA_MAX_ASPECT_RATIO)
            .and_then(|v| v.as_float())
            .unwrap_or(max);
        activity.max_aspect_ratio = accepted_ratio(ratio);
    }
}

fn set_min_aspect_ratio(pkg: &mut PackageBuilder, callback: &dyn ParsingCallback) {
    let min = match pkg.min_aspect_ratio {
        Some(ratio) if ratio != 0.0 => ratio,
        _ if pkg.target_sdk_version >= Q => 0.0,
        _ if callback.has_feature(FEATURE_WATCH) => DEFAULT_PRE_Q_MIN_ASPECT_RATIO_WATCH,
        _ => DEFAULT_PRE_Q_MIN_ASPECT_RATIO,
    };
    for activity in &mut pkg.activities {
        if activity.min_aspect_ratio.is_none() {
            activity.min_aspect_ratio = accepted_ratio(min);
        }
    }
}

fn set_supports_size_changes(pkg: &mut PackageBuilder) {
    let app = pkg
        .meta_data
        .get(METADATA_SUPPORTS_SIZE_CHANGES)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    pkg.supports_size_changes = app;
    for activity in &mut pkg.activities {
        let own = activity
            .component
            .meta_data
            .get(METADATA_SUPPORTS_SIZE_CHANGES)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if app || own {
            activity.supports_size_changes = true;
        }
    }
}

/// Any web `VIEW` filter among the activities
fn has_domain_urls(pkg: &PackageBuilder) -> bool {
    pkg.activities
        .iter()
        .flat_map(|a| a.component.intents.iter())
        .any(|f| {
            f.has_action(ACTION_VIEW)
                && f.has_action(ACTION_DEFAULT)
                && (f.has_scheme("http") || f.has_scheme("https"))
        })
}
