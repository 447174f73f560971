//! Activities, receivers, services, providers and their shared children
//!
//! Component handlers read the package built so far (for inherited process,
//! permission and affinity defaults) but never mutate it; the caller
//! registers the returned component. That keeps aliases able to look up
//! their target among the activities already parsed.

use super::names::{build_class_name, build_process_name, build_task_affinity_name};
use super::walker::{ignore, walk_children};
use super::Ctx;
use crate::archive::ResourceValue;
use crate::config::version_codes::{FROYO, JELLY_BEAN_MR1};
use crate::document::{Attrs, TypedValue, XmlCursor};
use crate::model::{
    Activity, Component, Instrumentation, IntentFilter, MetaData, MetaValue, PackageBuilder,
    Provider, ResizeMode, Service,
};
use crate::result::{done, skipped, DeferredKind, ParseError, ParseInput, ParseResult, Step};
use tracing::warn;

/// Synthesized activity backing the platform's app-details screen
pub const APP_DETAILS_ACTIVITY_CLASS_NAME: &str = "android.app.AppDetailsActivity";

const LAUNCH_MODES: &[(&str, i32)] = &[
    ("standard", 0),
    ("singleTop", 1),
    ("singleTask", 2),
    ("singleInstance", 3),
    ("singleInstancePerTask", 4),
];

const DOCUMENT_LAUNCH_MODES: &[(&str, i32)] =
    &[("none", 0), ("intoExisting", 1), ("always", 2), ("never", 3)];

const PERSISTABLE_MODES: &[(&str, i32)] = &[
    ("persistRootOnly", 0),
    ("persistNever", 1),
    ("persistAcrossReboots", 2),
];

const COLOR_MODES: &[(&str, i32)] = &[("default", 0), ("wideColorGamut", 1), ("hdr", 2)];

const SCREEN_ORIENTATIONS: &[(&str, i32)] = &[
    ("unspecified", -1),
    ("landscape", 0),
    ("portrait", 1),
    ("user", 2),
    ("behind", 3),
    ("sensor", 4),
    ("nosensor", 5),
    ("sensorLandscape", 6),
    ("sensorPortrait", 7),
    ("reverseLandscape", 8),
    ("reversePortrait", 9),
    ("fullSensor", 10),
    ("userLandscape", 11),
    ("userPortrait", 12),
    ("fullUser", 13),
    ("locked", 14),
];

const CONFIG_CHANGES: &[(&str, i32)] = &[
    ("mcc", 0x0001),
    ("mnc", 0x0002),
    ("locale", 0x0004),
    ("touchscreen", 0x0008),
    ("keyboard", 0x0010),
    ("keyboardHidden", 0x0020),
    ("navigation", 0x0040),
    ("orientation", 0x0080),
    ("screenLayout", 0x0100),
    ("uiMode", 0x0200),
    ("screenSize", 0x0400),
    ("smallestScreenSize", 0x0800),
    ("density", 0x1000),
    ("layoutDirection", 0x2000),
    ("colorMode", 0x4000),
    ("grammaticalGender", 0x8000),
    ("fontWeightAdjustment", 0x1000_0000),
    ("fontScale", 0x4000_0000),
];

const SOFT_INPUT_MODES: &[(&str, i32)] = &[
    ("stateUnspecified", 0x00),
    ("stateUnchanged", 0x01),
    ("stateHidden", 0x02),
    ("stateAlwaysHidden", 0x03),
    ("stateVisible", 0x04),
    ("stateAlwaysVisible", 0x05),
    ("adjustUnspecified", 0x00),
    ("adjustResize", 0x10),
    ("adjustPan", 0x20),
    ("adjustNothing", 0x30),
];

const FOREGROUND_SERVICE_TYPES: &[(&str, i32)] = &[
    ("dataSync", 0x001),
    ("mediaPlayback", 0x002),
    ("phoneCall", 0x004),
    ("location", 0x008),
    ("connectedDevice", 0x010),
    ("mediaProjection", 0x020),
    ("camera", 0x040),
    ("microphone", 0x080),
    ("health", 0x100),
    ("remoteMessaging", 0x200),
    ("systemExempted", 0x400),
    ("shortService", 0x800),
    ("specialUse", 0x4000_0000),
];

/// Label as either a resource id or a literal string
pub(super) fn label(attrs: &Attrs<'_>) -> (Option<String>, u32) {
    match attrs.peek("label") {
        Some(TypedValue::Reference(id)) => (None, id),
        None | Some(TypedValue::Null) => (None, 0),
        Some(_) => (attrs.raw("label").map(str::to_string), 0),
    }
}

/// Required, package-qualified `android:name` of a component-like tag
pub(super) fn component_name(package: &str, attrs: &Attrs<'_>, tag: &str) -> ParseResult<String> {
    let name = attrs
        .non_config_string("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ParseError::malformed(format!("{} does not specify android:name", tag)))?;
    let class_name = build_class_name(package, &name)?;
    if class_name == APP_DETAILS_ACTIVITY_CLASS_NAME {
        return Err(ParseError::malformed(format!("{} invalid android:name", tag)));
    }
    Ok(class_name)
}

fn parse_component(pkg: &PackageBuilder, attrs: &Attrs<'_>, tag: &str) -> ParseResult<Component> {
    let name = component_name(pkg.package_name(), attrs, tag)?;
    let mut component = Component::new(name, pkg.package_name());
    let (label, label_res) = label(attrs);
    component.label = label;
    component.label_res = label_res;
    component.icon = attrs.resource_id("icon");
    component.round_icon = attrs.resource_id("roundIcon");
    component.banner = attrs.resource_id("banner");
    component.logo = attrs.resource_id("logo");
    component.description = attrs.resource_id("description");
    Ok(component)
}

/// Fields shared by activities, receivers, services and providers
fn parse_main_component(
    ctx: &Ctx<'_, '_>,
    pkg: &PackageBuilder,
    attrs: &Attrs<'_>,
    tag: &str,
) -> ParseResult<Component> {
    let mut component = parse_component(pkg, attrs, tag)?;
    component.enabled = attrs.bool("enabled", true);
    component.direct_boot_aware = attrs.bool("directBootAware", false);
    component.split_name = attrs.non_config_string("splitName");
    component.exported = attrs.bool("exported", false);
    component.permission = attrs
        .non_config_string("permission")
        .or_else(|| pkg.permission.clone());

    let process = if pkg.target_sdk_version >= FROYO {
        attrs.non_config_string("process")
    } else {
        attrs.non_resource_string("process").map(str::to_string)
    };
    component.process_name = build_process_name(
        pkg.package_name(),
        pkg.process_name.as_deref(),
        process.as_deref(),
        ctx.ignore_processes(),
        ctx.platform,
    )?;
    Ok(component)
}

/// Default `exported` from the presence of intent filters
///
/// Filters without an explicit value are an error once the package targets S.
fn resolve_exported(input: &mut ParseInput, component: &mut Component, explicit: bool) -> ParseResult<()> {
    if explicit {
        return Ok(());
    }
    let has_filters = !component.intents.is_empty();
    if has_filters {
        input.defer_error(
            DeferredKind::MissingExportedFlag,
            format!(
                "{}: Targeting S+ (version 31 and above) requires that an explicit value for \
                 android:exported be defined when intent filters are present",
                component.name
            ),
        )?;
    }
    component.exported = has_filters;
    Ok(())
}

/// Children every component accepts
fn component_child<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    component: &mut Component,
    parent: &str,
    tag: &str,
    cursor: &mut XmlCursor<'d>,
) -> Option<Step> {
    match tag {
        "intent-filter" => Some(add_intent_filter(ctx, input, component, parent, cursor)),
        "meta-data" => Some(add_meta(ctx, &mut component.meta_data, cursor, "<meta-data>")),
        "property" => Some(add_meta(ctx, &mut component.properties, cursor, "<property>")),
        _ => None,
    }
}

fn add_intent_filter<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    component: &mut Component,
    parent: &str,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let position = cursor.position_description();
    let filter = parse_intent_filter(ctx, input, cursor)?;
    if filter.actions.is_empty() {
        warn!("No actions in {} intent-filter at {}", parent, position);
        return skipped("intent-filter without actions");
    }
    component.order = component.order.max(filter.order);
    component.intents.push(filter);
    done()
}

/// Parse `<intent-filter>` (or a `<queries>` `<intent>`) at the cursor
pub(super) fn parse_intent_filter<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<IntentFilter> {
    let attrs = ctx.attrs(cursor);
    let mut filter = IntentFilter {
        priority: attrs.int("priority", 0),
        order: attrs.int("order", 0),
        auto_verify: attrs.bool("autoVerify", false),
        label_res: attrs.resource_id("label"),
        icon: attrs.resource_id("icon"),
        ..IntentFilter::default()
    };

    walk_children(cursor, "<intent-filter>", ctx.policy, |tag, cursor| match tag {
        "action" => Some(add_filter_name(input, &mut filter.actions, ctx.attrs(cursor).raw("name"))),
        "category" => Some(add_filter_name(
            input,
            &mut filter.categories,
            ctx.attrs(cursor).raw("name"),
        )),
        "data" => Some(parse_data(&ctx.attrs(cursor), &mut filter)),
        _ => None,
    })?;
    Ok(filter)
}

fn add_filter_name(input: &mut ParseInput, list: &mut Vec<String>, name: Option<&str>) -> Step {
    match name {
        None => Err(ParseError::malformed("No value supplied for <android:name>")),
        Some("") => {
            list.push(String::new());
            input.defer_error(
                DeferredKind::EmptyIntentActionCategory,
                "No value supplied for <android:name>",
            )?;
            done()
        }
        Some(name) => {
            list.push(name.to_string());
            done()
        }
    }
}

fn parse_data(attrs: &Attrs<'_>, filter: &mut IntentFilter) -> Step {
    if let Some(scheme) = attrs.non_config_string("scheme") {
        filter.schemes.push(scheme);
    }
    if let Some(host) = attrs.non_config_string("host") {
        filter.hosts.push(host);
    }
    for attr in ["path", "pathPrefix", "pathPattern", "pathAdvancedPattern", "pathSuffix"] {
        if let Some(path) = attrs.non_config_string(attr) {
            filter.paths.push(path);
        }
    }
    if let Some(mime_type) = attrs.non_config_string("mimeType") {
        let valid = match mime_type.find('/') {
            Some(slash) => slash > 0 && mime_type.len() >= slash + 2,
            None => false,
        };
        if !valid {
            return Err(ParseError::malformed(format!("Bad mimeType {}", mime_type)));
        }
        filter.mime_types.push(mime_type);
    }
    if let Some(group) = attrs.non_config_string("mimeGroup") {
        filter.mime_groups.push(group);
    }
    done()
}

/// Parse `<meta-data>` or `<property>` into a name and typed value
pub(super) fn parse_meta_data(
    ctx: &Ctx<'_, '_>,
    cursor: &XmlCursor<'_>,
    tag: &str,
) -> ParseResult<(String, MetaValue)> {
    let attrs = Attrs::of(cursor, ctx.res);
    let name = attrs
        .non_config_string("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ParseError::malformed(format!("{} requires an android:name attribute", tag)))?;

    let resource = attrs.resource_id("resource");
    if resource != 0 {
        return Ok((name, MetaValue::Resource(resource)));
    }

    let value = match attrs.peek("value") {
        None => {
            return Err(ParseError::malformed(format!(
                "{} requires an android:value or android:resource attribute",
                tag
            )))
        }
        Some(TypedValue::Bool(b)) => MetaValue::Bool(b),
        Some(TypedValue::Int(i)) => MetaValue::Int(i),
        Some(TypedValue::Float(f)) => MetaValue::Float(f),
        Some(TypedValue::Reference(id)) => match ctx.res.value(id) {
            Some(ResourceValue::String(s)) => MetaValue::String(s.clone()),
            Some(ResourceValue::Int(i)) => MetaValue::Int(*i),
            Some(ResourceValue::Float(f)) => MetaValue::Float(*f),
            Some(ResourceValue::Bool(b)) => MetaValue::Bool(*b),
            None => MetaValue::Resource(id),
        },
        Some(TypedValue::String(_)) | Some(TypedValue::Null) => {
            MetaValue::String(attrs.raw("value").unwrap_or_default().to_string())
        }
    };
    Ok((name, value))
}

pub(super) fn add_meta(ctx: &Ctx<'_, '_>, map: &mut MetaData, cursor: &XmlCursor<'_>, tag: &str) -> Step {
    let (name, value) = parse_meta_data(ctx, cursor, tag)?;
    map.insert(name, value);
    done()
}

fn resize_mode(pkg: &PackageBuilder, attrs: &Attrs<'_>) -> ResizeMode {
    if attrs.has_value_or_empty("resizeableActivity") || pkg.resizeable_activity.is_some() {
        let default = pkg.resizeable_activity.unwrap_or(false);
        return if attrs.bool("resizeableActivity", default) {
            ResizeMode::Resizeable
        } else {
            ResizeMode::Unresizeable
        };
    }
    if pkg.resizeable_activity_via_sdk_version {
        ResizeMode::ResizeableViaSdkVersion
    } else {
        ResizeMode::ForceResizeable
    }
}

/// `<activity>` or `<receiver>`
pub(super) fn parse_activity<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &PackageBuilder,
    cursor: &mut XmlCursor<'d>,
    is_receiver: bool,
) -> ParseResult<Activity> {
    let tag = if is_receiver { "<receiver>" } else { "<activity>" };
    let attrs = ctx.attrs(cursor);
    let component = parse_main_component(ctx, pkg, &attrs, tag)?;
    let explicit_exported = attrs.has_value_or_empty("exported");

    let mut activity = Activity {
        component,
        theme: attrs.resource_id("theme"),
        launch_mode: attrs.enum_int("launchMode", LAUNCH_MODES, 0),
        document_launch_mode: attrs.enum_int("documentLaunchMode", DOCUMENT_LAUNCH_MODES, 0),
        persistable_mode: attrs.enum_int("persistableMode", PERSISTABLE_MODES, 0),
        color_mode: attrs.enum_int("colorMode", COLOR_MODES, 0),
        screen_orientation: attrs.enum_int("screenOrientation", SCREEN_ORIENTATIONS, -1),
        config_changes: attrs.flags_int("configChanges", CONFIG_CHANGES, 0),
        soft_input_mode: attrs.flags_int("windowSoftInputMode", SOFT_INPUT_MODES, 0),
        task_affinity: build_task_affinity_name(
            pkg.package_name(),
            pkg.task_affinity.as_deref(),
            attrs.non_config_string("taskAffinity").as_deref(),
        )?,
        multiprocess: attrs.bool("multiprocess", false),
        exclude_from_recents: attrs.bool("excludeFromRecents", false),
        no_history: attrs.bool("noHistory", false),
        allow_task_reparenting: attrs.bool("allowTaskReparenting", pkg.flags.allow_task_reparenting),
        ..Activity::default()
    };

    if !is_receiver {
        activity.hardware_accelerated = attrs.bool("hardwareAccelerated", pkg.flags.hardware_accelerated);
        activity.supports_picture_in_picture = attrs.bool("supportsPictureInPicture", false);
        activity.resize_mode = resize_mode(pkg, &attrs);
        if attrs.has_value("maxAspectRatio") {
            activity.max_aspect_ratio = Some(attrs.float("maxAspectRatio", 0.0));
        }
        if attrs.has_value("minAspectRatio") {
            activity.min_aspect_ratio = Some(attrs.float("minAspectRatio", 0.0));
        }
    }

    walk_children(cursor, tag, ctx.policy, |child, cursor| match child {
        "layout" if !is_receiver => ignore(cursor),
        _ => component_child(ctx, input, &mut activity.component, tag, child, cursor),
    })?;

    resolve_exported(input, &mut activity.component, explicit_exported)?;
    Ok(activity)
}

/// `<activity-alias>`; the target must already be among the parsed activities
pub(super) fn parse_activity_alias<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<Activity> {
    const TAG: &str = "<activity-alias>";
    let attrs = ctx.attrs(cursor);
    let target = attrs
        .non_config_string("targetActivity")
        .ok_or_else(|| ParseError::malformed("<activity-alias> does not specify android:targetActivity"))?;
    let target_name = build_class_name(pkg.package_name(), &target)?;

    let Some(target) = pkg.activities.iter().find(|a| a.name() == target_name) else {
        let names: Vec<&str> = pkg.activities.iter().map(Activity::name).collect();
        return Err(ParseError::malformed(format!(
            "<activity-alias> target activity {} not found in manifest with activities = [{}]",
            target_name,
            names.join(", ")
        )));
    };

    let mut component = parse_component(pkg, &attrs, TAG)?;
    component.enabled = attrs.bool("enabled", true);
    component.exported = attrs.bool("exported", false);
    component.permission = attrs
        .non_config_string("permission")
        .or_else(|| target.component.permission.clone());
    component.process_name = target.component.process_name.clone();
    component.direct_boot_aware = target.component.direct_boot_aware;
    component.split_name = target.component.split_name.clone();
    let explicit_exported = attrs.has_value_or_empty("exported");

    let mut alias = Activity {
        component,
        target_activity: Some(target_name.clone()),
        ..target.clone()
    };

    walk_children(cursor, TAG, ctx.policy, |child, cursor| {
        component_child(ctx, input, &mut alias.component, TAG, child, cursor)
    })?;

    resolve_exported(input, &mut alias.component, explicit_exported)?;
    Ok(alias)
}

pub(super) fn parse_service<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<Service> {
    const TAG: &str = "<service>";
    let attrs = ctx.attrs(cursor);
    let component = parse_main_component(ctx, pkg, &attrs, TAG)?;
    let explicit_exported = attrs.has_value_or_empty("exported");

    let mut service = Service {
        component,
        foreground_service_type: attrs.flags_int("foregroundServiceType", FOREGROUND_SERVICE_TYPES, 0),
        isolated: attrs.bool("isolatedProcess", false),
        external: attrs.bool("externalService", false),
        stop_with_task: attrs.bool("stopWithTask", false),
    };

    walk_children(cursor, TAG, ctx.policy, |child, cursor| {
        component_child(ctx, input, &mut service.component, TAG, child, cursor)
    })?;

    resolve_exported(input, &mut service.component, explicit_exported)?;
    Ok(service)
}

pub(super) fn parse_provider<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<Provider> {
    const TAG: &str = "<provider>";
    let attrs = ctx.attrs(cursor);
    let mut component = parse_main_component(ctx, pkg, &attrs, TAG)?;
    // Providers were exported by default before JB MR1
    component.exported = attrs.bool("exported", pkg.target_sdk_version < JELLY_BEAN_MR1);

    let authority = attrs
        .non_config_string("authorities")
        .ok_or_else(|| ParseError::malformed("<provider> does not include authorities attribute"))?;
    let read_permission = attrs
        .non_config_string("readPermission")
        .or_else(|| component.permission.clone());
    let write_permission = attrs
        .non_config_string("writePermission")
        .or_else(|| component.permission.clone());

    let mut provider = Provider {
        component,
        authority,
        syncable: attrs.bool("syncable", false),
        read_permission,
        write_permission,
        grant_uri_permissions: attrs.bool("grantUriPermissions", false),
        multiprocess: attrs.bool("multiprocess", false),
        init_order: attrs.int("initOrder", 0),
    };

    walk_children(cursor, TAG, ctx.policy, |child, cursor| match child {
        "grant-uri-permission" => {
            provider.grant_uri_permissions = true;
            ignore(cursor)
        }
        "path-permission" => ignore(cursor),
        _ => component_child(ctx, input, &mut provider.component, TAG, child, cursor),
    })?;
    Ok(provider)
}

pub(super) fn parse_instrumentation<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    const TAG: &str = "<instrumentation>";
    let attrs = ctx.attrs(cursor);
    let component = parse_component(pkg, &attrs, TAG)?;
    let mut instrumentation = Instrumentation {
        component,
        target_package: attrs.non_resource_string("targetPackage").unwrap_or_default().to_string(),
        target_processes: attrs.non_resource_string("targetProcesses").map(str::to_string),
        handle_profiling: attrs.bool("handleProfiling", false),
        functional_test: attrs.bool("functionalTest", false),
    };

    walk_children(cursor, TAG, ctx.policy, |child, cursor| match child {
        "meta-data" => Some(add_meta(ctx, &mut instrumentation.component.meta_data, cursor, "<meta-data>")),
        _ => None,
    })?;
    pkg.instrumentations.push(instrumentation);
    done()
}

/// Which component kinds declared a non-zero `order`
#[derive(Debug, Default)]
pub(super) struct ComponentOrders {
    activities: bool,
    receivers: bool,
    services: bool,
    providers: bool,
}

impl ComponentOrders {
    /// Stable descending sort of every kind that used `order`
    pub fn sort(&self, pkg: &mut PackageBuilder) {
        if self.activities {
            pkg.activities.sort_by(|a, b| b.component.order.cmp(&a.component.order));
        }
        if self.receivers {
            pkg.receivers.sort_by(|a, b| b.component.order.cmp(&a.component.order));
        }
        if self.services {
            pkg.services.sort_by(|a, b| b.component.order.cmp(&a.component.order));
        }
        if self.providers {
            pkg.providers.sort_by(|a, b| b.component.order.cmp(&a.component.order));
        }
    }
}

fn register(pkg: &mut PackageBuilder, component: &mut Component, split_name: Option<&str>) {
    if component.split_name.is_none() {
        component.split_name = split_name.map(str::to_string);
    }
    if component.direct_boot_aware {
        pkg.flags.partially_direct_boot_aware = true;
    }
    for filter in &component.intents {
        pkg.mime_groups.extend(filter.mime_groups.iter().cloned());
    }
}

/// Parse a component tag under `<application>` and add it to the package
///
/// Components of a split without their own `splitName` belong to that split.
pub(super) fn add_main_component<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
    tag: &str,
    split_name: Option<&str>,
    orders: &mut ComponentOrders,
) -> Step {
    match tag {
        "activity" | "activity-alias" => {
            let mut activity = if tag == "activity" {
                parse_activity(ctx, input, pkg, cursor, false)?
            } else {
                parse_activity_alias(ctx, input, pkg, cursor)?
            };
            register(pkg, &mut activity.component, split_name);
            orders.activities |= activity.component.order != 0;
            pkg.activities.push(activity);
        }
        "receiver" => {
            let mut receiver = parse_activity(ctx, input, pkg, cursor, true)?;
            register(pkg, &mut receiver.component, split_name);
            orders.receivers |= receiver.component.order != 0;
            pkg.receivers.push(receiver);
        }
        "service" => {
            let mut service = parse_service(ctx, input, pkg, cursor)?;
            register(pkg, &mut service.component, split_name);
            orders.services |= service.component.order != 0;
            pkg.services.push(service);
        }
        "provider" => {
            let mut provider = parse_provider(ctx, input, pkg, cursor)?;
            register(pkg, &mut provider.component, split_name);
            orders.providers |= provider.component.order != 0;
            pkg.providers.push(provider);
        }
        _ => return skipped(format!("{} is not a component", tag)),
    }
    done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::config::Platform;
    use crate::document::XmlDocument;
    use crate::parser::{ParseFlags, UnknownTagPolicy};
    use std::path::Path;

    const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

    struct Fixture {
        archive: MemoryArchive,
        platform: Platform,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                archive: MemoryArchive::new("/t.apk"),
                platform: Platform::default(),
            }
        }

        fn ctx(&self) -> Ctx<'_, '_> {
            Ctx {
                res: &self.archive,
                platform: &self.platform,
                callback: &self.platform,
                policy: UnknownTagPolicy::Lenient,
                flags: ParseFlags::empty(),
            }
        }
    }

    fn pkg(target: i32) -> PackageBuilder {
        let mut pkg = PackageBuilder::new("com.example", Path::new("/t.apk"), Path::new("/t.apk"));
        pkg.target_sdk_version = target;
        pkg.process_name = Some("com.example".into());
        pkg
    }

    fn with_component<T>(
        xml: &str,
        input: &mut ParseInput,
        f: impl for<'d> FnOnce(&Ctx<'d, 'd>, &mut ParseInput, &mut XmlCursor<'d>) -> T,
    ) -> T {
        let fixture = Fixture::new();
        let doc = XmlDocument::parse(xml).unwrap();
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        f(&fixture.ctx(), input, &mut cursor)
    }

    #[test]
    fn test_activity_defaults_and_filters() {
        let pkg = pkg(30);
        let mut input = ParseInput::new();
        input.enable_deferred_errors(30).unwrap();
        let xml = format!(
            r#"<activity {NS} android:name=".Main" android:launchMode="singleTop">
                <intent-filter android:order="3">
                    <action android:name="android.intent.action.MAIN"/>
                    <category android:name="android.intent.category.LAUNCHER"/>
                </intent-filter>
                <intent-filter><category android:name="x"/></intent-filter>
                <meta-data android:name="k" android:value="42"/>
            </activity>"#
        );
        let activity = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_activity(ctx, input, &pkg, cursor, false)
        })
        .unwrap();

        assert_eq!(activity.name(), "com.example.Main");
        assert_eq!(activity.launch_mode, 1);
        assert_eq!(activity.component.process_name.as_deref(), Some("com.example"));
        // The filter without actions is dropped
        assert_eq!(activity.component.intents.len(), 1);
        assert_eq!(activity.component.order, 3);
        // Exported defaults to having filters
        assert!(activity.component.exported);
        assert_eq!(activity.component.meta_data.get("k"), Some(&MetaValue::Int(42)));
        assert_eq!(activity.resize_mode, ResizeMode::ForceResizeable);
    }

    #[test]
    fn test_missing_exported_is_fatal_for_s() {
        let pkg = pkg(31);
        let mut input = ParseInput::new();
        input.enable_deferred_errors(31).unwrap();
        let xml = format!(
            r#"<service {NS} android:name=".Sync">
                <intent-filter><action android:name="a.b.SYNC"/></intent-filter>
            </service>"#
        );
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_service(ctx, input, &pkg, cursor)
        })
        .unwrap_err();
        assert!(err.message().starts_with("com.example.Sync: Targeting S+"));
    }

    #[test]
    fn test_component_name_rules() {
        let pkg = pkg(30);
        let mut input = ParseInput::new();
        let xml = format!(r#"<receiver {NS} android:exported="false"/>"#);
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_activity(ctx, input, &pkg, cursor, true)
        })
        .unwrap_err();
        assert_eq!(err.message(), "<receiver> does not specify android:name");

        let xml = format!(r#"<activity {NS} android:name="android.app.AppDetailsActivity"/>"#);
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_activity(ctx, input, &pkg, cursor, false)
        })
        .unwrap_err();
        assert_eq!(err.message(), "<activity> invalid android:name");
    }

    #[test]
    fn test_provider_requires_authorities() {
        let pkg = pkg(16);
        let mut input = ParseInput::new();
        let xml = format!(r#"<provider {NS} android:name=".P" android:authorities="a;b" android:permission="p"/>"#);
        let provider = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_provider(ctx, input, &pkg, cursor)
        })
        .unwrap();
        assert!(provider.component.exported);
        assert_eq!(provider.read_permission.as_deref(), Some("p"));
        assert_eq!(provider.write_permission.as_deref(), Some("p"));

        let xml = format!(r#"<provider {NS} android:name=".P"/>"#);
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_provider(ctx, input, &pkg, cursor)
        })
        .unwrap_err();
        assert_eq!(err.message(), "<provider> does not include authorities attribute");
    }

    #[test]
    fn test_alias_copies_target() {
        let mut pkg = pkg(30);
        let mut target = Activity {
            component: Component::new("com.example.Main", "com.example"),
            theme: 7,
            ..Activity::default()
        };
        target.component.permission = Some("perm".into());
        pkg.activities.push(target);

        let mut input = ParseInput::new();
        let xml = format!(
            r#"<activity-alias {NS} android:name=".Alias" android:targetActivity=".Main" android:exported="true"/>"#
        );
        let alias = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_activity_alias(ctx, input, &pkg, cursor)
        })
        .unwrap();
        assert_eq!(alias.name(), "com.example.Alias");
        assert_eq!(alias.target_activity.as_deref(), Some("com.example.Main"));
        assert_eq!(alias.theme, 7);
        assert_eq!(alias.component.permission.as_deref(), Some("perm"));

        let xml = format!(r#"<activity-alias {NS} android:name=".A" android:targetActivity=".Gone"/>"#);
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_activity_alias(ctx, input, &pkg, cursor)
        })
        .unwrap_err();
        assert_eq!(
            err.message(),
            "<activity-alias> target activity com.example.Gone not found in manifest with activities = [com.example.Main]"
        );
    }

    #[test]
    fn test_meta_data_values() {
        let fixture = Fixture::new();
        let read = |xml: &str| {
            let doc = XmlDocument::parse(xml).unwrap();
            let mut cursor = doc.cursor();
            cursor.next_start_tag();
            parse_meta_data(&fixture.ctx(), &cursor, "<meta-data>")
        };
        assert_eq!(
            read(&format!(r#"<meta-data {NS} android:name="a" android:value="2.5"/>"#)).unwrap().1,
            MetaValue::Float(2.5)
        );
        assert_eq!(
            read(&format!(r#"<meta-data {NS} android:name="a" android:value="text"/>"#)).unwrap().1,
            MetaValue::String("text".into())
        );
        assert_eq!(
            read(&format!(r#"<meta-data {NS} android:name="a"/>"#)).unwrap_err().message(),
            "<meta-data> requires an android:value or android:resource attribute"
        );
        assert_eq!(
            read(&format!(r#"<meta-data {NS} android:value="1"/>"#)).unwrap_err().message(),
            "<meta-data> requires an android:name attribute"
        );
    }

    #[test]
    fn test_bad_mime_type() {
        let mut input = ParseInput::new();
        let xml = format!(
            r#"<intent-filter {NS}><action android:name="a"/><data android:mimeType="image"/></intent-filter>"#
        );
        let err = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_intent_filter(ctx, input, cursor)
        })
        .unwrap_err();
        assert_eq!(err.message(), "Bad mimeType image");
    }

    #[test]
    fn test_empty_action_is_deferred() {
        let mut input = ParseInput::new();
        let xml = format!(r#"<intent-filter {NS}><action android:name=""/></intent-filter>"#);
        let filter = with_component(&xml, &mut input, |ctx, input, cursor| {
            parse_intent_filter(ctx, input, cursor)
        })
        .unwrap();
        assert_eq!(filter.actions, vec![String::new()]);
        assert!(input.enable_deferred_errors(30).is_err());
    }
}
