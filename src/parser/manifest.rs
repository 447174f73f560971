//! `<manifest>` of the base file
//!
//! Reads the root attributes, dispatches the direct children, then applies
//! the whole-package checks and compatibility shims that need every child
//! to have been seen.

use super::names::{parse_package_split_names, validate_name};
use super::sdk::{parse_uses_sdk, DEFAULT_TARGET_SDK_VERSION};
use super::walker::{ignore, walk_children, UnknownTagPolicy};
use super::{application, components, key_sets, permissions, queries, Ctx, ParseFlags};
use crate::config::version_codes::DONUT;
use crate::document::{Attrs, Token, XmlCursor};
use crate::model::{
    ConfigurationInfo, FeatureGroup, FeatureInfo, Overlay, PackageBuilder, ResizeMode, SupportsScreens,
    INSTALL_LOCATION_UNSPECIFIED,
};
use crate::result::{done, skipped, DeferredKind, ErrorCode, ParseError, ParseInput, ParseResult, Step};
use std::path::Path;
use tracing::{info, warn};

pub const INSTALL_LOCATIONS: &[(&str, i32)] = &[
    ("auto", 0),
    ("internalOnly", 1),
    ("preferExternal", 2),
];

const TOUCHSCREENS: &[(&str, i32)] = &[("undefined", 0), ("notouch", 1), ("stylus", 2), ("finger", 3)];
const KEYBOARD_TYPES: &[(&str, i32)] = &[("undefined", 0), ("nokeys", 1), ("qwerty", 2), ("twelvekey", 3)];
const NAVIGATIONS: &[(&str, i32)] = &[
    ("undefined", 0),
    ("nonav", 1),
    ("dpad", 2),
    ("trackball", 3),
    ("wheel", 4),
];

pub const MAX_OVERLAY_PRIORITY: i32 = 9999;

/// Parse the manifest of a base file into a new builder
pub(super) fn parse_base<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    path: &Path,
    code_path: &Path,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<PackageBuilder> {
    if cursor.next_start_tag() == Token::EndDocument {
        return Err(ParseError::new(ErrorCode::ManifestEmpty, "No start tag found"));
    }
    let (package_name, split) = parse_package_split_names(cursor)?;
    if let Some(split) = split {
        return Err(ParseError::new(
            ErrorCode::BadPackageName,
            format!("Expected base APK, but found split {}", split),
        ));
    }

    let attrs = ctx.attrs(cursor);
    let core_app = attrs.unqualified("coreApp") == Some("true");
    let mut pkg = ctx
        .callback
        .start_package(&package_name, path, code_path, attrs.all(), core_app);
    parse_manifest_attributes(ctx, &mut pkg, &attrs)?;
    parse_base_tags(ctx, input, &mut pkg, cursor)?;
    Ok(pkg)
}

fn parse_manifest_attributes(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, attrs: &Attrs<'_>) -> ParseResult<()> {
    pkg.version_code = attrs.int("versionCode", 0);
    pkg.version_code_major = attrs.int("versionCodeMajor", 0);
    pkg.base_revision_code = attrs.int("revisionCode", 0);
    pkg.version_name = attrs.non_config_string("versionName");
    pkg.install_location =
        attrs.enum_int("installLocation", INSTALL_LOCATIONS, INSTALL_LOCATION_UNSPECIFIED);
    pkg.compile_sdk_version = attrs.int("compileSdkVersion", 0);
    pkg.compile_sdk_version_codename = attrs.non_config_string("compileSdkVersionCodename");
    pkg.isolated_split_loading = attrs.bool("isolatedSplits", false);
    pkg.split_required = attrs.bool("isSplitRequired", false);
    pkg.flags.external_storage = ctx.flags.contains(ParseFlags::EXTERNAL_STORAGE);

    if let Some(id) = attrs.non_config_string("sharedUserId").filter(|id| !id.is_empty()) {
        if pkg.package_name() != "android" {
            validate_name(&id, true, true).map_err(|err| {
                ParseError::new(
                    ErrorCode::BadSharedUserId,
                    format!("<manifest> specifies bad sharedUserId name \"{}\": {}", id, err),
                )
            })?;
        }
        pkg.shared_user_id = Some(id);
        pkg.shared_user_label = attrs.resource_id("sharedUserLabel");
    }
    Ok(())
}

fn parse_base_tags<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<()> {
    let mut found_app = false;

    walk_children(cursor, "<manifest>", ctx.policy, |tag, cursor| match tag {
        "application" if found_app => Some(duplicate_application(ctx, cursor)),
        "application" => {
            found_app = true;
            Some(application::parse_base_application(ctx, input, pkg, cursor))
        }
        "overlay" => Some(parse_overlay(ctx, pkg, cursor)),
        "key-sets" => Some(key_sets::parse_key_sets(ctx, pkg, cursor)),
        "permission-group" => Some(permissions::parse_permission_group(ctx, pkg, cursor)),
        "permission" => Some(permissions::parse_permission(ctx, pkg, cursor)),
        "permission-tree" => Some(permissions::parse_permission_tree(ctx, pkg, cursor)),
        "uses-permission" | "uses-permission-sdk-m" | "uses-permission-sdk-23" => {
            Some(permissions::parse_uses_permission(ctx, pkg, cursor))
        }
        "uses-configuration" => Some(parse_uses_configuration(ctx, pkg, cursor)),
        "uses-feature" => Some(parse_uses_feature(ctx, pkg, cursor)),
        "feature-group" => Some(parse_feature_group(ctx, pkg, cursor)),
        "uses-sdk" => Some(parse_sdk(ctx, input, pkg, cursor)),
        "supports-screens" => Some(parse_supports_screens(ctx, pkg, cursor)),
        "protected-broadcast" => Some(parse_protected_broadcast(ctx, pkg, cursor)),
        "instrumentation" => Some(components::parse_instrumentation(ctx, pkg, cursor)),
        "original-package" => Some(parse_original_package(ctx, pkg, cursor)),
        "adopt-permissions" => Some(parse_adopt_permissions(ctx, pkg, cursor)),
        "restrict-update" => Some(parse_restrict_update(ctx, pkg, cursor)),
        "queries" => Some(queries::parse_queries(ctx, pkg, cursor)),
        "attribution" => Some(permissions::parse_attribution(ctx, pkg, cursor)),
        // Read by the locator, or not interpreted at all
        "uses-gl-texture" | "compatible-screens" | "supports-input" | "eat-comment" | "uses-package"
        | "uses-split" | "package-verifier" => ignore(cursor),
        _ => None,
    })?;

    if !found_app && pkg.instrumentations.is_empty() {
        input.defer_error(
            DeferredKind::MissingAppTag,
            "<manifest> does not contain an <application> or <instrumentation>",
        )?;
    }
    if !permissions::is_combination_valid(&pkg.attributions) {
        return Err(ParseError::new(
            ErrorCode::BadManifest,
            "Combination <attribution> tags are not valid",
        ));
    }
    if permissions::has_conflicting_duplicate(&pkg.permissions) {
        return Err(ParseError::malformed(
            "Found duplicate permission with a different attribute value.",
        ));
    }

    permissions::apply_compat_permissions(pkg);
    permissions::apply_split_permissions(pkg, ctx.platform);

    if pkg.target_sdk_version < DONUT && !pkg.screens.any_declared() {
        for activity in &mut pkg.activities {
            activity.resize_mode = ResizeMode::Unresizeable;
            activity.supports_picture_in_picture = false;
        }
    }

    input.finish(DEFAULT_TARGET_SDK_VERSION)
}

fn duplicate_application(ctx: &Ctx<'_, '_>, cursor: &mut XmlCursor<'_>) -> Step {
    const MESSAGE: &str = "<manifest> has more than one <application>";
    match ctx.policy {
        UnknownTagPolicy::Strict => Err(ParseError::malformed(MESSAGE)),
        UnknownTagPolicy::Lenient => {
            warn!("{} at {}", MESSAGE, cursor.position_description());
            cursor.skip_subtree();
            skipped(MESSAGE)
        }
    }
}

fn parse_sdk<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    let sdk = parse_uses_sdk(cursor, &attrs, ctx.res, ctx.platform, ctx.policy)?;
    pkg.min_sdk_version = sdk.min_sdk_version;
    pkg.target_sdk_version = sdk.target_sdk_version;
    pkg.min_extension_versions = sdk.min_extension_versions;
    input.enable_deferred_errors(pkg.target_sdk_version)?;
    done()
}

fn parse_overlay(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let Some(target_package) = attrs.non_config_string("targetPackage").filter(|t| !t.is_empty()) else {
        return Err(ParseError::malformed("<overlay> does not specify a target package"));
    };
    let priority = attrs.int("priority", 0);
    if !(0..=MAX_OVERLAY_PRIORITY).contains(&priority) {
        return Err(ParseError::malformed("<overlay> priority must be between 0 and 9999"));
    }

    let property_name = attrs.non_config_string("requiredSystemPropertyName");
    let property_value = attrs.non_config_string("requiredSystemPropertyValue");
    if !ctx
        .platform
        .check_required_system_properties(property_name.as_deref(), property_value.as_deref())
    {
        let message = format!(
            "Skipping target and overlay pair {} and {}: overlay ignored due to required system property: {} with value: {}",
            target_package,
            pkg.base_code_path().display(),
            property_name.as_deref().unwrap_or("null"),
            property_value.as_deref().unwrap_or("null")
        );
        info!("{}", message);
        return skipped(message);
    }

    pkg.overlay = Some(Overlay {
        target_package,
        target_name: attrs.non_config_string("targetName"),
        category: attrs.non_config_string("category"),
        priority,
        is_static: attrs.bool("isStatic", false),
    });
    done()
}

fn parse_uses_configuration(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    pkg.config_preferences.push(ConfigurationInfo {
        touchscreen: attrs.enum_int("reqTouchScreen", TOUCHSCREENS, 0),
        keyboard_type: attrs.enum_int("reqKeyboardType", KEYBOARD_TYPES, 0),
        navigation: attrs.enum_int("reqNavigation", NAVIGATIONS, 0),
        req_gl_es_version: 0,
        hard_keyboard: attrs.bool("reqHardKeyboard", false),
        five_way_nav: attrs.bool("reqFiveWayNav", false),
    });
    done()
}

/// Named feature, or the unnamed OpenGL ES requirement
fn feature_info(attrs: &Attrs<'_>) -> FeatureInfo {
    let name = attrs.non_config_string("name");
    let gl_es_version = if name.is_none() {
        attrs.int("glEsVersion", 0)
    } else {
        0
    };
    FeatureInfo {
        version: attrs.int("version", 0),
        name,
        gl_es_version,
        required: attrs.bool("required", true),
    }
}

fn parse_uses_feature(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let feature = feature_info(&Attrs::of(cursor, ctx.res));
    if feature.name.is_none() {
        pkg.config_preferences.push(ConfigurationInfo {
            req_gl_es_version: feature.gl_es_version,
            ..ConfigurationInfo::default()
        });
    }
    pkg.req_features.push(feature);
    done()
}

fn parse_feature_group<'d>(ctx: &Ctx<'d, '_>, pkg: &mut PackageBuilder, cursor: &mut XmlCursor<'d>) -> Step {
    let mut features = Vec::new();
    let mut gl_es_version = 0;

    walk_children(cursor, "<feature-group>", ctx.policy, |tag, cursor| match tag {
        "uses-feature" => {
            let mut feature = feature_info(&ctx.attrs(cursor));
            // Everything in a group is required by the group
            feature.required = true;
            if feature.name.is_none() {
                gl_es_version = gl_es_version.max(feature.gl_es_version);
            } else {
                features.push(feature);
            }
            Some(done())
        }
        _ => None,
    })?;

    if gl_es_version > 0 {
        features.push(FeatureInfo {
            gl_es_version,
            required: true,
            ..FeatureInfo::default()
        });
    }
    pkg.feature_groups.push(FeatureGroup { features });
    done()
}

fn parse_supports_screens(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let declared = |name: &str| attrs.has_value_or_empty(name).then(|| attrs.bool(name, true));
    pkg.screens = SupportsScreens {
        small: declared("smallScreens"),
        normal: declared("normalScreens"),
        large: declared("largeScreens"),
        xlarge: declared("xlargeScreens"),
        resizeable: declared("resizeable"),
        any_density: declared("anyDensity"),
        requires_smallest_width_dp: attrs.int("requiresSmallestWidthDp", 0),
        compatible_width_limit_dp: attrs.int("compatibleWidthLimitDp", 0),
        largest_width_limit_dp: attrs.int("largestWidthLimitDp", 0),
    };
    done()
}

fn parse_protected_broadcast(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    if let Some(name) = Attrs::of(cursor, ctx.res).non_resource_string("name") {
        if !pkg.protected_broadcasts.iter().any(|b| b == name) {
            pkg.protected_broadcasts.push(name.to_string());
        }
    }
    done()
}

fn parse_original_package(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let Some(original) = Attrs::of(cursor, ctx.res).non_config_string("name") else {
        return done();
    };
    if original != pkg.package_name() {
        if pkg.original_packages.is_empty() {
            pkg.real_package = Some(pkg.package_name().to_string());
        }
        pkg.original_packages.push(original);
    }
    done()
}

fn parse_adopt_permissions(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    if let Some(name) = Attrs::of(cursor, ctx.res).non_config_string("name") {
        pkg.adopt_permissions.push(name);
    }
    done()
}

fn decode_hex(hash: &str) -> Option<Vec<u8>> {
    if hash.len() % 2 != 0 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..hash.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hash[i..i + 2], 16).ok())
        .collect()
}

fn parse_restrict_update(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    if !ctx.flags.contains(ParseFlags::IS_SYSTEM_DIR) {
        return skipped("<restrict-update> only applies to system packages");
    }
    if let Some(hash) = Attrs::of(cursor, ctx.res).non_config_string("hash") {
        match decode_hex(hash.trim()) {
            Some(bytes) if !bytes.is_empty() => pkg.restrict_update_hash = Some(bytes),
            _ => warn!("Ignoring malformed <restrict-update> hash {} in {}", hash, pkg.package_name()),
        }
    }
    done()
}
