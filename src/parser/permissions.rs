//! Permission declarations, requests and attributions
//!
//! Also holds the compatibility shims that run after the manifest children:
//! legacy implicit permissions and platform permission splits.

use super::components::{component_name, label};
use super::walker::walk_children;
use super::Ctx;
use crate::config::version_codes::DONUT;
use crate::config::Platform;
use crate::document::{Attrs, TypedValue, XmlCursor};
use crate::model::{Attribution, PackageBuilder, Permission, PermissionGroup, UsesPermission};
use crate::result::{done, skipped, ParseError, Step};
use std::collections::BTreeSet;
use tracing::warn;

pub const PROTECTION_NORMAL: i32 = 0;
pub const PROTECTION_DANGEROUS: i32 = 1;
pub const PROTECTION_SIGNATURE: i32 = 2;
pub const PROTECTION_INTERNAL: i32 = 4;
pub const PROTECTION_MASK_BASE: i32 = 0xf;
pub const PROTECTION_FLAG_APPOP: i32 = 0x40;
pub const PROTECTION_FLAG_INSTANT: i32 = 0x1000;
pub const PROTECTION_FLAG_RUNTIME_ONLY: i32 = 0x2000;

const PROTECTION_LEVELS: &[(&str, i32)] = &[
    ("normal", PROTECTION_NORMAL),
    ("dangerous", PROTECTION_DANGEROUS),
    ("signature", PROTECTION_SIGNATURE),
    ("signatureOrSystem", 3),
    ("internal", PROTECTION_INTERNAL),
    ("privileged", 0x10),
    ("system", 0x10),
    ("development", 0x20),
    ("appop", PROTECTION_FLAG_APPOP),
    ("pre23", 0x80),
    ("installer", 0x100),
    ("verifier", 0x200),
    ("preinstalled", 0x400),
    ("setup", 0x800),
    ("instant", PROTECTION_FLAG_INSTANT),
    ("runtime", PROTECTION_FLAG_RUNTIME_ONLY),
    ("oem", 0x4000),
    ("vendorPrivileged", 0x8000),
    ("textClassifier", 0x10000),
    ("configurator", 0x80000),
    ("incidentReportApprover", 0x100000),
    ("appPredictor", 0x200000),
    ("companion", 0x800000),
    ("retailDemo", 0x1000000),
    ("recents", 0x2000000),
    ("role", 0x4000000),
    ("knownSigner", 0x8000000),
];

const USES_PERMISSION_FLAGS: &[(&str, i32)] = &[("neverForLocation", 0x10000)];

pub const MAX_ATTRIBUTION_TAG_LEN: usize = 50;
const MAX_NUM_ATTRIBUTIONS: usize = 10000;

/// Permissions granted to every package targeting below the given SDK
const COMPAT_PERMISSIONS: &[(&str, i32)] = &[
    ("android.permission.WRITE_EXTERNAL_STORAGE", DONUT),
    ("android.permission.READ_PHONE_STATE", DONUT),
];

pub(super) fn parse_uses_permission(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let Some(name) = attrs.non_resource_string("name") else {
        return skipped("<uses-permission> without a literal name");
    };
    let max_sdk = match attrs.peek("maxSdkVersion") {
        Some(TypedValue::Int(v)) => v,
        _ => 0,
    };
    let flags = attrs.flags_int("usesPermissionFlags", USES_PERMISSION_FLAGS, 0);

    if max_sdk != 0 && max_sdk < ctx.platform.sdk_version {
        return skipped(format!("{} only applies up to SDK {}", name, max_sdk));
    }
    if let Some(feature) = attrs.non_config_string("requiredFeature") {
        if !ctx.callback.has_feature(&feature) {
            return skipped(format!("{} requires missing feature {}", name, feature));
        }
    }
    if let Some(feature) = attrs.non_config_string("requiredNotFeature") {
        if ctx.callback.has_feature(&feature) {
            return skipped(format!("{} excluded by feature {}", name, feature));
        }
    }

    if !pkg.add_requested_permission(name) {
        warn!(
            "Ignoring duplicate uses-permission: {} in package: {} at: {}",
            name,
            pkg.package_name(),
            cursor.position_description()
        );
        return done();
    }
    pkg.uses_permissions.push(UsesPermission {
        name: name.to_string(),
        max_sdk_version: (max_sdk != 0).then_some(max_sdk),
        flags,
    });
    done()
}

pub(super) fn parse_permission(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let name = component_name(pkg.package_name(), &attrs, "<permission>")?;

    let background_permission = if !attrs.has_value("backgroundPermission") {
        None
    } else if pkg.package_name() == "android" {
        attrs.non_resource_string("backgroundPermission").map(str::to_string)
    } else {
        warn!(
            "{} defines a background permission. Only the 'android' package can do that.",
            pkg.package_name()
        );
        None
    };

    let protection_level = attrs.flags_int("protectionLevel", PROTECTION_LEVELS, PROTECTION_NORMAL);
    let base = protection_level & PROTECTION_MASK_BASE;
    let flags = protection_level & !PROTECTION_MASK_BASE;
    if flags != 0
        && flags & PROTECTION_FLAG_INSTANT == 0
        && flags & PROTECTION_FLAG_RUNTIME_ONLY == 0
        && base != PROTECTION_SIGNATURE
        && base != PROTECTION_INTERNAL
    {
        return Err(ParseError::malformed(
            "<permission> protectionLevel specifies a non-instant, non-appop, non-runtimeOnly \
             flag but is not based on signature or internal type",
        ));
    }

    pkg.permissions.push(Permission {
        name,
        group: attrs.non_config_string("permissionGroup"),
        protection_level,
        background_permission,
        request_res: attrs.resource_id("request"),
        label_res: label(&attrs).1,
        description: attrs.resource_id("description"),
        tree: false,
    });
    done()
}

/// Tree names need a package-like prefix: at least three segments
fn has_three_segments(name: &str) -> bool {
    match name.find('.') {
        Some(first) if first > 0 => name[first + 1..].contains('.'),
        _ => false,
    }
}

pub(super) fn parse_permission_tree(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let name = component_name(pkg.package_name(), &attrs, "<permission-tree>")?;
    if !has_three_segments(&name) {
        return Err(ParseError::malformed(format!(
            "<permission-tree> name has less than three segments: {}",
            name
        )));
    }
    pkg.permissions.push(Permission {
        name,
        label_res: label(&attrs).1,
        description: attrs.resource_id("description"),
        tree: true,
        ..Permission::default()
    });
    done()
}

pub(super) fn parse_permission_group(ctx: &Ctx<'_, '_>, pkg: &mut PackageBuilder, cursor: &XmlCursor<'_>) -> Step {
    let attrs = Attrs::of(cursor, ctx.res);
    let name = component_name(pkg.package_name(), &attrs, "<permission-group>")?;
    pkg.permission_groups.push(PermissionGroup {
        name,
        priority: attrs.int("priority", 0),
        request_detail: attrs.resource_id("requestDetail"),
        background_request: attrs.resource_id("backgroundRequest"),
        background_request_detail: attrs.resource_id("backgroundRequestDetail"),
        label_res: label(&attrs).1,
    });
    done()
}

pub(super) fn parse_attribution<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    let tag = match attrs.non_config_string("tag") {
        Some(tag) if !tag.is_empty() && tag.len() <= MAX_ATTRIBUTION_TAG_LEN => tag,
        other => {
            return Err(ParseError::malformed(format!(
                "Invalid attribution tag {}",
                other.unwrap_or_else(|| "null".to_string())
            )))
        }
    };
    let label = attrs.resource_id("label");
    if label == 0 {
        return Err(ParseError::malformed(format!(
            "Invalid attribution label for tag {}",
            tag
        )));
    }

    let mut inherit_from = Vec::new();
    walk_children(cursor, "<attribution>", ctx.policy, |child, cursor| match child {
        "inherit-from" => Some(match ctx.attrs(cursor).non_config_string("tag") {
            Some(source) => {
                inherit_from.push(source);
                done()
            }
            None => Err(ParseError::malformed("Invalid attribution inherit-from tag")),
        }),
        _ => None,
    })?;

    pkg.attributions.push(Attribution {
        tag,
        label,
        inherit_from,
    });
    done()
}

/// Tags are unique and no tag is both declared and inherited from
pub(super) fn is_combination_valid(attributions: &[Attribution]) -> bool {
    if attributions.len() > MAX_NUM_ATTRIBUTIONS {
        return false;
    }
    let mut tags = BTreeSet::new();
    for attribution in attributions {
        if !tags.insert(attribution.tag.as_str()) {
            return false;
        }
    }
    let mut inherited = BTreeSet::new();
    for attribution in attributions {
        for source in &attribution.inherit_from {
            if tags.contains(source.as_str()) || !inherited.insert(source.as_str()) {
                return false;
            }
        }
    }
    true
}

/// Same permission name declared twice with different attributes
pub(super) fn has_conflicting_duplicate(permissions: &[Permission]) -> bool {
    permissions.iter().enumerate().any(|(i, a)| {
        permissions[i + 1..]
            .iter()
            .any(|b| a.name == b.name && !a.same_declaration(b))
    })
}

/// Grant the legacy permissions old packages assumed they had
pub(super) fn apply_compat_permissions(pkg: &mut PackageBuilder) {
    for (name, sdk) in COMPAT_PERMISSIONS {
        if pkg.target_sdk_version >= *sdk {
            break;
        }
        pkg.add_implicit_permission(name);
    }
}

/// Add the finer-grained permissions a requested permission was split into
pub(super) fn apply_split_permissions(pkg: &mut PackageBuilder, platform: &Platform) {
    for split in &platform.split_permissions {
        if pkg.target_sdk_version >= split.target_sdk
            || !pkg.requested_permissions.contains(&split.split_permission)
        {
            continue;
        }
        for name in &split.new_permissions {
            pkg.add_implicit_permission(name);
        }
    }
}
