//! SDK version resolution for `<uses-sdk>`

use super::walker::{walk_children, UnknownTagPolicy};
use crate::archive::{ResourceArchive, ResourceValue};
use crate::config::{version_codes, Platform};
use crate::document::{Attrs, TypedValue, XmlCursor};
use crate::result::{done, ErrorCode, ParseError, ParseResult};
use std::collections::BTreeMap;

pub const DEFAULT_MIN_SDK_VERSION: i32 = 1;
pub const DEFAULT_TARGET_SDK_VERSION: i32 = 0;

/// A declared SDK level: a number or a pre-release codename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkValue {
    Version(i32),
    Codename(String),
}

/// Resolved `<uses-sdk>` content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesSdk {
    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub min_extension_versions: Option<BTreeMap<i32, i32>>,
}

/// Whether a codename (optionally followed by `.fingerprint`) is accepted
pub fn match_target_code(codenames: &[String], target_code: &str) -> bool {
    let name = target_code
        .split_once('.')
        .map_or(target_code, |(name, _)| name);
    codenames.iter().any(|c| c == name)
}

fn codename_error(code: &str, codenames: &[String]) -> ParseError {
    let message = if codenames.is_empty() {
        format!(
            "Requires development platform {} but this is a release platform.",
            code
        )
    } else {
        format!(
            "Requires development platform {} (current platform is any of [{}])",
            code,
            codenames.join(", ")
        )
    };
    ParseError::new(ErrorCode::OlderSdk, message)
}

pub fn compute_min_sdk_version(
    min_version: i32,
    min_code: Option<&str>,
    platform_sdk: i32,
    codenames: &[String],
) -> ParseResult<i32> {
    match min_code {
        None if min_version <= platform_sdk => Ok(min_version),
        None => Err(ParseError::new(
            ErrorCode::OlderSdk,
            format!(
                "Requires newer sdk version #{} (current version is #{})",
                min_version, platform_sdk
            ),
        )),
        Some(code) if match_target_code(codenames, code) => Ok(version_codes::CUR_DEVELOPMENT),
        Some(code) => Err(codename_error(code, codenames)),
    }
}

pub fn compute_target_sdk_version(
    target_version: i32,
    target_code: Option<&str>,
    codenames: &[String],
) -> ParseResult<i32> {
    match target_code {
        None => Ok(target_version),
        Some(code) if match_target_code(codenames, code) => Ok(version_codes::CUR_DEVELOPMENT),
        Some(code) => Err(codename_error(code, codenames)),
    }
}

/// Resolve declared min/target values against the platform
///
/// An absent target copies the minimum (number and codename). A codename
/// target also becomes the minimum when no minimum was declared.
pub fn resolve_sdk_versions(
    min: Option<SdkValue>,
    target: Option<SdkValue>,
    platform: &Platform,
) -> ParseResult<(i32, i32)> {
    let mut min_version = DEFAULT_MIN_SDK_VERSION;
    let mut min_code: Option<String> = None;
    let min_assigned = min.is_some();
    match min {
        Some(SdkValue::Version(v)) => min_version = v,
        Some(SdkValue::Codename(c)) => min_code = Some(c),
        None => {}
    }

    let (target_version, target_code) = match target {
        Some(SdkValue::Version(v)) => (v, None),
        Some(SdkValue::Codename(c)) => {
            if !min_assigned {
                min_code = Some(c.clone());
            }
            (DEFAULT_TARGET_SDK_VERSION, Some(c))
        }
        None => (min_version, min_code.clone()),
    };

    let min_sdk = compute_min_sdk_version(
        min_version,
        min_code.as_deref(),
        platform.sdk_version,
        &platform.codenames,
    )?;
    let target_sdk =
        compute_target_sdk_version(target_version, target_code.as_deref(), &platform.codenames)?;
    Ok((min_sdk, target_sdk))
}

/// Declared SDK level of one `<uses-sdk>` attribute, following references
pub(crate) fn declared_sdk_value(attrs: &Attrs<'_>, name: &str, resources: &dyn ResourceArchive) -> Option<SdkValue> {
    match attrs.peek(name)? {
        TypedValue::Int(v) => Some(SdkValue::Version(v)),
        TypedValue::Float(v) => Some(SdkValue::Version(v as i32)),
        TypedValue::String(s) => Some(SdkValue::Codename(s)),
        TypedValue::Reference(id) => match resources.value(id)? {
            ResourceValue::Int(v) => Some(SdkValue::Version(*v)),
            ResourceValue::String(s) => Some(SdkValue::Codename(s.clone())),
            _ => None,
        },
        TypedValue::Bool(_) | TypedValue::Null => None,
    }
}

/// Parse `<uses-sdk>` at the cursor, including `<extension-sdk>` children
pub fn parse_uses_sdk<'d>(
    cursor: &mut XmlCursor<'d>,
    attrs: &Attrs<'d>,
    resources: &'d dyn ResourceArchive,
    platform: &Platform,
    policy: UnknownTagPolicy,
) -> ParseResult<UsesSdk> {
    let min = declared_sdk_value(attrs, "minSdkVersion", resources);
    let target = declared_sdk_value(attrs, "targetSdkVersion", resources);
    let (min_sdk_version, target_sdk_version) = resolve_sdk_versions(min, target, platform)?;

    let mut extensions: Option<BTreeMap<i32, i32>> = None;
    walk_children(cursor, "<uses-sdk>", policy, |tag, cursor| match tag {
        "extension-sdk" => {
            let attrs = Attrs::of(cursor, resources);
            Some(parse_extension_sdk(&attrs, platform).and_then(|(sdk, version)| {
                extensions.get_or_insert_with(BTreeMap::new).insert(sdk, version);
                done()
            }))
        }
        _ => None,
    })?;

    Ok(UsesSdk {
        min_sdk_version,
        target_sdk_version,
        min_extension_versions: extensions,
    })
}

fn parse_extension_sdk(attrs: &Attrs<'_>, platform: &Platform) -> ParseResult<(i32, i32)> {
    let sdk = attrs.int("sdkVersion", -1);
    let min_version = attrs.int("minExtensionVersion", -1);
    if sdk < 0 {
        return Err(ParseError::malformed(
            "<extension-sdk> must specify an sdkVersion >= 0",
        ));
    }
    if min_version < 0 {
        return Err(ParseError::malformed(
            "<extension-sdk> must specify minExtensionVersion >= 0",
        ));
    }

    let installed = match platform.extension_version(sdk) {
        Some(v) => v,
        // Extensions exist from R onwards; newer unknown ids report version 0
        None if sdk >= version_codes::R => 0,
        None => {
            return Err(ParseError::malformed(format!(
                "Specified sdkVersion {} is not valid",
                sdk
            )))
        }
    };
    if installed < min_version {
        return Err(ParseError::new(
            ErrorCode::OlderSdk,
            format!(
                "Package requires {} extension version {} which exceeds device version {}",
                sdk, min_version, installed
            ),
        ));
    }
    Ok((sdk, min_version))
}
