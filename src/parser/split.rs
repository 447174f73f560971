//! Manifest of a split file
//!
//! A split extends the package its base produced. Only components, metadata
//! and library dependencies are read; package-level tags belong to the base.

use super::application::{is_valid_class_loader_name, parse_library_uses};
use super::components::{add_main_component, add_meta, ComponentOrders};
use super::names::parse_package_split_names;
use super::walker::{ignore, walk_children, UnknownTagPolicy};
use super::Ctx;
use crate::document::{Token, XmlCursor};
use crate::model::{long_version_code, PackageBuilder};
use crate::result::{done, skipped, DeferredKind, ErrorCode, ParseError, ParseInput, ParseResult, Step};
use std::path::Path;
use tracing::warn;

/// Parse split `index` into the package built from the base file
pub(super) fn parse_split<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    mut pkg: PackageBuilder,
    index: usize,
    path: &Path,
    cursor: &mut XmlCursor<'d>,
) -> ParseResult<PackageBuilder> {
    if cursor.next_start_tag() == Token::EndDocument {
        return Err(ParseError::new(ErrorCode::ManifestEmpty, "No start tag found"));
    }

    // The locator already checked identity; a caller may have bypassed it
    let (package_name, split_name) = parse_package_split_names(cursor)?;
    if package_name != pkg.package_name() {
        return Err(ParseError::new(
            ErrorCode::BadManifest,
            format!(
                "Inconsistent package {} in {}; expected {}",
                package_name,
                path.display(),
                pkg.package_name()
            ),
        ));
    }
    let expected = pkg.split_names.get(index).cloned();
    if split_name.is_none() || split_name != expected {
        return Err(ParseError::new(
            ErrorCode::BadManifest,
            format!(
                "Expected split {} in {}, but found {}",
                expected.as_deref().unwrap_or("null"),
                path.display(),
                split_name.as_deref().unwrap_or("null")
            ),
        ));
    }

    let attrs = ctx.attrs(cursor);
    let version = long_version_code(attrs.int("versionCodeMajor", 0), attrs.int("versionCode", 0));
    if version != pkg.long_version_code() {
        return Err(ParseError::new(
            ErrorCode::BadManifest,
            format!(
                "Inconsistent version {} in {}; expected {}",
                version,
                path.display(),
                pkg.long_version_code()
            ),
        ));
    }

    let mut found_app = false;
    walk_children(cursor, "<manifest>", ctx.policy, |tag, cursor| match tag {
        "application" if found_app => Some(match ctx.policy {
            UnknownTagPolicy::Strict => Err(ParseError::malformed("<manifest> has more than one <application>")),
            UnknownTagPolicy::Lenient => {
                warn!(
                    "<manifest> has more than one <application> at {}",
                    cursor.position_description()
                );
                cursor.skip_subtree();
                skipped("duplicate <application>")
            }
        }),
        "application" => {
            found_app = true;
            Some(parse_split_application(ctx, input, &mut pkg, index, cursor))
        }
        // Package-level declarations only count in the base file
        "uses-sdk" | "uses-split" | "uses-permission" | "uses-permission-sdk-m" | "uses-permission-sdk-23"
        | "uses-feature" | "feature-group" | "uses-configuration" | "supports-screens" | "package-verifier"
        | "queries" | "permission" | "permission-group" | "permission-tree" | "key-sets" | "overlay"
        | "instrumentation" | "original-package" | "adopt-permissions" | "protected-broadcast"
        | "restrict-update" | "attribution" | "uses-gl-texture" | "compatible-screens" | "supports-input"
        | "eat-comment" | "uses-package" => ignore(cursor),
        _ => None,
    })?;

    if !found_app {
        input.defer_error(
            DeferredKind::MissingAppTag,
            "<manifest> does not contain an <application>",
        )?;
    }
    Ok(pkg)
}

fn parse_split_application<'d>(
    ctx: &Ctx<'d, '_>,
    input: &mut ParseInput,
    pkg: &mut PackageBuilder,
    index: usize,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let attrs = ctx.attrs(cursor);
    if let Some(has_code) = pkg.split_has_code.get_mut(index) {
        *has_code = attrs.bool("hasCode", true);
    }
    if let Some(loader) = attrs.non_config_string("classLoader") {
        if !is_valid_class_loader_name(&loader) {
            return Err(ParseError::malformed(format!(
                "Invalid class loader name: {}",
                loader
            )));
        }
        if let Some(slot) = pkg.split_class_loader_names.get_mut(index) {
            *slot = Some(loader);
        }
    }

    let split_name = pkg.split_names.get(index).cloned();
    let mut orders = ComponentOrders::default();
    walk_children(cursor, "<application>", ctx.policy, |tag, cursor| match tag {
        "activity" | "activity-alias" | "receiver" | "service" | "provider" => Some(add_main_component(
            ctx,
            input,
            pkg,
            cursor,
            tag,
            split_name.as_deref(),
            &mut orders,
        )),
        "meta-data" => Some(add_meta(ctx, &mut pkg.meta_data, cursor, "<meta-data>")),
        _ => parse_library_uses(ctx, pkg, tag, cursor),
    })?;

    orders.sort(pkg);
    done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::config::Platform;
    use crate::document::XmlDocument;
    use crate::parser::ParseFlags;
    use std::path::PathBuf;

    const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

    fn base() -> PackageBuilder {
        let mut pkg = PackageBuilder::new("com.example", Path::new("/d/base.apk"), Path::new("/d"));
        pkg.version_code = 3;
        pkg.target_sdk_version = 30;
        pkg.process_name = Some("com.example".into());
        pkg.split_names = vec!["feature".into()];
        pkg.split_code_paths = vec![PathBuf::from("/d/split_feature.apk")];
        pkg.split_has_code = vec![true];
        pkg.split_class_loader_names = vec![None];
        pkg
    }

    fn parse(xml: &str, policy: UnknownTagPolicy) -> ParseResult<PackageBuilder> {
        let archive = MemoryArchive::new("/d/split_feature.apk");
        let platform = Platform::default();
        let ctx = Ctx {
            res: &archive,
            platform: &platform,
            callback: &platform,
            policy,
            flags: ParseFlags::empty(),
        };
        let doc = XmlDocument::parse(xml).unwrap();
        let mut cursor = doc.cursor();
        let mut input = ParseInput::new();
        input.enable_deferred_errors(30)?;
        parse_split(&ctx, &mut input, base(), 0, Path::new("/d/split_feature.apk"), &mut cursor)
    }

    #[test]
    fn test_split_components_inherit_split_name() {
        let pkg = parse(
            &format!(
                r#"<manifest {NS} package="com.example" split="feature" android:versionCode="3">
                     <uses-permission android:name="android.permission.CAMERA"/>
                     <application android:hasCode="false" android:classLoader="dalvik.system.DelegateLastClassLoader">
                       <activity android:name=".FeatureActivity"/>
                       <service android:name=".Other" android:splitName="elsewhere"/>
                       <meta-data android:name="feature.flag" android:value="true"/>
                     </application>
                   </manifest>"#
            ),
            UnknownTagPolicy::Strict,
        )
        .unwrap();
        assert_eq!(pkg.split_has_code, vec![false]);
        assert_eq!(
            pkg.split_class_loader_names[0].as_deref(),
            Some("dalvik.system.DelegateLastClassLoader")
        );
        assert_eq!(pkg.activities[0].component.split_name.as_deref(), Some("feature"));
        assert_eq!(pkg.services[0].component.split_name.as_deref(), Some("elsewhere"));
        assert!(pkg.meta_data.contains_key("feature.flag"));
        // Base-level tags in a split are not applied
        assert!(pkg.requested_permissions.is_empty());
    }

    #[test]
    fn test_split_identity_is_rechecked() {
        let err = parse(
            &format!(r#"<manifest {NS} package="com.other" split="feature" android:versionCode="3"><application/></manifest>"#),
            UnknownTagPolicy::Lenient,
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "Inconsistent package com.other in /d/split_feature.apk; expected com.example"
        );

        let err = parse(
            &format!(r#"<manifest {NS} package="com.example" split="feature" android:versionCode="4"><application/></manifest>"#),
            UnknownTagPolicy::Lenient,
        )
        .unwrap_err();
        assert_eq!(err.message(), "Inconsistent version 4 in /d/split_feature.apk; expected 3");
    }

    #[test]
    fn test_invalid_split_class_loader() {
        let err = parse(
            &format!(
                r#"<manifest {NS} package="com.example" split="feature" android:versionCode="3">
                     <application android:classLoader="com.example.Loader"/>
                   </manifest>"#
            ),
            UnknownTagPolicy::Lenient,
        )
        .unwrap_err();
        assert_eq!(err.message(), "Invalid class loader name: com.example.Loader");
    }

    #[test]
    fn test_missing_split_application_above_threshold() {
        let err = parse(
            &format!(r#"<manifest {NS} package="com.example" split="feature" android:versionCode="3"/>"#),
            UnknownTagPolicy::Lenient,
        )
        .unwrap_err();
        assert_eq!(err.message(), "<manifest> does not contain an <application>");
    }
}
