//! Locator integration tests
//!
//! Packages are real zip files written to temporary directories and read
//! back through the zip-backed opener.

use apkparse::locator::split_dependencies;
use apkparse::{ErrorCode, Locator, MetaInfCollector, ParseFlags, Platform, ZipOpener};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

/// Write a package file holding the given manifest and extra entries
fn write_apk(dir: &Path, file: &str, manifest: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    writer
        .start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn manifest(package: &str, split: Option<&str>, version: i32, extra: &str) -> String {
    let split = split.map(|s| format!(r#" split="{}""#, s)).unwrap_or_default();
    format!(
        r#"<manifest {NS} package="{package}"{split} android:versionCode="{version}" {extra}><application/></manifest>"#
    )
}

fn locate(path: &Path, flags: ParseFlags) -> apkparse::ParseResult<apkparse::PackageLite> {
    let platform = Platform::default();
    Locator::new(&ZipOpener, &platform, &MetaInfCollector).locate(path, flags)
}

#[test]
fn test_monolithic_package() {
    let temp = TempDir::new().unwrap();
    let path = write_apk(temp.path(), "app.apk", &manifest("com.example.app", None, 12, ""), &[]);

    let lite = locate(&path, ParseFlags::empty()).unwrap();
    assert_eq!(lite.package_name, "com.example.app");
    assert_eq!(lite.version_code, 12);
    assert_eq!(lite.base_apk_path, path);
    assert!(!lite.is_cluster());
}

#[test]
fn test_duplicate_split_name_fails_naming_later_file() {
    let temp = TempDir::new().unwrap();
    write_apk(temp.path(), "base.apk", &manifest("com.x", None, 3, ""), &[]);
    write_apk(temp.path(), "split_a.apk", &manifest("com.x", Some("a"), 3, ""), &[]);
    let dup = write_apk(temp.path(), "split_b.apk", &manifest("com.x", Some("a"), 3, ""), &[]);

    let err = locate(temp.path(), ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadManifest);
    assert!(err.message().contains("defined more than once"));
    assert!(err.message().contains(&dup.display().to_string()));
}

#[test]
fn test_split_arrays_follow_sorted_names() {
    let temp = TempDir::new().unwrap();
    write_apk(temp.path(), "base.apk", &manifest("com.x", None, 3, ""), &[]);
    write_apk(
        temp.path(),
        "1.apk",
        &manifest("com.x", Some("config.xxhdpi"), 3, r#"android:revisionCode="2""#),
        &[],
    );
    write_apk(
        temp.path(),
        "2.apk",
        &manifest("com.x", Some("bonus"), 3, r#"android:revisionCode="5" android:isFeatureSplit="true""#),
        &[],
    );

    let first = locate(temp.path(), ParseFlags::empty()).unwrap();
    let second = locate(temp.path(), ParseFlags::empty()).unwrap();
    assert_eq!(first.split_names, vec!["bonus", "config.xxhdpi"]);
    assert_eq!(first.split_names, second.split_names);
    assert_eq!(first.split_revision_codes, vec![5, 2]);
    assert_eq!(first.is_feature_split, vec![true, false]);
    assert_eq!(first.split_apk_paths[0], temp.path().join("2.apk"));
}

#[test]
fn test_identity_mismatch_across_files() {
    let temp = TempDir::new().unwrap();
    write_apk(temp.path(), "a_base.apk", &manifest("com.x", None, 3, ""), &[]);
    let other = write_apk(temp.path(), "b_split.apk", &manifest("com.y", Some("s"), 3, ""), &[]);

    let err = locate(temp.path(), ParseFlags::empty()).unwrap_err();
    assert_eq!(
        err.message(),
        format!("Inconsistent package com.y in {}; expected com.x", other.display())
    );
}

#[test]
fn test_missing_base_and_empty_directory() {
    let temp = TempDir::new().unwrap();
    let err = locate(temp.path(), ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotApk);
    assert_eq!(err.message(), "No packages found in split");

    write_apk(temp.path(), "split_a.apk", &manifest("com.x", Some("a"), 3, ""), &[]);
    let err = locate(temp.path(), ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadManifest);
    assert!(err.message().starts_with("Missing base APK in"));
}

#[test]
fn test_single_subdirectory_is_unwrapped() {
    let temp = TempDir::new().unwrap();
    let inner = temp.path().join("com.x-1");
    std::fs::create_dir(&inner).unwrap();
    write_apk(&inner, "base.apk", &manifest("com.x", None, 1, ""), &[]);

    let lite = locate(temp.path(), ParseFlags::empty()).unwrap();
    assert_eq!(lite.base_apk_path, inner.join("base.apk"));
}

#[test]
fn test_empty_manifest() {
    let temp = TempDir::new().unwrap();
    let path = write_apk(temp.path(), "empty.apk", "", &[]);
    let err = locate(&path, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ManifestEmpty);
}

#[test]
fn test_not_a_zip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("junk.apk");
    std::fs::write(&path, b"definitely not a zip").unwrap();
    let err = locate(&path, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotApk);
}

#[test]
fn test_certificates_collected_and_compared() {
    let temp = TempDir::new().unwrap();
    let signed: &[(&str, &[u8])] = &[("META-INF/CERT.RSA", b"cert-one")];
    write_apk(temp.path(), "base.apk", &manifest("com.x", None, 1, ""), signed);
    write_apk(temp.path(), "split_a.apk", &manifest("com.x", Some("a"), 1, ""), signed);

    let lite = locate(temp.path(), ParseFlags::COLLECT_CERTIFICATES).unwrap();
    assert_eq!(lite.signing_details.signatures.len(), 1);

    write_apk(
        temp.path(),
        "split_b.apk",
        &manifest("com.x", Some("b"), 1, ""),
        &[("META-INF/CERT.RSA", b"cert-two")],
    );
    let err = locate(temp.path(), ParseFlags::COLLECT_CERTIFICATES).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InconsistentCertificates);
}

#[test]
fn test_unsigned_package_has_no_certificates() {
    let temp = TempDir::new().unwrap();
    let path = write_apk(temp.path(), "base.apk", &manifest("com.x", None, 1, ""), &[]);
    let err = locate(&path, ParseFlags::COLLECT_CERTIFICATES).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoCertificates);
}

#[test]
fn test_isolated_split_dependencies() {
    let temp = TempDir::new().unwrap();
    write_apk(
        temp.path(),
        "base.apk",
        &manifest("com.x", None, 1, r#"android:isolatedSplits="true""#),
        &[],
    );
    write_apk(
        temp.path(),
        "feature.apk",
        &manifest("com.x", Some("feature"), 1, r#"android:isFeatureSplit="true""#),
        &[],
    );
    write_apk(
        temp.path(),
        "feature_hdpi.apk",
        &manifest("com.x", Some("feature.config.hdpi"), 1, r#"configForSplit="feature""#),
        &[],
    );

    let lite = locate(temp.path(), ParseFlags::empty()).unwrap();
    assert!(lite.isolated_splits);
    let deps = split_dependencies(&lite).unwrap();
    assert_eq!(deps[&0], vec![-1]);
    // feature is split 0 (index 1), its config split is index 2
    assert_eq!(deps[&1], vec![0, 2]);
}
