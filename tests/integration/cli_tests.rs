//! CLI integration tests
//!
//! These tests run the binary against package files written to a temporary
//! directory, which is also the working directory so no stray config file is
//! picked up.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

fn write_apk(path: &Path, manifest: &str) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    writer
        .start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.finish().unwrap();
}

fn app_manifest(min_sdk: i32) -> String {
    format!(
        r#"<manifest {NS} package="com.example.app" android:versionCode="7" android:versionName="1.2">
             <uses-sdk android:minSdkVersion="{min_sdk}" android:targetSdkVersion="{min_sdk}"/>
             <application>
               <activity android:name=".MainActivity"/>
             </application>
           </manifest>"#
    )
}

fn apkparse(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("apkparse").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    apkparse(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apkparse"))
        .stdout(predicate::str::contains("--lite"))
        .stdout(predicate::str::contains("--collect-certificates"));
}

#[test]
fn test_cli_version() {
    let temp = TempDir::new().unwrap();
    apkparse(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("apkparse"));
}

#[test]
fn test_cli_requires_a_path() {
    let temp = TempDir::new().unwrap();
    apkparse(&temp).assert().failure();
}

#[test]
fn test_cli_parses_package() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(21));

    apkparse(&temp)
        .arg("app.apk")
        .assert()
        .success()
        .stdout(predicate::str::contains("com.example.app"))
        .stdout(predicate::str::contains("com.example.app.MainActivity"))
        .stdout(predicate::str::contains("1 parsed"));
}

#[test]
fn test_cli_no_components() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(21));

    apkparse(&temp)
        .args(["app.apk", "--no-components"])
        .assert()
        .success()
        .stdout(predicate::str::contains("com.example.app.MainActivity").not());
}

#[test]
fn test_cli_failure_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(21));
    std::fs::write(temp.path().join("broken.apk"), b"not a zip").unwrap();

    apkparse(&temp)
        .args(["app.apk", "broken.apk"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("INSTALL_PARSE_FAILED_NOT_APK"))
        .stdout(predicate::str::contains("1 failed"));
}

#[test]
fn test_cli_sdk_override() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(30));

    apkparse(&temp)
        .args(["app.apk", "--sdk", "28"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("INSTALL_FAILED_OLDER_SDK"));
}

#[test]
fn test_cli_json_output() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(21));

    let output = apkparse(&temp)
        .args(["app.apk", "--format", "json", "--quiet"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 1);
    assert_eq!(report["summary"]["parsed"], 1);
    assert_eq!(report["results"][0]["package"]["package_name"], "com.example.app");
    assert_eq!(report["results"][0]["package"]["version_code"], 7);
}

#[test]
fn test_cli_json_to_file() {
    let temp = TempDir::new().unwrap();
    write_apk(&temp.path().join("app.apk"), &app_manifest(21));

    apkparse(&temp)
        .args(["app.apk", "--format", "json", "--output", "report.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let contents = std::fs::read_to_string(temp.path().join("report.json")).unwrap();
    assert!(contents.contains("\"com.example.app\""));
}

#[test]
fn test_cli_lite_cluster() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("pkg");
    std::fs::create_dir(&dir).unwrap();
    write_apk(&dir.join("base.apk"), &app_manifest(21));
    write_apk(
        &dir.join("split_de.apk"),
        &format!(r#"<manifest {NS} package="com.example.app" split="config.de" android:versionCode="7"/>"#),
    );

    apkparse(&temp)
        .args(["pkg", "--lite", "--format", "json", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.de"));
}

#[test]
fn test_cli_strict_from_config_file() {
    let temp = TempDir::new().unwrap();
    write_apk(
        &temp.path().join("app.apk"),
        &format!(
            r#"<manifest {NS} package="com.example.app">
                 <application><made-up-tag/></application>
               </manifest>"#
        ),
    );

    apkparse(&temp).arg("app.apk").assert().success();

    std::fs::write(temp.path().join(".apkparse.yml"), "parser:\n  strict: true\n").unwrap();
    apkparse(&temp)
        .arg("app.apk")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("INSTALL_PARSE_FAILED_BAD_MANIFEST"));
}
