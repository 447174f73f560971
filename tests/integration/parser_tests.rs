//! Full parser integration tests
//!
//! Most packages live in an in-memory opener; the last tests go through
//! real zip files.

use apkparse::archive::TableLayout;
use apkparse::parser::{validate_name, DEFAULT_TARGET_SDK_VERSION};
use apkparse::{
    ErrorCode, Locator, MemoryArchive, MemoryOpener, MetaInfCollector, Package, PackageParser, ParseFlags, ParseResult,
    Platform, UnknownTagPolicy, ZipOpener,
};
use rstest::rstest;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

fn manifest(package: &str, body: &str) -> String {
    format!(r#"<manifest {NS} package="{package}" android:versionCode="1">{body}</manifest>"#)
}

fn parse_in(opener: &MemoryOpener, platform: &Platform, path: &str, policy: UnknownTagPolicy, flags: ParseFlags) -> ParseResult<Package> {
    PackageParser::new(platform, opener, &MetaInfCollector)
        .with_policy(policy)
        .parse_package(Path::new(path), flags)
}

fn parse_one(body: &str) -> ParseResult<Package> {
    parse_xml(&manifest("com.example.app", body))
}

fn parse_xml(xml: &str) -> ParseResult<Package> {
    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest("/data/app.apk", xml));
    parse_in(
        &opener,
        &Platform::default(),
        "/data/app.apk",
        UnknownTagPolicy::Lenient,
        ParseFlags::empty(),
    )
}

#[rstest]
#[case("com.example.app", true)]
#[case("android.core", true)]
#[case("com.example.1app", false)]
#[case("nodots", false)]
#[case("com..example", true)]
#[case("com.ex-ample", false)]
fn test_name_validation_is_stable(#[case] name: &str, #[case] accepted: bool) {
    let first = validate_name(name, true, true);
    let second = validate_name(name, true, true);
    assert_eq!(first.is_ok(), accepted);
    assert_eq!(first, second);
}

#[test]
fn test_missing_application_tolerated_for_old_targets() {
    let pkg = parse_one(r#"<uses-sdk android:minSdkVersion="1" android:targetSdkVersion="5"/>"#).unwrap();
    assert_eq!(pkg.target_sdk_version, 5);
    assert!(pkg.activities.is_empty());

    let err = parse_one(r#"<uses-sdk android:minSdkVersion="1" android:targetSdkVersion="10000"/>"#).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ManifestMalformed);
    assert!(err
        .message()
        .contains("<manifest> does not contain an <application> or <instrumentation>"));
}

#[test]
fn test_no_application_and_no_sdk() {
    let pkg = parse_one("").unwrap();
    assert_eq!(pkg.package_name(), "com.example.app");
    assert_eq!(pkg.target_sdk_version, DEFAULT_TARGET_SDK_VERSION);
    assert!(pkg.activities.is_empty());
}

#[test]
fn test_unknown_application_child_policy() {
    let xml = manifest(
        "com.example.app",
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <unknown-thing><nested/></unknown-thing>
             <activity android:name=".Main"/>
           </application>"#,
    );
    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest("/data/app.apk", &xml));
    let platform = Platform::default();

    let pkg = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap();
    assert!(pkg
        .activities
        .iter()
        .any(|a| a.component.name == "com.example.app.Main"));

    let err = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Strict, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadManifest);
    assert!(err.message().contains("Bad element under <application>: unknown-thing"));
}

#[test]
fn test_pre_o_max_aspect_ratio_inherited() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="25"/>
           <application>
             <activity android:name=".Plain"/>
             <activity android:name=".Wide">
               <meta-data android:name="android.max_aspect" android:value="2.5"/>
             </activity>
           </application>"#,
    )
    .unwrap();
    let ratio = |name: &str| {
        pkg.activities
            .iter()
            .find(|a| a.component.name == name)
            .and_then(|a| a.max_aspect_ratio)
    };
    assert_eq!(ratio("com.example.app.Plain"), Some(1.86));
    assert_eq!(ratio("com.example.app.Wide"), Some(2.5));
}

#[test]
fn test_backup_agent_ignored_without_backup() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application android:allowBackup="false" android:backupAgent=".Agent"/>"#,
    )
    .unwrap();
    assert!(!pkg.flags.allow_backup);
    assert_eq!(pkg.backup_agent_name, None);

    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application android:backupAgent=".Agent"/>"#,
    )
    .unwrap();
    assert_eq!(pkg.backup_agent_name.as_deref(), Some("com.example.app.Agent"));
}

#[test]
fn test_newer_sdk_rejected() {
    let xml = manifest(
        "com.example.app",
        r#"<uses-sdk android:minSdkVersion="29" android:targetSdkVersion="29"/><application/>"#,
    );
    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest("/data/app.apk", &xml));
    let platform = Platform {
        sdk_version: 28,
        ..Platform::default()
    };
    let err = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OlderSdk);
    assert!(err.message().contains("29"));
    assert!(err.message().contains("28"));
}

#[test]
fn test_debuggable_implies_profileable_by_shell() {
    let pkg = parse_one(r#"<application android:debuggable="true"/>"#).unwrap();
    assert!(pkg.flags.debuggable);
    assert!(pkg.flags.profileable_by_shell);
}

#[test]
fn test_debuggable_profileable_agrees_between_passes() {
    let xml = manifest(
        "com.example.app",
        r#"<application android:debuggable="true"><profileable android:shell="false"/></application>"#,
    );
    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest("/data/app.apk", &xml));
    let platform = Platform::default();

    let lite = Locator::new(&opener, &platform, &MetaInfCollector)
        .locate(Path::new("/data/app.apk"), ParseFlags::empty())
        .unwrap();
    let pkg = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap();
    assert!(lite.debuggable);
    assert!(lite.profileable_by_shell);
    assert!(pkg.flags.profileable_by_shell);
}

fn activity_names(pkg: &Package) -> Vec<&str> {
    pkg.activities.iter().map(|a| a.component.name.as_str()).collect()
}

#[test]
fn test_activities_sorted_by_order_when_declared() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <activity android:name=".A" android:order="1"/>
             <activity android:name=".C"/>
             <activity android:name=".B" android:order="2"/>
           </application>"#,
    )
    .unwrap();
    assert_eq!(
        activity_names(&pkg),
        vec![
            "com.example.app.B",
            "com.example.app.A",
            "com.example.app.C",
            "android.app.AppDetailsActivity"
        ]
    );
}

#[test]
fn test_activities_keep_declaration_order_without_order() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <activity android:name=".Zeta"/>
             <activity android:name=".Alpha"/>
             <activity android:name=".Mid"/>
           </application>"#,
    )
    .unwrap();
    assert_eq!(
        activity_names(&pkg),
        vec![
            "com.example.app.Zeta",
            "com.example.app.Alpha",
            "com.example.app.Mid",
            "android.app.AppDetailsActivity"
        ]
    );
}

#[test]
fn test_app_details_activity_inherits_application_settings() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application android:process=":p" android:hardwareAccelerated="false">
             <activity android:name=".Main"/>
           </application>"#,
    )
    .unwrap();
    let details = pkg.activities.last().unwrap();
    assert_eq!(details.component.name, "android.app.AppDetailsActivity");
    assert!(details.component.exported);
    assert_eq!(details.component.process_name.as_deref(), Some("com.example.app:p"));
    assert!(!details.hardware_accelerated);
    assert_eq!(details.task_affinity.as_deref(), Some("com.example.app:app_details"));

    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application android:hardwareAccelerated="true"/>"#,
    )
    .unwrap();
    assert!(pkg.activities.last().unwrap().hardware_accelerated);
}

#[test]
fn test_static_library_has_no_app_details_activity() {
    let pkg = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <static-library android:name="com.example.lib" android:version="4"/>
           </application>"#,
    )
    .unwrap();
    assert!(pkg.activities.is_empty());
    let library = pkg.static_library.as_ref().unwrap();
    assert_eq!(library.name, "com.example.lib");
    assert_eq!(library.version, 4);
}

#[test]
fn test_static_library_rejects_shared_user_id() {
    let err = parse_xml(&format!(
        r#"<manifest {NS} package="com.example.app" android:sharedUserId="com.example.shared">
             <uses-sdk android:targetSdkVersion="30"/>
             <application>
               <static-library android:name="com.example.lib" android:version="1"/>
             </application>
           </manifest>"#
    ))
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadSharedUserId);
}

#[test]
fn test_multiple_static_libraries_rejected() {
    let err = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <static-library android:name="com.example.lib" android:version="1"/>
             <static-library android:name="com.example.other" android:version="1"/>
           </application>"#,
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ManifestMalformed);
    assert!(err.message().contains("Multiple static-shared libs"));
}

#[test]
fn test_uses_static_library_requires_cert_digest() {
    let err = parse_one(
        r#"<uses-sdk android:targetSdkVersion="30"/>
           <application>
             <uses-static-library android:name="com.example.lib" android:version="1"/>
           </application>"#,
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ManifestMalformed);
    assert!(err.message().contains("Bad uses-static-library declaration"));
}

#[rstest]
#[case(26, vec!["aabb"])]
#[case(30, vec!["aabb", "ccdd"])]
fn test_additional_certificates_read_for_newer_targets(#[case] target: i32, #[case] digests: Vec<&str>) {
    let pkg = parse_one(&format!(
        r#"<uses-sdk android:targetSdkVersion="{target}"/>
           <application>
             <uses-static-library android:name="com.example.lib" android:version="1" android:certDigest="AA:BB">
               <additional-certificate android:certDigest="CC:DD"/>
             </uses-static-library>
           </application>"#
    ))
    .unwrap();
    assert_eq!(pkg.uses_static_libraries.len(), 1);
    assert_eq!(pkg.uses_static_libraries[0].cert_digests, digests);
}

#[test]
fn test_base_and_split_parse_into_one_package() {
    let opener = MemoryOpener::new()
        .with(MemoryArchive::with_manifest(
            "/data/app/com.x/base.apk",
            &format!(
                r#"<manifest {NS} package="com.x" android:versionCode="3">
                     <uses-sdk android:targetSdkVersion="30"/>
                     <uses-permission android:name="android.permission.INTERNET"/>
                     <application><activity android:name=".Main"/></application>
                   </manifest>"#
            ),
        ))
        .with(MemoryArchive::with_manifest(
            "/data/app/com.x/split_feature.apk",
            &format!(
                r#"<manifest {NS} package="com.x" split="feature" android:versionCode="3" android:isFeatureSplit="true">
                     <application android:hasCode="false">
                       <service android:name=".FeatureService"/>
                     </application>
                   </manifest>"#
            ),
        ));

    let pkg = parse_in(
        &opener,
        &Platform::default(),
        "/data/app/com.x",
        UnknownTagPolicy::Lenient,
        ParseFlags::empty(),
    )
    .unwrap();
    assert_eq!(pkg.split_names, vec!["feature"]);
    assert_eq!(pkg.split_has_code, vec![false]);
    assert_eq!(pkg.services.len(), 1);
    assert_eq!(pkg.services[0].component.split_name.as_deref(), Some("feature"));
    assert_eq!(pkg.requested_permissions, vec!["android.permission.INTERNET".to_string()]);
}

#[test]
fn test_compressed_resource_table_gated_by_target() {
    let compressed = TableLayout {
        compressed: true,
        aligned: true,
    };
    let archive = |target: i32| {
        MemoryArchive::with_manifest(
            "/data/app.apk",
            &manifest(
                "com.example.app",
                &format!(r#"<uses-sdk android:targetSdkVersion="{target}"/><application/>"#),
            ),
        )
        .with_layout("resources.arsc", vec![0u8; 16], compressed)
    };
    let platform = Platform::default();

    let opener = MemoryOpener::new().with(archive(29));
    assert!(parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).is_ok());

    let opener = MemoryOpener::new().with(archive(30));
    let err = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourcesArscCompressed);
}

#[test]
fn test_enforce_code_requires_dex() {
    let xml = manifest("com.example.app", "<application/>");
    let platform = Platform::default();

    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest("/data/app.apk", &xml));
    let err = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::ENFORCE_CODE).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidApk);

    let opener = MemoryOpener::new()
        .with(MemoryArchive::with_manifest("/data/app.apk", &xml).with_entry("classes.dex", b"dex\n035".to_vec()));
    assert!(parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::ENFORCE_CODE).is_ok());
}

#[test]
fn test_only_core_apps() {
    let platform = Platform {
        only_core_apps: true,
        ..Platform::default()
    };
    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest(
        "/data/app.apk",
        &manifest("com.example.app", "<application/>"),
    ));
    let err = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OnlyCoreAppAllowed);

    let opener = MemoryOpener::new().with(MemoryArchive::with_manifest(
        "/data/app.apk",
        &format!(r#"<manifest {NS} package="com.example.app" coreApp="true"><application/></manifest>"#),
    ));
    let pkg = parse_in(&opener, &platform, "/data/app.apk", UnknownTagPolicy::Lenient, ParseFlags::empty()).unwrap();
    assert!(pkg.core_app);
}

#[test]
fn test_empty_manifest_document() {
    let err = parse_xml("").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ManifestEmpty);
}

#[test]
fn test_base_file_naming_a_split() {
    let err = parse_xml(&format!(
        r#"<manifest {NS} package="com.example.app" split="extra"><application/></manifest>"#
    ))
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadPackageName);
    assert!(err.message().contains("Expected base APK, but found split extra"));
}

fn write_apk(dir: &Path, file: &str, manifest: &str, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(dir.join(file)).unwrap());
    writer
        .start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_zip_package_with_resources_and_signers() {
    let temp = TempDir::new().unwrap();
    write_apk(
        temp.path(),
        "base.apk",
        &manifest(
            "com.example.app",
            r#"<uses-sdk android:minSdkVersion="21" android:targetSdkVersion="29"/>
               <application android:label="@string/app_name">
                 <activity android:name=".Main"/>
               </application>"#,
        ),
        &[
            (
                "res/values/strings.xml",
                br#"<resources><string name="app_name">Example</string></resources>"#,
            ),
            ("META-INF/CERT.RSA", b"signer"),
        ],
    );

    let platform = Platform::default();
    let pkg = PackageParser::new(&platform, &ZipOpener, &MetaInfCollector)
        .parse_package(&temp.path().join("base.apk"), ParseFlags::COLLECT_CERTIFICATES)
        .unwrap();
    assert_eq!(pkg.min_sdk_version, 21);
    assert_ne!(pkg.label_res, 0);
    assert_eq!(pkg.signing_details.signatures.len(), 1);
}

#[test]
fn test_zip_cluster_with_mismatched_split_signer() {
    let temp = TempDir::new().unwrap();
    write_apk(
        temp.path(),
        "base.apk",
        &manifest("com.x", "<application/>"),
        &[("META-INF/CERT.RSA", b"one")],
    );
    write_apk(
        temp.path(),
        "split_a.apk",
        &format!(r#"<manifest {NS} package="com.x" split="a" android:versionCode="1"><application/></manifest>"#),
        &[("META-INF/CERT.RSA", b"two")],
    );

    let platform = Platform::default();
    let err = PackageParser::new(&platform, &ZipOpener, &MetaInfCollector)
        .parse_package(temp.path(), ParseFlags::COLLECT_CERTIFICATES)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InconsistentCertificates);
}
