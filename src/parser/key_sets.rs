//! `<key-sets>`: named groups of signing public keys
//!
//! Keys are declared once by name and may be referenced from several sets.
//! A set whose keys never got a value is dropped with a warning.

use super::walker::walk_children;
use super::Ctx;
use crate::document::{Attrs, XmlCursor};
use crate::model::PackageBuilder;
use crate::result::{done, skipped, ParseError, ParseResult, Step};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Decode a base64 public key, ignoring embedded whitespace
///
/// Returns the canonical re-encoding, or `None` when the value is not
/// valid base64.
pub fn parse_public_key(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(compact.as_bytes()).ok()?;
    Some(STANDARD.encode(bytes))
}

#[derive(Debug, Default)]
struct KeySetState {
    public_keys: BTreeMap<String, String>,
    /// Set name to the key names it references
    defined: BTreeMap<String, BTreeSet<String>>,
    improper: BTreeSet<String>,
    upgrade: BTreeSet<String>,
}

impl KeySetState {
    fn public_key(&mut self, ctx: &Ctx<'_, '_>, cursor: &XmlCursor<'_>, current_set: Option<&str>) -> Step {
        let attrs = Attrs::of(cursor, ctx.res);
        let Some(name) = attrs.non_resource_string("name") else {
            return skipped("'public-key' without a name");
        };
        let value = attrs.non_resource_string("value").and_then(parse_public_key);

        let existing = self.public_keys.get(name).cloned();
        match (existing, value) {
            (None, None) => {
                warn!(
                    "'public-key' {} must define a public-key value on first use at {}. Key ignored.",
                    name,
                    cursor.position_description()
                );
                if let Some(set) = current_set {
                    self.improper.insert(set.to_string());
                }
                return skipped("public key without value");
            }
            (Some(existing), Some(value)) if existing != value => {
                return Err(ParseError::malformed(format!(
                    "Value of 'public-key' {} conflicts with previously defined value at {}",
                    name,
                    cursor.position_description()
                )));
            }
            (_, Some(value)) => {
                self.public_keys.insert(name.to_string(), value);
            }
            (Some(_), None) => {}
        }

        if let Some(set) = current_set {
            self.defined.entry(set.to_string()).or_default().insert(name.to_string());
        }
        done()
    }
}

pub(super) fn parse_key_sets<'d>(
    ctx: &Ctx<'d, '_>,
    pkg: &mut PackageBuilder,
    cursor: &mut XmlCursor<'d>,
) -> Step {
    let mut state = KeySetState::default();

    walk_children(cursor, "<key-sets>", ctx.policy, |tag, cursor| match tag {
        "key-set" => Some(parse_key_set(ctx, &mut state, cursor)),
        "public-key" => Some(state.public_key(ctx, cursor, None)),
        "upgrade-key-set" => {
            if let Some(name) = ctx.attrs(cursor).non_resource_string("name") {
                state.upgrade.insert(name.to_string());
            }
            Some(done())
        }
        _ => None,
    })?;

    finalize(pkg, state)?;
    done()
}

fn parse_key_set<'d>(ctx: &Ctx<'d, '_>, state: &mut KeySetState, cursor: &mut XmlCursor<'d>) -> Step {
    let Some(set_name) = ctx.attrs(cursor).non_resource_string("name") else {
        cursor.skip_subtree();
        return skipped("'key-set' without a name");
    };
    if state.defined.contains_key(set_name) {
        warn!(
            "'key-set' {} already defined at {}",
            set_name,
            cursor.position_description()
        );
        cursor.skip_subtree();
        return skipped("duplicate key-set");
    }
    state.defined.insert(set_name.to_string(), BTreeSet::new());

    walk_children(cursor, "<key-set>", ctx.policy, |tag, cursor| match tag {
        "public-key" => Some(state.public_key(ctx, cursor, Some(set_name))),
        "key-set" => Some(Err(ParseError::malformed(format!(
            "Improperly nested 'key-set' tag at {}",
            cursor.position_description()
        )))),
        _ => None,
    })?;
    done()
}

fn finalize(pkg: &mut PackageBuilder, state: KeySetState) -> ParseResult<()> {
    let KeySetState {
        public_keys,
        defined,
        mut improper,
        upgrade,
    } = state;

    if public_keys.keys().any(|key| defined.contains_key(key)) {
        return Err(ParseError::malformed(format!(
            "Package {} AndroidManifest.xml 'key-set' and 'public-key' names must be distinct.",
            pkg.package_name()
        )));
    }

    for (set_name, key_names) in defined {
        if key_names.is_empty() {
            warn!(
                "Package {} AndroidManifest.xml 'key-set' {} has no valid associated 'public-key'. Not including in package's defined key-sets.",
                pkg.package_name(),
                set_name
            );
            continue;
        }
        let keys: Option<BTreeSet<String>> = key_names
            .iter()
            .map(|key| public_keys.get(key).cloned())
            .collect();
        match keys {
            Some(keys) if !improper.contains(&set_name) => {
                pkg.key_sets.insert(set_name, keys);
            }
            _ => {
                warn!(
                    "Package {} AndroidManifest.xml 'key-set' {} contained improper 'public-key' tags. Not including in package's defined key-sets.",
                    pkg.package_name(),
                    set_name
                );
                improper.insert(set_name);
            }
        }
    }

    if !upgrade.iter().all(|name| pkg.key_sets.contains_key(name)) {
        return Err(ParseError::malformed(format!(
            "Package {} AndroidManifest.xml does not define all 'upgrade-key-set's .",
            pkg.package_name()
        )));
    }
    pkg.upgrade_key_sets = upgrade;
    Ok(())
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
    const KEY_A: &str = "AAECAwQF";
    const KEY_B: &str = "BgcICQoL";

    fn parse(body: &str) -> ParseResult<PackageBuilder> {
        let archive = MemoryArchive::new("/t.apk");
        let platform = Platform::default();
        let ctx = Ctx {
            res: &archive,
            platform: &platform,
            callback: &platform,
            policy: UnknownTagPolicy::Lenient,
            flags: ParseFlags::empty(),
        };
        let doc = XmlDocument::parse(&format!("<key-sets {NS}>{body}</key-sets>")).unwrap();
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let mut pkg = PackageBuilder::new("com.example", Path::new("/t.apk"), Path::new("/t.apk"));
        parse_key_sets(&ctx, &mut pkg, &mut cursor)?;
        Ok(pkg)
    }

    #[test]
    fn test_public_key_normalization() {
        assert_eq!(parse_public_key(" AAEC\n AwQF ").as_deref(), Some(KEY_A));
        assert_eq!(parse_public_key("not base64!"), None);
        assert_eq!(parse_public_key(""), None);
    }

    #[test]
    fn test_sets_and_upgrade_sets() {
        let pkg = parse(&format!(
            r#"<key-set android:name="release">
                 <public-key android:name="k1" android:value="{KEY_A}"/>
                 <public-key android:name="k2" android:value="{KEY_B}"/>
               </key-set>
               <key-set android:name="reuse"><public-key android:name="k1"/></key-set>
               <upgrade-key-set android:name="release"/>"#
        ))
        .unwrap();
        assert_eq!(pkg.key_sets["release"].len(), 2);
        assert_eq!(pkg.key_sets["reuse"].iter().next().map(String::as_str), Some(KEY_A));
        assert!(pkg.upgrade_key_sets.contains("release"));
    }

    #[test]
    fn test_key_without_value_excludes_set() {
        let pkg = parse(r#"<key-set android:name="broken"><public-key android:name="nokey"/></key-set>"#).unwrap();
        assert!(pkg.key_sets.is_empty());
    }

    #[test]
    fn test_conflicting_key_value() {
        let err = parse(&format!(
            r#"<public-key android:name="k1" android:value="{KEY_A}"/>
               <public-key android:name="k1" android:value="{KEY_B}"/>"#
        ))
        .unwrap_err();
        assert!(err.message().starts_with("Value of 'public-key' k1 conflicts"));
    }

    #[test]
    fn test_nested_key_set() {
        let err = parse(r#"<key-set android:name="a"><key-set android:name="b"/></key-set>"#).unwrap_err();
        assert!(err.message().starts_with("Improperly nested 'key-set' tag at"));
    }

    #[test]
    fn test_names_must_be_distinct() {
        let err = parse(&format!(
            r#"<key-set android:name="dup"><public-key android:name="dup" android:value="{KEY_A}"/></key-set>"#
        ))
        .unwrap_err();
        assert_eq!(
            err.message(),
            "Package com.example AndroidManifest.xml 'key-set' and 'public-key' names must be distinct."
        );
    }

    #[test]
    fn test_undefined_upgrade_set() {
        let err = parse(r#"<upgrade-key-set android:name="missing"/>"#).unwrap_err();
        assert_eq!(
            err.message(),
            "Package com.example AndroidManifest.xml does not define all 'upgrade-key-set's ."
        );
    }
}
