//! Cross-file validation of a package cluster
//!
//! Files of one package must agree on package name and version code, carry
//! unique split names, and include exactly one base file. Splits are ordered
//! by name; that order defines the split indices used everywhere else.

use crate::model::{ApkLite, PackageLite};
use crate::result::{ErrorCode, ParseError, ParseResult};
use crate::signing;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use std::collections::BTreeMap;
use std::path::Path;

/// Accumulates per-file identities and enforces cluster invariants
#[derive(Debug, Default)]
pub struct ClusterBuilder {
    identity: Option<(String, i32)>,
    base: Option<ApkLite>,
    // BTreeMap keeps split names in lexicographic order
    splits: BTreeMap<String, ApkLite>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.splits.is_empty()
    }

    /// Add one file; the first file seen fixes package name and version
    pub fn add(&mut self, lite: ApkLite) -> ParseResult<()> {
        match &self.identity {
            None => {
                self.identity = Some((lite.package_name.clone(), lite.version_code));
            }
            Some((package, version)) => {
                if *package != lite.package_name {
                    return Err(ParseError::new(
                        ErrorCode::BadManifest,
                        format!(
                            "Inconsistent package {} in {}; expected {}",
                            lite.package_name,
                            lite.path.display(),
                            package
                        ),
                    ));
                }
                if *version != lite.version_code {
                    return Err(ParseError::new(
                        ErrorCode::BadManifest,
                        format!(
                            "Inconsistent version {} in {}; expected {}",
                            lite.version_code,
                            lite.path.display(),
                            version
                        ),
                    ));
                }
            }
        }

        let duplicate = match &lite.split_name {
            None => self.base.is_some(),
            Some(name) => self.splits.contains_key(name),
        };
        if duplicate {
            let name = lite.split_name.as_deref().unwrap_or("null");
            return Err(ParseError::new(
                ErrorCode::BadManifest,
                format!(
                    "Split name {} defined more than once; most recent was {}",
                    name,
                    lite.path.display()
                ),
            ));
        }

        match lite.split_name.clone() {
            None => self.base = Some(lite),
            Some(name) => {
                self.splits.insert(name, lite);
            }
        }
        Ok(())
    }

    /// Compose the validated topology for the package directory
    pub fn build(self, dir: &Path) -> ParseResult<PackageLite> {
        let Some(base) = self.base else {
            return Err(ParseError::new(
                ErrorCode::BadManifest,
                format!("Missing base APK in {}", dir.display()),
            ));
        };
        if base.signing_details.has_signatures() {
            for split in self.splits.values() {
                signing::ensure_consistent(&base.signing_details, &split.signing_details, &split.path)?;
            }
        }
        Ok(PackageLite::compose(dir, base, self.splits.into_values().collect()))
    }
}

/// Dependency table for isolated split loading
///
/// Index 0 is the base with parent `-1`; split `i` has index `i + 1`. A
/// feature split's first entry is the split it extends. Config splits are
/// appended to the entry of the feature split they configure.
pub fn split_dependencies(lite: &PackageLite) -> ParseResult<BTreeMap<usize, Vec<i32>>> {
    let names = &lite.split_names;
    let malformed = |message: String| ParseError::new(ErrorCode::BadManifest, message);

    let mut deps: BTreeMap<usize, Vec<i32>> = BTreeMap::new();
    deps.insert(0, vec![-1]);

    for (i, name) in names.iter().enumerate() {
        if !lite.is_feature_split[i] {
            continue;
        }
        let parent = match &lite.uses_split_names[i] {
            Some(dependency) => match names.binary_search(dependency) {
                Ok(idx) => idx as i32 + 1,
                Err(_) => {
                    return Err(malformed(format!(
                        "Split '{}' requires split '{}', which is missing.",
                        name, dependency
                    )))
                }
            },
            None => 0,
        };
        deps.insert(i + 1, vec![parent]);
    }

    for (i, name) in names.iter().enumerate() {
        if lite.is_feature_split[i] {
            continue;
        }
        let target = match &lite.config_for_split[i] {
            Some(target) => {
                let idx = names.binary_search(target).map_err(|_| {
                    malformed(format!(
                        "Split '{}' targets split '{}', which is missing.",
                        name, target
                    ))
                })?;
                if !lite.is_feature_split[idx] {
                    return Err(malformed(format!(
                        "Split '{}' declares itself as configuration split for a non-feature split '{}'",
                        name, names[idx]
                    )));
                }
                idx + 1
            }
            None => 0,
        };
        deps.entry(target).or_default().push(i as i32 + 1);
    }

    // Parent links must form a forest rooted at the base
    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<_> = (0..=names.len()).map(|i| graph.add_node(i)).collect();
    for (&idx, entry) in &deps {
        if let Some(&parent) = entry.first() {
            if parent >= 0 {
                graph.add_edge(nodes[idx], nodes[parent as usize], ());
            }
        }
    }
    if is_cyclic_directed(&graph) {
        return Err(malformed("Cycle detected in split dependencies.".to_string()));
    }

    Ok(deps)
}
