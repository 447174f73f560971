//! Identifier rules for package, split, class and process names

use crate::config::Platform;
use crate::document::XmlCursor;
use crate::result::{ErrorCode, ParseError, ParseResult};

/// Longest package name that still fits in a data directory name
pub const MAX_FILE_NAME_SIZE: usize = 223;

/// Validate a dotted identifier
///
/// Each segment starts with an ASCII letter; digits and `_` may follow.
/// Returns the rejection reason on failure.
pub fn validate_name(name: &str, require_separator: bool, require_filename: bool) -> Result<(), String> {
    let mut has_sep = false;
    let mut front = true;
    for c in name.chars() {
        if c.is_ascii_alphabetic() {
            front = false;
            continue;
        }
        if !front && (c.is_ascii_digit() || c == '_') {
            continue;
        }
        if c == '.' {
            has_sep = true;
            front = true;
            continue;
        }
        return Err(format!("bad character '{}'", c));
    }

    if require_filename {
        if !is_valid_filename(name) {
            return Err("Invalid filename".to_string());
        }
        if name.len() > MAX_FILE_NAME_SIZE {
            return Err(format!(
                "the length of the name is greater than {}",
                MAX_FILE_NAME_SIZE
            ));
        }
    }

    if has_sep || !require_separator {
        Ok(())
    } else {
        Err("must have at least one '.' separator".to_string())
    }
}

fn is_valid_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && name.len() <= 255
}

/// Package and split name of the root tag at the cursor
///
/// The root must be `<manifest>`. The reserved platform package `android` is
/// exempt from the format check; an empty `split` means the base file.
pub fn parse_package_split_names(cursor: &XmlCursor<'_>) -> ParseResult<(String, Option<String>)> {
    if cursor.name() != "manifest" {
        return Err(ParseError::malformed("No <manifest> tag"));
    }
    let attrs = cursor.attributes();
    let unqualified = |name: &str| {
        attrs
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    };

    let Some(package) = unqualified("package") else {
        return Err(ParseError::new(
            ErrorCode::BadPackageName,
            "<manifest> does not specify package",
        ));
    };
    if package != "android" {
        validate_name(package, true, true).map_err(|err| {
            ParseError::new(
                ErrorCode::BadPackageName,
                format!("Invalid manifest package: {}", err),
            )
        })?;
    }

    let split = match unqualified("split") {
        None | Some("") => None,
        Some(split) => {
            validate_name(split, false, false).map_err(|err| {
                ParseError::new(
                    ErrorCode::BadPackageName,
                    format!("Invalid manifest split: {}", err),
                )
            })?;
            Some(split.to_string())
        }
    };
    Ok((package.to_string(), split))
}

/// Qualify a component class name against its package
pub fn build_class_name(package: &str, class: &str) -> ParseResult<String> {
    if class.is_empty() {
        return Err(ParseError::malformed(format!(
            "Empty class name in package {}",
            package
        )));
    }
    if class.starts_with('.') {
        Ok(format!("{}{}", package, class))
    } else if !class.contains('.') {
        Ok(format!("{}.{}", package, class))
    } else {
        Ok(class.to_string())
    }
}

/// Resolve a `:private` or global process-like name
fn build_compound_name(package: &str, name: &str, kind: &str) -> ParseResult<String> {
    if let Some(sub) = name.strip_prefix(':') {
        if name.len() < 2 {
            return Err(ParseError::malformed(format!(
                "Bad {} name {} in package {}: must be at least two characters",
                kind, name, package
            )));
        }
        validate_name(sub, false, false).map_err(|err| {
            ParseError::malformed(format!(
                "Invalid {} name {} in package {}: {}",
                kind, name, package, err
            ))
        })?;
        return Ok(format!("{}{}", package, name));
    }

    if name != "system" {
        validate_name(name, true, false).map_err(|err| {
            ParseError::malformed(format!(
                "Invalid {} name {} in package {}: {}",
                kind, name, package, err
            ))
        })?;
    }
    Ok(name.to_string())
}

/// Process a component or application runs in
///
/// `default_process` is the enclosing scope's process (the application's
/// for components, `None` at application level).
pub fn build_process_name(
    package: &str,
    default_process: Option<&str>,
    process: Option<&str>,
    ignore_processes: bool,
    platform: &Platform,
) -> ParseResult<Option<String>> {
    if ignore_processes && process != Some("system") {
        return Ok(Some(default_process.unwrap_or(package).to_string()));
    }

    let separate = platform.separate_processes.iter().any(|sp| {
        sp == "*" || sp == package || Some(sp.as_str()) == default_process || Some(sp.as_str()) == process
    });
    if separate {
        return Ok(Some(package.to_string()));
    }

    match process {
        None | Some("") => Ok(default_process.map(str::to_string)),
        Some(name) => build_compound_name(package, name, "process").map(Some),
    }
}

/// Task affinity; an explicit empty value means no affinity
pub fn build_task_affinity_name(
    package: &str,
    default_affinity: Option<&str>,
    affinity: Option<&str>,
) -> ParseResult<Option<String>> {
    match affinity {
        None => Ok(default_affinity.map(str::to_string)),
        Some("") => Ok(None),
        Some(name) => build_compound_name(package, name, "taskAffinity").map(Some),
    }
}
