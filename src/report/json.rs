use super::Outcome;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, outcomes: &[Outcome]) -> Result<()> {
        let report = JsonReport::from_outcomes(outcomes);
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    total: usize,
    summary: JsonSummary,
    results: &'a [Outcome],
}

#[derive(Serialize)]
struct JsonSummary {
    parsed: usize,
    failed: usize,
    splits: usize,
}

impl<'a> JsonReport<'a> {
    fn from_outcomes(outcomes: &'a [Outcome]) -> Self {
        let parsed = outcomes.iter().filter(|o| o.is_success()).count();
        let splits = outcomes
            .iter()
            .filter_map(|o| o.package.as_ref())
            .map(|p| p.splits.len())
            .sum();

        Self {
            version: "1.0",
            total: outcomes.len(),
            summary: JsonSummary {
                parsed,
                failed: outcomes.len() - parsed,
                splits,
            },
            results: outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ErrorCode, ParseError};
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_report_written_to_file() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("report.json");
        let outcomes = vec![Outcome::from_lite(
            Path::new("/bad.apk"),
            Err(ParseError::new(ErrorCode::NotApk, "Failed to parse /bad.apk")),
        )];

        JsonReporter::new(Some(out.clone())).report(&outcomes).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["results"][0]["error"]["code"], "INSTALL_PARSE_FAILED_NOT_APK");
        assert!(value["results"][0].get("package").is_none());
    }
}
