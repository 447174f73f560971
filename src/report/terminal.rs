use super::{FailureSummary, Outcome, PackageSummary};
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// List component class names under each package
    show_components: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            show_components: true,
        }
    }

    pub fn with_components(mut self, show: bool) -> Self {
        self.show_components = show;
        self
    }

    pub fn report(&self, outcomes: &[Outcome]) -> Result<()> {
        if outcomes.is_empty() {
            println!("{}", "No packages given.".yellow());
            return Ok(());
        }

        println!();
        for outcome in outcomes {
            println!("{}", outcome.path.display().to_string().cyan().bold());
            match (&outcome.package, &outcome.error) {
                (_, Some(failure)) => self.print_failure(failure),
                (Some(package), None) => self.print_package(package),
                (None, None) => {}
            }
            println!();
        }

        self.print_summary(outcomes);
        Ok(())
    }

    fn print_failure(&self, failure: &FailureSummary) {
        println!(
            "  {} [{}] {}",
            "error".red().bold(),
            failure.code.dimmed(),
            failure.message
        );
    }

    fn print_package(&self, package: &PackageSummary) {
        let version = match &package.version_name {
            Some(name) => format!("{} ({})", package.version_code, name),
            None => package.version_code.to_string(),
        };
        println!(
            "  {} {} {}",
            "✓".green().bold(),
            package.package_name.white().bold(),
            version.dimmed()
        );

        let sdk = match package.min_sdk_version {
            Some(min) => format!("minSdk {} targetSdk {}", min, package.target_sdk_version),
            None => format!("targetSdk {}", package.target_sdk_version),
        };
        println!("    {} {}", "→".dimmed(), sdk);

        if !package.splits.is_empty() {
            println!("    {} splits: {}", "→".dimmed(), package.splits.join(", "));
        }
        if package.debuggable {
            println!("    {} {}", "→".dimmed(), "debuggable".yellow());
        }
        if package.signers > 0 {
            println!("    {} {} signer(s)", "→".dimmed(), package.signers);
        }

        if self.show_components {
            let groups = [
                ("activity", &package.activities),
                ("service", &package.services),
                ("receiver", &package.receivers),
                ("provider", &package.providers),
                ("permission", &package.requested_permissions),
            ];
            for (kind, names) in groups {
                for name in names.iter() {
                    println!("      {} {}", kind.dimmed(), name);
                }
            }
        }
    }

    fn print_summary(&self, outcomes: &[Outcome]) {
        let parsed = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - parsed;

        println!("{}", "─".repeat(60).dimmed());

        let mut parts = Vec::new();
        if parsed > 0 {
            parts.push(format!("{} parsed", parsed).green().to_string());
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed).red().to_string());
        }
        println!("Summary: {}", parts.join(", "));
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
