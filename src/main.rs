use apkparse::config::Config;
use apkparse::report::{Outcome, ReportFormat, Reporter};
use apkparse::{Locator, MetaInfCollector, PackageParser, ParseFlags, UnknownTagPolicy, ZipOpener};
use clap::Parser;
use miette::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// apkparse - Locate, parse and validate Android package manifests
#[derive(Parser, Debug)]
#[command(name = "apkparse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Package files or package directories (base + splits)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (defaults to the config file's choice)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (for json format)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only locate packages: read identities and validate the split topology
    #[arg(long)]
    lite: bool,

    /// Fail on unknown manifest elements instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Collect signer certificates and require all files to agree
    #[arg(long)]
    collect_certificates: bool,

    /// Treat packages as coming from a trusted system directory
    #[arg(long)]
    system_dir: bool,

    /// Require classes.dex in every file that declares code
    #[arg(long)]
    enforce_code: bool,

    /// Platform SDK version to validate against
    #[arg(long, value_name = "LEVEL")]
    sdk: Option<i32>,

    /// Do not list components in terminal output
    #[arg(long)]
    no_components: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    info!("apkparse v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&cli)?;
    let format = report_format(&cli, &config)?;

    let outcomes = run(&config, &cli);

    Reporter::new(format, cli.output.clone())
        .with_components(config.report.show_components && !cli.no_components)
        .report(&outcomes)?;

    if outcomes.iter().any(|o| !o.is_success()) {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations
        Config::from_default_locations(Path::new("."))?
    };

    // Override with CLI arguments
    config.parser.strict |= cli.strict;
    config.parser.collect_certificates |= cli.collect_certificates;
    config.parser.system_dir |= cli.system_dir;
    config.parser.enforce_code |= cli.enforce_code;
    if let Some(sdk) = cli.sdk {
        config.platform.sdk_version = sdk;
    }

    Ok(config)
}

fn report_format(cli: &Cli, config: &Config) -> Result<ReportFormat> {
    if let Some(format) = cli.format {
        return Ok(format.into());
    }
    ReportFormat::from_name(&config.report.format)
        .ok_or_else(|| miette::miette!("Unknown report format in config: {}", config.report.format))
}

fn run(config: &Config, cli: &Cli) -> Vec<Outcome> {
    let opener = ZipOpener;
    let verifier = MetaInfCollector;
    let flags = ParseFlags::from_config(&config.parser);
    let policy = if config.parser.strict {
        UnknownTagPolicy::Strict
    } else {
        UnknownTagPolicy::Lenient
    };

    info!("Processing {} path(s)", cli.paths.len());

    // Each parse owns its builder and diagnostics; only the platform is shared
    cli.paths
        .par_iter()
        .map(|path| {
            let outcome = if cli.lite {
                let locator = Locator::new(&opener, &config.platform, &verifier);
                Outcome::from_lite(path, locator.locate(path, flags))
            } else {
                let parser = PackageParser::new(&config.platform, &opener, &verifier).with_policy(policy);
                Outcome::from_package(path, parser.parse_package(path, flags))
            };
            if let Some(error) = &outcome.error {
                debug!("{} failed: {}", path.display(), error.message);
            }
            outcome
        })
        .collect()
}
