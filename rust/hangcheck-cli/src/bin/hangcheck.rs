//! Hangcheck CLI: find promises and deferreds that can finish without settling.

use clap::{Parser as ClapParser, Subcommand};
use hangcheck_analyzer::{RuleId, Rules};
use hangcheck_cli::check::{self, OutputFormat, Summary};
use hangcheck_cli::colors::{self, bold, maybe, red, status_label};
use hangcheck_cli::config::{HangcheckConfig, CONFIG_FILE};
use std::io::Write;
use std::path::PathBuf;
use strum::IntoEnumIterator;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "hangcheck", version, about = "Find promises and deferreds that never settle")]
struct Cli {
    /// Log analysis decisions (overrides HANGCHECK_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check JavaScript files, directories or glob patterns
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,

        /// Config file (default: nearest hangcheck.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Create a hangcheck.toml config file in the current directory
    Init,
    /// List the rules and their default severities
    Rules,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { paths, format, config, no_color } => cmd_check(&paths, format, config, no_color),
        Commands::Init => cmd_init(),
        Commands::Rules => cmd_rules(),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HANGCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn fail(color: bool, message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", maybe(color, red, "error:"), message);
    std::process::exit(1);
}

fn cmd_check(paths: &[PathBuf], format: OutputFormat, config: Option<PathBuf>, no_color: bool) {
    let color = format == OutputFormat::Plain && colors::enabled(no_color);
    let config = match &config {
        Some(path) => HangcheckConfig::load_from(path),
        None => HangcheckConfig::load(),
    }
    .unwrap_or_else(|e| fail(color, e));
    let rules = Rules::from_config(&config.analyzer).unwrap_or_else(|e| fail(color, e));

    let reports = check::check_paths(paths, &config.files, &rules).unwrap_or_else(|e| fail(color, e));
    let summary = Summary::of(&reports);
    info!(files = summary.files, findings = summary.findings, "check finished");

    match format {
        OutputFormat::Plain => print!("{}", check::render_plain(&reports, color)),
        OutputFormat::Json => match check::render_json(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(color, e),
        },
    }
    let _ = std::io::stdout().flush();
    std::process::exit(summary.exit_code());
}

fn cmd_init() {
    let color = colors::enabled(false);
    let dir = std::env::current_dir().unwrap_or_else(|e| fail(color, e));
    match HangcheckConfig::init(&dir) {
        Ok(_) => println!("{} {}", maybe(color, status_label, "Created"), CONFIG_FILE),
        Err(e) => fail(color, e),
    }
}

fn cmd_rules() {
    let color = colors::enabled(false);
    for rule in RuleId::iter() {
        let severity = format!("{:?}", rule.default_severity()).to_lowercase();
        let name = format!("{:<24}", rule.as_ref());
        println!("{} {:<8} {}", maybe(color, bold, &name), severity, rule.description());
    }
}
