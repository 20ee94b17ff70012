//! lineage: print the true-parent process tree of a macOS system
//!
//! Usage:
//!   sudo lineage                         # True-parent tree of the live system
//!   lineage --snapshot capture.json      # Analyze a saved snapshot offline
//!   sudo lineage --timeline              # Every process, oldest first
//!
//! Output formats:
//!   (default)   Box-drawing tree
//!   --flat      Pre-order listing without connectors
//!   --timeline  Flat listing sorted by start time
//!   --json      Nested JSON

use clap::Parser;
use lineage_core::render::{self, StyleClass, Styler};
use lineage_core::{
    build_tree, BuildOptions, Collection, LineageError, ProcessRecordSource, RenderOptions,
    Snapshot, SnapshotSource, TreeMode,
};
use lineage_platform_macos::{
    escalate, escalation_attempted, is_elevated, LiveSource, PlatformError,
    LIVE_COLLECTION_SUPPORTED,
};
use owo_colors::{OwoColorize, Style};
use std::path::PathBuf;
use thiserror::Error;

mod output;

/// Default file name when -o is given without a value
const DEFAULT_OUTPUT_FILE: &str = "lineage_output.txt";

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ERROR_GENERAL: i32 = 1;
    /// Also what clap exits with on usage errors
    #[allow(dead_code)]
    pub const ERROR_INVALID_INPUT: i32 = 2;
    pub const ERROR_ROOT_MISSING: i32 = 3;
    pub const ERROR_PRIVILEGE: i32 = 4;
}

/// Configuration file support
mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::PathBuf;

    /// User configuration from ~/.lineage/config.toml
    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Config {
        /// Default output settings
        pub output: OutputConfig,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct OutputConfig {
        pub no_color: bool,
        pub timestamps: bool,
        /// Show where each parent came from
        pub sources: bool,
        pub no_pid: bool,
        pub no_path: bool,
        pub no_network: bool,
        pub json: bool,
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".lineage").join("config.toml"))
    }

    /// Load configuration from file
    pub fn load_config() -> Config {
        let Some(path) = config_path() else {
            return Config::default();
        };

        if !path.exists() {
            return Config::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => parse_config(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Config::default()
            }),
            Err(e) => {
                log::warn!("Could not read config {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }

    /// Generate a sample config file content
    pub fn sample_config() -> &'static str {
        r#"# lineage configuration file
# Place this file at ~/.lineage/config.toml
# Settings here can only switch options on; command line flags do the same.

[output]
# Disable colored output
no_color = false
# Include process start timestamps
timestamps = false
# Show where each process's parent came from
sources = false
# Do not print the pid next to each process
no_pid = false
# Print process names instead of full paths
no_path = false
# Do not print network connections
no_network = false
# Use JSON output by default
json = false
"#
    }

}

/// Print the true-parent process tree of a macOS system
///
/// Parents are taken from launchd submission records, launch descriptors and
/// responsible processes before falling back to the kernel's parent PID.
#[derive(Parser, Debug)]
#[command(name = "lineage")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  sudo lineage                         True-parent tree of the live system
  sudo lineage --sources --timestamps  Show where each parent came from
  sudo lineage --standard              Tree built from raw parent PIDs only
  sudo lineage --timeline              All processes ordered by start time
  sudo lineage -o                      Write to lineage_output.txt
  sudo lineage --save-snapshot s.json  Save the collected records
  lineage --snapshot s.json --json     Analyze a saved snapshot as JSON")]
struct Cli {
    /// Do not color code items in output
    #[arg(long)]
    no_color: bool,

    /// Include process start timestamps
    #[arg(long)]
    timestamps: bool,

    /// Show the source each process's parent was acquired from
    #[arg(long)]
    sources: bool,

    /// Print process names instead of full paths
    #[arg(long)]
    no_path: bool,

    /// Do not print the pid next to each process
    #[arg(long)]
    no_pid: bool,

    /// Do not print network connections
    #[arg(long)]
    no_network: bool,

    /// Print all processes sorted by creation time (no tree)
    #[arg(long, conflicts_with_all = ["flat", "json"])]
    timeline: bool,

    /// Print the tree in pre-order without connectors
    #[arg(long, conflicts_with = "json")]
    flat: bool,

    /// Build the standard Unix tree from parent PIDs instead of true parents
    #[arg(long)]
    standard: bool,

    /// Output the tree as JSON
    #[arg(long, short = 'j')]
    json: bool,

    /// Write output to a file instead of stdout
    #[arg(
        long,
        short = 'o',
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_OUTPUT_FILE
    )]
    output: Option<PathBuf>,

    /// Read process records from a saved JSON snapshot instead of the live system
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Save the collected process records as a JSON snapshot
    #[arg(long, value_name = "FILE")]
    save_snapshot: Option<PathBuf>,

    /// Generate a sample config file at ~/.lineage/config.toml
    #[arg(long)]
    init_config: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Config values can switch options on, never off
    fn apply_config(&mut self, cfg: &config::Config) {
        let out = &cfg.output;
        self.no_color |= out.no_color;
        self.timestamps |= out.timestamps;
        self.sources |= out.sources;
        self.no_pid |= out.no_pid;
        self.no_path |= out.no_path;
        self.no_network |= out.no_network;
        // A timeline or flat listing asked for on the command line wins
        self.json |= out.json && !self.timeline && !self.flat;
    }

    fn tree_mode(&self) -> TreeMode {
        if self.standard {
            TreeMode::Standard
        } else {
            TreeMode::TrueTree
        }
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            network: !self.no_network,
        }
    }

    fn render_options(&self, color: bool) -> RenderOptions {
        RenderOptions {
            color,
            full_path: !self.no_path,
            show_pid: !self.no_pid,
            show_evidence: self.sources,
            show_timestamps: self.timestamps,
            tree: !self.flat,
        }
    }
}

/// Color configuration for output
struct Colors {
    enabled: bool,
    success: Style,
    warning: Style,
    error: Style,
    info: Style,
    connector: Style,
    pid: Style,
    timestamp: Style,
    evidence: Style,
    terminated: Style,
    launch_origin: Style,
    network: Style,
    exec_marker: Style,
}

impl Colors {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                enabled: true,
                success: Style::new().green(),
                warning: Style::new().yellow(),
                error: Style::new().red().bold(),
                info: Style::new().cyan(),
                connector: Style::new().dimmed(),
                pid: Style::new().magenta(),
                timestamp: Style::new().cyan(),
                evidence: Style::new().red(),
                terminated: Style::new().red(),
                launch_origin: Style::new().blue(),
                network: Style::new().yellow(),
                exec_marker: Style::new().yellow(),
            }
        } else {
            Self {
                enabled: false,
                success: Style::new(),
                warning: Style::new(),
                error: Style::new(),
                info: Style::new(),
                connector: Style::new(),
                pid: Style::new(),
                timestamp: Style::new(),
                evidence: Style::new(),
                terminated: Style::new(),
                launch_origin: Style::new(),
                network: Style::new(),
                exec_marker: Style::new(),
            }
        }
    }
}

impl Styler for Colors {
    fn paint(&self, class: StyleClass, text: &str) -> String {
        let style = match class {
            StyleClass::ProcessPath => return text.to_string(),
            StyleClass::Connector => self.connector,
            StyleClass::Terminated => self.terminated,
            StyleClass::Pid => self.pid,
            StyleClass::Timestamp => self.timestamp,
            StyleClass::Evidence => self.evidence,
            StyleClass::LaunchOrigin => self.launch_origin,
            StyleClass::Network => self.network,
            StyleClass::ExecMarker => self.exec_marker,
        };
        text.style(style).to_string()
    }
}

/// Errors that end the run
#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Core(#[from] LineageError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Could not serialize JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Core(e) if e.is_root_missing() => exit_codes::ERROR_ROOT_MISSING,
            AppError::Platform(PlatformError::NotElevated)
            | AppError::Platform(PlatformError::EscalationFailed(_)) => {
                exit_codes::ERROR_PRIVILEGE
            }
            _ => exit_codes::ERROR_GENERAL,
        }
    }
}

fn main() {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    // Load configuration file (flags and file can only enable options)
    let cfg = config::load_config();
    cli.apply_config(&cfg);

    // Status messages go to stderr, so only stderr matters for their color
    let colors = Colors::new(!cli.no_color && supports_color(atty::Stream::Stderr));

    if cli.init_config {
        std::process::exit(handle_init_config(&colors));
    }

    let code = match run(&cli, &colors) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("Run failed: {:?}", e);
            print_error(&colors, &e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Collect, build and print. Returns the exit code on success.
fn run(cli: &Cli, colors: &Colors) -> Result<i32, AppError> {
    let collection = match &cli.snapshot {
        Some(path) => SnapshotSource::new(path).collect()?,
        None => {
            if let Some(code) = ensure_elevated(colors)? {
                return Ok(code);
            }
            LiveSource::new().collect()?
        }
    };
    report_failures(&collection);
    let records = collection.records;

    if let Some(path) = &cli.save_snapshot {
        match Snapshot::new(&records).save(path) {
            Ok(()) => print_success(
                colors,
                &format!("Saved {} records to {}", records.len(), path.display()),
            ),
            Err(e) => {
                log::error!("{}", e);
                print_error(colors, &e.to_string());
            }
        }
    }

    // Missing root aborts before anything is printed, timeline included
    let built = build_tree(&records, cli.tree_mode(), &cli.build_options())?;
    log::info!(
        "Built tree: {} nodes, {} attached, {} dropped, {} exec markers, {} launch origins, {} network leaves",
        built.forest.node_count(),
        built.stats.attached,
        built.stats.dropped,
        built.stats.exec_markers,
        built.stats.launch_origins,
        built.stats.network_leaves
    );

    let tree_colors = Colors::new(
        !cli.no_color && cli.output.is_none() && supports_color(atty::Stream::Stdout),
    );
    let options = cli.render_options(tree_colors.enabled);

    let text = if cli.json {
        let mut json = render::render_json_string(&built.forest)?;
        json.push('\n');
        json
    } else if cli.timeline {
        render::render_timeline(&records, &options, &tree_colors)
    } else {
        render::render_forest(&built.forest, &options, &tree_colors)
    };

    emit(cli, colors, &text);
    Ok(exit_codes::SUCCESS)
}

/// Make sure live collection can see every process.
///
/// Returns the exit code of the escalated child when the run was handed
/// over to sudo.
fn ensure_elevated(colors: &Colors) -> Result<Option<i32>, AppError> {
    if !LIVE_COLLECTION_SUPPORTED {
        return Err(PlatformError::Unsupported.into());
    }
    if is_elevated() {
        return Ok(None);
    }
    if escalation_attempted() {
        return Err(PlatformError::NotElevated.into());
    }

    print_info(
        colors,
        "Root is required to view all process information; re-running with sudo",
    );
    let status = escalate()?;
    Ok(Some(status.code().unwrap_or(exit_codes::ERROR_PRIVILEGE)))
}

fn report_failures(collection: &Collection) {
    if collection.failures.is_empty() {
        return;
    }
    log::warn!(
        "Skipped {} processes that could not be read",
        collection.failures.len()
    );
}

/// Write the rendered text. Failures are reported but do not change the exit code.
fn emit(cli: &Cli, colors: &Colors, text: &str) {
    match &cli.output {
        Some(path) => match output::write_atomic(path, text) {
            Ok(()) => print_success(colors, &format!("Output written to {}", path.display())),
            Err(e) => {
                log::error!("{}", e);
                print_error(colors, &e.to_string());
            }
        },
        None => {
            if let Err(e) = output::write_stdout(text) {
                log::error!("Could not write to stdout: {}", e);
                print_error(colors, &format!("Could not write to stdout: {}", e));
            }
        }
    }
}

/// Handle --init-config flag
fn handle_init_config(colors: &Colors) -> i32 {
    use std::fs;

    let Some(config_path) = config::config_path() else {
        print_error(colors, "Could not determine home directory");
        return exit_codes::ERROR_GENERAL;
    };

    // Create directory if it doesn't exist
    if let Some(parent) = config_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            print_error(colors, &format!("Failed to create config directory: {}", e));
            return exit_codes::ERROR_GENERAL;
        }
    }

    if config_path.exists() {
        print_warning(
            colors,
            &format!("Config file already exists at: {}", config_path.display()),
        );
        eprintln!("Use a text editor to modify it, or delete it first to regenerate.");
        return exit_codes::SUCCESS;
    }

    match fs::write(&config_path, config::sample_config()) {
        Ok(()) => {
            print_success(
                colors,
                &format!("Created config file at: {}", config_path.display()),
            );
            exit_codes::SUCCESS
        }
        Err(e) => {
            print_error(colors, &format!("Failed to write config file: {}", e));
            exit_codes::ERROR_GENERAL
        }
    }
}

/// Print an error message
fn print_error(colors: &Colors, message: &str) {
    eprintln!("{} {}", "error:".style(colors.error), message);
}

/// Print a warning message
fn print_warning(colors: &Colors, message: &str) {
    eprintln!("{} {}", "warning:".style(colors.warning), message);
}

/// Print an info message
fn print_info(colors: &Colors, message: &str) {
    eprintln!("{} {}", "info:".style(colors.info), message);
}

fn print_success(colors: &Colors, message: &str) {
    eprintln!("{} {}", "success:".style(colors.success), message);
}

/// Check if the given stream supports color
fn supports_color(stream: atty::Stream) -> bool {
    // Check for common NO_COLOR convention
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    atty::is(stream)
}
