//! Clap derive structures for the `iotdash` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// iotdash -- devices, relays and motion sensors from the command line
#[derive(Debug, Parser)]
#[command(
    name = "iotdash",
    version,
    about = "Control and monitor an iotdash IoT backend from the command line",
    long_about = "Manage devices, switch relays, configure motion sensors and read\n\
        host statistics on an iotdash backend. `watch` keeps a live view\n\
        using the push channel when the profile enables it.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "IOTDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend URL (overrides profile)
    #[arg(long, short = 'u', env = "IOTDASH_URL", global = true)]
    pub url: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(long, env = "IOTDASH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "IOTDASH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "IOTDASH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout, e.g. "10s" (overrides profile)
    #[arg(long, env = "IOTDASH_TIMEOUT", global = true)]
    pub timeout: Option<String>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage registered devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Switch and manage relays
    #[command(alias = "r")]
    Relays(RelaysArgs),

    /// Manage PIR motion sensors
    #[command(alias = "motion")]
    Sensors(SensorsArgs),

    /// View and clear motion alerts
    Alerts(AlertsArgs),

    /// Host CPU, memory, disk, network and temperature
    Stats,

    /// Backend liveness
    Health(HealthArgs),

    /// Live dashboard summary until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List,

    /// Register a device
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Register as inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Change a device; unset flags keep their current value
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Remove a device with its relays and sensors
    #[command(alias = "rm")]
    Delete { id: String },

    /// Show a device's agent token
    Token {
        id: String,
        /// Print the token instead of a masked form
        #[arg(long)]
        reveal: bool,
    },
}

// ── Relays ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RelaysArgs {
    #[command(subcommand)]
    pub command: RelaysCommand,
}

#[derive(Debug, Subcommand)]
pub enum RelaysCommand {
    /// List relays
    #[command(alias = "ls")]
    List {
        /// Only relays wired to this device
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Add a relay to a device
    Create {
        #[arg(long, short = 'd')]
        device: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        pin: Option<u32>,
    },

    /// Rename or rewire a relay
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        pin: Option<u32>,
    },

    /// Switch a relay on
    On(SwitchArgs),

    /// Switch a relay off
    Off(SwitchArgs),

    /// Remove a relay
    #[command(alias = "rm")]
    Delete { id: String },
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    pub id: String,

    /// Use the agent's action endpoint instead of a state update
    #[arg(long)]
    pub invoke: bool,
}

// ── Motion sensors ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// List motion sensors
    #[command(alias = "ls")]
    List,

    /// Add a motion sensor to a device
    Create {
        #[arg(long, short = 'd')]
        device: String,
        #[command(flatten)]
        settings: SensorSettings,
    },

    /// Change a motion sensor; unset flags keep their current value
    Update {
        id: String,
        #[command(flatten)]
        settings: SensorSettings,
    },

    /// Remove a motion sensor
    #[command(alias = "rm")]
    Delete { id: String },

    /// Fire a test alert
    Test { id: String },
}

#[derive(Debug, Args)]
pub struct SensorSettings {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub pin: Option<u32>,
    #[arg(long)]
    pub active: Option<bool>,
    /// Monitoring window start, "HH:MM"; with --end enables scheduling
    #[arg(long, requires = "end")]
    pub start: Option<String>,
    /// Monitoring window end, "HH:MM"; before --start spans midnight
    #[arg(long, requires = "start")]
    pub end: Option<String>,
    /// Monitor around the clock
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub always: bool,
    #[arg(long)]
    pub weekdays: Option<bool>,
    #[arg(long)]
    pub weekends: Option<bool>,
    #[arg(long)]
    pub timezone: Option<String>,
    #[arg(long, value_enum)]
    pub sensitivity: Option<SensitivityArg>,
    /// Seconds between triggers
    #[arg(long)]
    pub delay: Option<u32>,
    #[arg(long, value_enum)]
    pub trigger: Option<TriggerArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SensitivityArg {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    Single,
    Repeat,
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// List recent motion alerts
    #[command(alias = "ls")]
    List {
        /// Show at most this many
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Delete every motion alert
    Clear,
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Also report schema status and the advertised address
    #[arg(long)]
    pub details: bool,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Never open the push channel, even if the profile enables it
    #[arg(long)]
    pub no_push: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file location
    Path,

    /// Create or extend the config file. The backend URL comes from
    /// --url or is prompted for.
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,
        /// Enable the push channel at <backend>/ws
        #[arg(long)]
        push: bool,
        /// Make this the default profile
        #[arg(long)]
        make_default: bool,
    },

    /// Set the default profile
    Use { name: String },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
