mod cmd;
mod output;

use anyhow::{Context, Result};
use blinds_core::config::{Config, ConfigPatch};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "blinds",
    about = "Motorized blinds controller: position tracking, scheduling and a JSON API",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML file with config overrides on top of the built-in defaults
    #[arg(long, global = true, env = "BLINDS_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, env = "BLINDS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Mode to run when no subcommand is given
    #[arg(
        long,
        global = true,
        env = "BLINDS_MODE",
        value_enum,
        ignore_case = true,
        default_value = "server"
    )]
    mode: Mode,

    #[command(flatten)]
    overrides: ConfigArgs,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Server,
    #[value(alias = "led_test")]
    LedTest,
    #[value(alias = "button_test")]
    ButtonTest,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler, the button poller and the HTTP API
    Serve,

    /// Open, wait, close, forever. Checks the motor wiring.
    LedTest {
        /// Stop after this many open/close cycles
        #[arg(long)]
        cycles: Option<u32>,
    },

    /// Toggle open/close on every short press, without the scheduler
    ButtonTest,

    /// Print the effective config as JSON and exit
    Config,
}

/// Per-key config overrides. Each one maps to a `Config` field.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    #[arg(long, global = true, env = "BLINDS_MOTOR_PIN")]
    motor_pin: Option<u8>,

    #[arg(long, global = true, env = "BLINDS_DIRECTION_PIN")]
    direction_pin: Option<u8>,

    #[arg(long, global = true, env = "BLINDS_BUTTON_PIN")]
    button_pin: Option<u8>,

    /// Drive time from fully closed to fully open
    #[arg(long, global = true, env = "BLINDS_DEFAULT_OPEN_MILLIS")]
    open_ms: Option<u64>,

    /// Extra drive time when closing
    #[arg(long, global = true, env = "BLINDS_DEFAULT_CLOSE_MILLIS")]
    close_offset_ms: Option<u64>,

    #[arg(long, global = true, env = "BLINDS_SHORT_DEBOUNCE_MILLIS")]
    short_debounce_ms: Option<u64>,

    #[arg(long, global = true, env = "BLINDS_LONG_ADDITIONAL_DEBOUNCE_MILLIS")]
    long_debounce_extra_ms: Option<u64>,

    /// Where the snapshot is persisted
    #[arg(long, global = true, env = "BLINDS_SAVE_FILE")]
    save_file: Option<PathBuf>,
}

impl ConfigArgs {
    fn patch(&self) -> ConfigPatch {
        ConfigPatch {
            motor_pin: self.motor_pin,
            direction_pin: self.direction_pin,
            button_pin: self.button_pin,
            open_duration_ms: self.open_ms,
            close_offset_ms: self.close_offset_ms,
            short_debounce_ms: self.short_debounce_ms,
            long_debounce_extra_ms: self.long_debounce_extra_ms,
            button_idle_level: None,
            save_path: self.save_file.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the HTTP API
    #[arg(long, global = true, env = "BLINDS_LOCAL_PORT", default_value = "8080")]
    pub port: u16,

    /// Longest sleep between scheduler drains
    #[arg(long, global = true, env = "BLINDS_POLL_PERIOD_MS", default_value = "50")]
    pub poll_period_ms: u64,

    /// Enables HTTP Basic auth together with --password
    #[arg(long, global = true, env = "BLINDS_SERVER_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "BLINDS_SERVER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Don't start the physical button poller
    #[arg(long, global = true)]
    pub no_button: bool,
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let config = base.merged(&cli.overrides.patch());
    config.validate()?;
    Ok(config)
}

fn main() {
    let mut cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.take().unwrap_or(match cli.mode {
        Mode::Server => Commands::Serve,
        Mode::LedTest => Commands::LedTest { cycles: None },
        Mode::ButtonTest => Commands::ButtonTest,
    });

    let result = resolve_config(&cli).and_then(|config| match command {
        Commands::Serve => cmd::serve::run(config, &cli.serve),
        Commands::LedTest { cycles } => cmd::led_test::run(config, cycles),
        Commands::ButtonTest => cmd::button_test::run(config),
        Commands::Config => cmd::config::run(&config),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
