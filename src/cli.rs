use crate::config::{self, CliOverrides, Config};
use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autopurge")]
#[command(about = "autopurge - deletes chat messages once they outlive their retention period")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (default: ~/.autopurge/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display version information
    Version,

    /// Watch the monitored chat and delete expired messages
    Run {
        /// Chat to monitor, overrides CHANNEL_ID and the config file
        #[arg(long, allow_negative_numbers = true)]
        channel_id: Option<i64>,

        /// Expire every message after 60 seconds (development)
        #[arg(long)]
        fast: bool,

        /// Write the daemon's PID to this file
        #[arg(long, value_name = "PATH")]
        pid_file: Option<PathBuf>,
    },

    /// Load and validate the configuration, then print a summary
    CheckConfig,

    /// Write a configuration template
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        Some(Commands::Run {
            channel_id,
            fast,
            pid_file,
        }) => {
            let overrides = CliOverrides {
                channel_id,
                fast_mode: fast,
            };
            let config = config::load_config(overrides, cli.config)?;
            config.validate().context("Invalid configuration")?;

            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(crate::gateway::run_gateway(&config, pid_file))
        }
        Some(Commands::CheckConfig) => {
            let config = config::load_config(CliOverrides::default(), cli.config)?;
            print_summary(&config);
            config.validate().context("Invalid configuration")?;
            println!("Configuration OK");
            Ok(())
        }
        Some(Commands::Init { force }) => {
            let path = cli
                .config
                .or_else(config::get_config_path)
                .context("Could not determine configuration path")?;
            if path.exists() && !force {
                bail!(
                    "Configuration file {} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            config::save_config(&Config::default(), &path)?;
            println!("Wrote configuration template to {}", path.display());
            println!("Set telegram_token and channel_id, or export BOT_TOKEN and CHANNEL_ID.");
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn print_version() {
    println!("autopurge {}", env!("CARGO_PKG_VERSION"));
}

fn print_summary(config: &Config) {
    let summary = config.get_safe_summary();
    println!("Telegram token:   {}", if summary.telegram_configured { "configured" } else { "missing" });
    match summary.channel_id {
        Some(id) => println!("Channel:          {}", id),
        None => println!("Channel:          missing"),
    }
    if summary.fast_mode {
        println!("Retention:        60s (fast mode)");
    } else {
        println!("Retention:        {}h", summary.retention_hours);
    }
    println!("Sweep interval:   {}s", summary.sweep_interval_secs);
    println!("Reap interval:    {}s", summary.reap_interval_secs);
    println!("Staleness bound:  {}d", summary.staleness_days);
}

pub fn extract_command_from_error(error_msg: &str) -> String {
    // "error: unrecognized subcommand 'invalid_command'"
    if let Some(start) = error_msg.find('\'') {
        if let Some(end) = error_msg[start + 1..].find('\'') {
            return error_msg[start + 1..start + 1 + end].to_string();
        }
    }
    "unknown".to_string()
}
