// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hippo - per-user conversational memory for medical assistants.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod memory;
mod provider;
mod shell;
mod telemetry;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hippo_config::HippoConfig;
use hippo_core::HippoError;

/// Hippo - per-user conversational memory for medical assistants.
#[derive(Parser, Debug)]
#[command(name = "hippo", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with memory in an interactive REPL.
    Shell {
        /// User whose memory the session uses. Defaults to a fresh id.
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
    /// Run environment diagnostics.
    Doctor {
        /// Load the embedding model and check every adapter.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match hippo_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            hippo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Some(Commands::Shell { user }) => {
            let metrics = telemetry::install_metrics();
            shell::run_shell(config, user, metrics).await
        }
        Some(Commands::Config) => print_config(&config),
        Some(Commands::Doctor { deep, plain }) => {
            let metrics = telemetry::install_metrics();
            doctor::run_doctor(&config, deep, plain, metrics.as_ref()).await
        }
        None => {
            println!("hippo: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

fn print_config(config: &HippoConfig) -> Result<(), HippoError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &HippoConfig) -> Result<String, HippoError> {
    toml::to_string_pretty(config)
        .map_err(|e| HippoError::Config(format!("failed to serialize config: {e}")))
}

/// Logs go to stderr so they never interleave with REPL output on stdout.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hippo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = hippo_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.agent.name, "hippo");
    }

    #[test]
    fn rendered_config_round_trips() {
        let mut config = HippoConfig::default();
        config.memory.top_k = 7;
        config.provider.api_key = Some("sk-local".into());

        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("[memory]"));
        assert!(rendered.contains("[provider]"));

        let parsed = hippo_config::load_config_from_str(&rendered).unwrap();
        assert_eq!(parsed.memory.top_k, 7);
        assert_eq!(parsed.provider.api_key.as_deref(), Some("sk-local"));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["hippo", "shell", "--user", "alice"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Shell { user: Some(ref u) }) if u == "alice"
        ));

        let cli = Cli::try_parse_from(["hippo", "doctor", "--deep", "--plain"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Doctor { deep: true, plain: true })
        ));

        assert!(Cli::try_parse_from(["hippo", "serve"]).is_err());
    }
}
