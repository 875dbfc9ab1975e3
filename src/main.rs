// src/main.rs
//! stockpile - CLI Entry Point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "stockpile")]
#[command(author = "Stockpile Project")]
#[command(version)]
#[command(about = "Install node_modules from cached dependency bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose diagnostic logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install dependencies from the fastest backend that has them
    Install {
        /// Replace an existing node_modules directory
        #[arg(short, long)]
        force: bool,

        /// Path to the configuration file (defaults to ./stockpile.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the bundle fingerprint for the current project
    Calc {
        /// Path to the configuration file (defaults to ./stockpile.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let result = match cli.command {
        Some(Commands::Install { force, config }) => {
            commands::cmd_install(config.as_ref(), force)
        }

        Some(Commands::Calc { config }) => commands::cmd_calc(config.as_ref()),

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stockpile", &mut io::stdout());
            Ok(())
        }

        None => {
            println!("stockpile v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'stockpile --help' for usage information");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<stockpile::Error>()
            .map(stockpile::Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
