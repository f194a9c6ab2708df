//! `vaultkit` developer CLI.
//!
//! Works against the witness service without a browser wallet: statements are
//! printed for signing with an external tool and the signature is read back
//! from a file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use vaultkit_core::{Environment, KitConfig};

mod commands;

#[derive(Parser)]
#[command(name = "vaultkit")]
#[command(about = "VaultKit developer tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Deployment whose default endpoints are used
    #[arg(long, env = "VAULTKIT_ENV", default_value = "production")]
    env: Environment,

    /// JSON configuration file; overrides `--env`
    #[arg(short, long, env = "VAULTKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a sign-in request for an address
    SignInMessage {
        /// Account address
        #[arg(long)]
        address: String,
    },

    /// Show the attestation statement for some content
    Statement {
        #[command(flatten)]
        content: commands::ContentArgs,

        /// Ask the witness service for the text to sign instead of printing the request body
        #[arg(long)]
        remote: bool,
    },

    /// Exchange a signature for a credential
    Issue {
        #[command(flatten)]
        content: commands::ContentArgs,

        /// File holding the signature over the statement text
        #[arg(long)]
        signature_file: PathBuf,

        /// Where to write the credential; defaults to `<title>_credential.jwt`
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Decode the payload of a credential token or token file
    Decode {
        /// Token, or path to a file containing one
        token: String,
    },

    /// Merge remote records into local records
    Merge {
        /// JSON file with the local records
        #[arg(long)]
        local: PathBuf,

        /// JSON file with the remote records
        #[arg(long)]
        remote: PathBuf,
    },

    /// Build or parse share links
    ShareLink {
        #[command(subcommand)]
        command: commands::ShareLinkCommands,
    },
}

fn init_logging(verbose: bool) -> eyre::Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().wrap_err("failed to forward log records")?;
    Ok(())
}

fn load_config(cli: &Cli) -> eyre::Result<KitConfig> {
    let Some(path) = &cli.config else {
        return Ok(KitConfig::from_environment(&cli.env));
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(KitConfig::from_json(&json)?)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let config = load_config(&cli)?;
    tracing::debug!(witness = %config.witness_url, "loaded configuration");

    match cli.command {
        Commands::SignInMessage { address } => commands::sign_in_message(&config, &address),
        Commands::Statement { content, remote } => {
            commands::statement(&config, &content, remote).await
        }
        Commands::Issue {
            content,
            signature_file,
            out,
        } => commands::issue(&config, &content, &signature_file, out).await,
        Commands::Decode { token } => commands::decode(&token),
        Commands::Merge { local, remote } => commands::merge(&local, &remote),
        Commands::ShareLink { command } => commands::share_link(&config, command),
    }
}
