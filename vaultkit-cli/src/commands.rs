use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use eyre::WrapErr;
use vaultkit_core::issuers::{
    credential_file_name, parse_jwt, AttestationIssuer, Content, Statement, StatementRequest,
};
use vaultkit_core::reconcile::{self, DataItem, Reconciliation};
use vaultkit_core::session::SignInMessage;
use vaultkit_core::{share, KitConfig};

#[derive(Args)]
pub struct ContentArgs {
    /// Title of the attested content
    #[arg(long)]
    title: String,

    /// Body of the attested content
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// File holding the body of the attested content
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Address of the attesting account
    #[arg(long)]
    address: String,
}

impl ContentArgs {
    fn content(&self) -> eyre::Result<Content> {
        let body = match (&self.body, &self.body_file) {
            (Some(body), _) => body.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?,
            (None, None) => eyre::bail!("either --body or --body-file is required"),
        };
        Ok(Content::new(&self.title, body))
    }
}

#[derive(Subcommand)]
pub enum ShareLinkCommands {
    /// Build a link for a share reference
    Build {
        /// Reference returned by the vault
        reference: String,
    },
    /// Extract the share reference from a link
    Parse {
        /// Link to parse
        link: String,
    },
}

pub fn sign_in_message(config: &KitConfig, address: &str) -> eyre::Result<()> {
    let message = SignInMessage::new(config, address)?;
    println!("{message}");
    Ok(())
}

pub async fn statement(config: &KitConfig, args: &ContentArgs, remote: bool) -> eyre::Result<()> {
    let content = args.content()?;
    if remote {
        let text = AttestationIssuer::new(config)
            .statement(&content, &args.address)
            .await?;
        println!("{text}");
    } else {
        let request = StatementRequest::basic_post(Statement::new(&content, &args.address));
        println!("{}", serde_json::to_string_pretty(&request)?);
    }
    Ok(())
}

pub async fn issue(
    config: &KitConfig,
    args: &ContentArgs,
    signature_file: &Path,
    out: Option<PathBuf>,
) -> eyre::Result<()> {
    let content = args.content()?;
    let signature = tokio::fs::read_to_string(signature_file)
        .await
        .wrap_err_with(|| format!("failed to read {}", signature_file.display()))?;

    let jwt = AttestationIssuer::new(config)
        .witness(&content, &args.address, signature.trim().to_string())
        .await?;

    let out = out.unwrap_or_else(|| PathBuf::from(credential_file_name(&args.title)));
    tokio::fs::write(&out, &jwt)
        .await
        .wrap_err_with(|| format!("failed to write {}", out.display()))?;
    tracing::info!(path = %out.display(), "credential written");
    println!("{}", out.display());
    Ok(())
}

pub fn decode(token: &str) -> eyre::Result<()> {
    let path = Path::new(token);
    let token = if path.is_file() {
        std::fs::read_to_string(path)?.trim().to_string()
    } else {
        token.to_string()
    };
    let payload = parse_jwt(&token)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub fn merge(local: &Path, remote: &Path) -> eyre::Result<()> {
    let report = merge_files(local, remote)?;
    for skip in &report.skipped {
        tracing::warn!(position = skip.position, reason = %skip.reason, "skipped remote record");
    }
    println!("{}", serde_json::to_string_pretty(&report.items)?);
    Ok(())
}

fn merge_files(local: &Path, remote: &Path) -> eyre::Result<Reconciliation> {
    let local_text = std::fs::read_to_string(local)
        .wrap_err_with(|| format!("failed to read {}", local.display()))?;
    let local: Vec<DataItem> = serde_json::from_str(&local_text)
        .wrap_err_with(|| format!("{} is not a list of records", local.display()))?;

    let remote_text = std::fs::read_to_string(remote)
        .wrap_err_with(|| format!("failed to read {}", remote.display()))?;
    let remote = reconcile::parse_items(&remote_text)?;

    Ok(reconcile::reconcile(&local, &remote))
}

pub fn share_link(config: &KitConfig, command: ShareLinkCommands) -> eyre::Result<()> {
    match command {
        ShareLinkCommands::Build { reference } => {
            println!("{}", share::build_link(config.origin(), &reference));
        }
        ShareLinkCommands::Parse { link } => println!("{}", share::parse_link(&link)?),
    }
    Ok(())
}
