use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use rcp_ledger::config::{ENV_CONTRACT_ADDRESS, ENV_NODE_URL, ENV_PRIVATE_KEY};
use rcp_ledger::{LedgerClient, LedgerConfig, RecipeLedger, VerificationResult};
use rcp_provenance::{
    AnchorStatus, AnchorVerifier, CanonicalHasher, ProvenanceOrchestrator, ProvenanceState,
    RecipeContent, RecipeHash, WalletAddress,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

/// Runs one command. `Ok(false)` means the command ran but its outcome is
/// a failure the exit status should report.
pub async fn run_command(cli: Cli) -> anyhow::Result<bool> {
    let config = LedgerConfig::load(cli.config.as_deref()).context("loading ledger configuration")?;
    debug!(?config, "effective configuration");
    let format = cli.format;

    match cli.command {
        Command::Hash(args) => cmd_hash(&args.file, format),
        Command::Config => cmd_config(&config, format),
        Command::Status => with_ledger(config, |ledger| cmd_status(ledger, format)).await,
        Command::Verify(args) => {
            let hash = parse_hash(&args.hash)?;
            with_ledger(config, |ledger| cmd_verify(ledger, hash, format)).await
        }
        Command::Info(args) => {
            let hash = parse_hash(&args.hash)?;
            with_ledger(config, |ledger| cmd_info(ledger, hash, format)).await
        }
        Command::Register(args) => {
            let content = read_content(&args.file)?;
            let wallet = args
                .wallet
                .as_deref()
                .map(WalletAddress::parse)
                .transpose()
                .context("invalid --wallet address")?;
            with_ledger(config, |ledger| cmd_register(ledger, content, wallet, format)).await
        }
    }
}

/// Run `f` against an HTTP ledger client and close it afterwards.
async fn with_ledger<F, Fut>(config: LedgerConfig, f: F) -> anyhow::Result<bool>
where
    F: FnOnce(Arc<dyn RecipeLedger>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    let client = LedgerClient::over_http(config).context("starting ledger client")?;
    let ledger: Arc<dyn RecipeLedger> = Arc::new(client);
    let result = f(ledger.clone()).await;
    ledger.close().await;
    result
}

fn cmd_hash(file: &Path, format: OutputFormat) -> anyhow::Result<bool> {
    let content = read_content(file)?;
    let hash = CanonicalHasher::hash(&content);
    match format {
        OutputFormat::Json => {
            let canonical = String::from_utf8(CanonicalHasher::canonical_bytes(&content))
                .context("canonical form is not UTF-8")?;
            print_json(&json!({ "hash": hash, "canonical": canonical }))?;
        }
        OutputFormat::Text => println!("{hash}"),
    }
    Ok(true)
}

async fn cmd_status(ledger: Arc<dyn RecipeLedger>, format: OutputFormat) -> anyhow::Result<bool> {
    let result = ledger.check_connection().await;
    match format {
        OutputFormat::Json => match &result {
            Ok(status) => print_json(&json!({
                "success": true,
                "connected": status.connected,
                "networkId": status.network_id,
            }))?,
            Err(failure) => print_json(&json!({ "success": false, "error": failure.to_string() }))?,
        },
        OutputFormat::Text => match &result {
            Ok(status) => println!(
                "{} Connected to ledger network {}",
                "✓".green().bold(),
                status.network_id.cyan()
            ),
            Err(failure) => println!("{} {}", "✗".red().bold(), failure),
        },
    }
    Ok(result.is_ok())
}

async fn cmd_verify(
    ledger: Arc<dyn RecipeLedger>,
    hash: RecipeHash,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let status = AnchorVerifier::new(ledger).verify(&hash).await;
    match format {
        OutputFormat::Json => print_json(&json!({ "hash": hash, "anchor": status }))?,
        OutputFormat::Text => {
            let line = match &status {
                AnchorStatus::Found { .. } => status.to_string().green().bold(),
                AnchorStatus::NotFound => status.to_string().yellow(),
                AnchorStatus::NotConfigured => status.to_string().dimmed(),
                AnchorStatus::Unavailable { .. } => status.to_string().red(),
            };
            println!("{}  {}", hash.short_hex().yellow(), line);
        }
    }
    Ok(!matches!(status, AnchorStatus::Unavailable { .. }))
}

async fn cmd_info(
    ledger: Arc<dyn RecipeLedger>,
    hash: RecipeHash,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let result = ledger.get_recipe_info(&hash).await;
    let view = VerificationResult::from(&result);
    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Text => {
            println!("Hash:      {}", hash.to_hex().yellow());
            match &view.error {
                Some(error) => println!("Error:     {}", error.red()),
                None => {
                    println!("Exists:    {}", view.exists);
                    if let Some(author) = view.author {
                        println!("Author:    {}", author.to_string().cyan());
                    }
                    if let Some(timestamp) = view.timestamp {
                        println!("Timestamp: {}", timestamp.to_rfc3339());
                    }
                }
            }
        }
    }
    Ok(view.success)
}

async fn cmd_register(
    ledger: Arc<dyn RecipeLedger>,
    content: RecipeContent,
    wallet: Option<WalletAddress>,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let record = ProvenanceOrchestrator::new(ledger)
        .on_create(&content, wallet)
        .await;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            let state = record.state();
            let marker = match state {
                ProvenanceState::Anchored => "✓".green().bold(),
                ProvenanceState::NoWallet | ProvenanceState::Pending => "-".yellow().bold(),
                ProvenanceState::Failed(_) => "✗".red().bold(),
            };
            println!("{} {} {}", marker, record.recipe_hash.to_hex().yellow(), state);
            if let (Some(tx), Some(block)) = (&record.transaction_hash, record.block_number) {
                println!("  Transaction: {} (block {})", tx.cyan(), block);
            }
        }
    }
    Ok(!matches!(record.state(), ProvenanceState::Failed(_)))
}

fn cmd_config(config: &LedgerConfig, format: OutputFormat) -> anyhow::Result<bool> {
    let mut shown = config.clone();
    if shown.private_key.is_some() {
        shown.private_key = Some("<redacted>".into());
    }
    match format {
        OutputFormat::Json => print_json(&shown)?,
        OutputFormat::Text => {
            let unset = || "(not set)".dimmed().to_string();
            println!("node_url         = {}", shown.node_url.clone().unwrap_or_else(unset));
            println!(
                "network_id       = {}",
                shown.network_id.map(|id| id.to_string()).unwrap_or_else(unset)
            );
            println!("private_key      = {}", shown.private_key.clone().unwrap_or_else(unset));
            println!(
                "contract_address = {}",
                shown.contract_address.clone().unwrap_or_else(unset)
            );
            println!("gas_limit        = {}", shown.gas_limit);
            println!(
                "gas_price_wei    = {}",
                shown.gas_price_wei.map(|p| p.to_string()).unwrap_or_else(unset)
            );
            println!(
                "timeouts         = call {}s, submit {}s, confirm {}s",
                shown.call_timeout_secs, shown.submit_timeout_secs, shown.confirm_timeout_secs
            );
            println!(
                "\nOverride with {}, {}, {} and related variables.",
                ENV_NODE_URL.bold(),
                ENV_PRIVATE_KEY.bold(),
                ENV_CONTRACT_ADDRESS.bold()
            );
        }
    }
    Ok(true)
}

fn read_content(file: &Path) -> anyhow::Result<RecipeContent> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing recipe content in {}", file.display()))
}

fn parse_hash(text: &str) -> anyhow::Result<RecipeHash> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    RecipeHash::from_hex(digits).with_context(|| format!("invalid recipe hash {text:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_hashes_with_or_without_prefix() {
        let hex = "ab".repeat(32);
        let plain = parse_hash(&hex).unwrap();
        assert_eq!(parse_hash(&format!("0x{hex}")).unwrap(), plain);
        assert!(parse_hash("abc").is_err());
    }

    #[test]
    fn reads_content_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"title":"Phở Bò","tags":["soup","beef"],"prepTime":20,"ingredients":[{{"name":"beef"}}]}}"#
        )
        .unwrap();
        let content = read_content(file.path()).unwrap();
        assert_eq!(content.title.as_deref(), Some("Phở Bò"));
        assert_eq!(content.prep_time, Some(20));
        assert_eq!(content.ingredients.len(), 1);
    }

    #[test]
    fn rejects_malformed_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_content(file.path()).is_err());
        assert!(read_content(Path::new("/definitely/missing.json")).is_err());
    }

    #[tokio::test]
    async fn register_without_wallet_skips_the_node() {
        // No node URL is configured, so any ledger call would fail.
        let ledger: Arc<dyn RecipeLedger> =
            Arc::new(LedgerClient::over_http(LedgerConfig::default()).unwrap());
        let ok = cmd_register(ledger, RecipeContent::titled("Tea"), None, OutputFormat::Json)
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn status_without_node_reports_failure() {
        let ledger: Arc<dyn RecipeLedger> =
            Arc::new(LedgerClient::over_http(LedgerConfig::default()).unwrap());
        assert!(!cmd_status(ledger, OutputFormat::Text).await.unwrap());
    }
}
