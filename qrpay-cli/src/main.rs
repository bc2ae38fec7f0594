//! qrpay
//!
//! Inspect and produce QR payment requests, and check them against live
//! balances from a block explorer. Nothing is ever signed or broadcast.

mod config;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use futures::future::try_join_all;
use qrpay_explorer::{ExplorerClient, ExplorerHistory, ExplorerTokenBalance};
use qrpay_uri::{parse_uri, PaymentRequestBuilder};
use qrpay_wallet::memory::MemorySubmitter;
use qrpay_wallet::{
    format_relative_date, format_usd, mask_address, AccountRef, AggregateBalanceSource,
    BalanceSource, FlowError, TransactionHistory, TransferOrchestrator,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "qrpay", about = "QR payment request tools for stablecoin wallets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a scanned payment URI.
    Parse(ParseArgs),
    /// Build a payment URI to show as a QR code.
    Request(RequestArgs),
    /// Show token balances for an account.
    Balance(AccountArgs),
    /// Show recent token transfers for an account.
    History(AccountArgs),
    /// Decode a payment URI and check the account can cover it.
    Check(CheckArgs),
}

#[derive(Args)]
struct ParseArgs {
    uri: String,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RequestArgs {
    /// Recipient address.
    #[arg(long)]
    to: String,
    /// Amount in display units, e.g. `12.5`.
    #[arg(long)]
    amount: String,
    /// Token contract; defaults to the first configured token.
    #[arg(long)]
    token: Option<String>,
    /// Defaults to the chain of the first configured token.
    #[arg(long)]
    chain_id: Option<u64>,
    #[arg(long)]
    wallet_id: Option<String>,
}

#[derive(Args)]
struct AccountArgs {
    /// Defaults to QRPAY_ACCOUNT.
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    uri: String,
    /// Defaults to QRPAY_ACCOUNT.
    #[arg(long)]
    account: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qrpay=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = CliConfig::from_env()?;
    debug!(explorer = %config.explorer_url, tokens = config.tokens.len(), "configuration loaded");

    match cli.command {
        Commands::Parse(args) => parse(args),
        Commands::Request(args) => request(&config, args),
        Commands::Balance(args) => balance(&config, args).await,
        Commands::History(args) => history(&config, args).await,
        Commands::Check(args) => check(&config, args).await,
    }
}

fn parse(args: ParseArgs) -> Result<()> {
    let intent = parse_uri(&args.uri).context("not a payment request")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&intent)?);
        return Ok(());
    }

    println!("Recipient: {}", intent.recipient_address);
    println!("Amount:    {}", format_usd(intent.display_amount));
    println!("Raw:       {}", intent.raw_amount);
    println!("Chain:     {}", intent.chain_id);
    println!("Method:    {}", intent.method);
    println!("Target:    {}", intent.token_address);
    if let Some(id) = &intent.wallet_id {
        println!("Wallet:    {}", id);
    }
    if let Some(client) = &intent.wallet_client {
        println!("Client:    {}", client);
    }
    Ok(())
}

fn request(config: &CliConfig, args: RequestArgs) -> Result<()> {
    let default_token = config.tokens.first().context("no tokens configured")?;
    let token = args.token.unwrap_or_else(|| default_token.address.clone());
    let chain_id = args.chain_id.unwrap_or(default_token.chain_id);

    let mut builder = PaymentRequestBuilder::new(token, chain_id)
        .recipient(args.to)
        .display_amount(&args.amount)
        .with_context(|| format!("invalid amount: {}", args.amount))?;
    if let Some(id) = args.wallet_id {
        builder = builder.wallet_id(id);
    }

    println!("{}", builder.build()?);
    Ok(())
}

async fn balance(config: &CliConfig, args: AccountArgs) -> Result<()> {
    let account = AccountRef::new(config.resolve_account(args.account)?);
    let client = ExplorerClient::new(config.explorer_config())?;

    let sources: Vec<_> = config
        .tokens
        .iter()
        .map(|token| ExplorerTokenBalance::new(client.clone(), token.clone()))
        .collect();
    let balances = try_join_all(sources.iter().map(|source| source.get_balance(&account)))
        .await
        .context("failed to fetch balances")?;
    let total: Decimal = balances.iter().copied().sum();

    if args.json {
        let rows: Vec<_> = sources
            .iter()
            .zip(&balances)
            .map(|(source, balance)| {
                serde_json::json!({ "token": source.token(), "balance": balance })
            })
            .collect();
        let body = serde_json::json!({ "account": account, "tokens": rows, "total": total });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Account {}", mask_address(account.as_str()));
    for (source, balance) in sources.iter().zip(&balances) {
        println!("  {:<28} {:>16}", source.token().label(), format_usd(*balance));
    }
    println!("  {:<28} {:>16}", "Total", format_usd(total));
    Ok(())
}

async fn history(config: &CliConfig, args: AccountArgs) -> Result<()> {
    let account = AccountRef::new(config.resolve_account(args.account)?);
    let client = ExplorerClient::new(config.explorer_config())?;

    let histories: Vec<_> = config
        .tokens
        .iter()
        .map(|token| ExplorerHistory::new(client.clone(), token.clone()))
        .collect();
    let pages = try_join_all(histories.iter().map(|h| h.list_transactions(&account)))
        .await
        .context("failed to fetch transfer history")?;

    let mut records: Vec<_> = pages.into_iter().flatten().collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No transfers found");
        return Ok(());
    }
    let now = Local::now();
    for record in &records {
        println!(
            "{:<20}  {:<20} {:>14}  {}",
            format_relative_date(&record.timestamp.with_timezone(&Local), &now),
            record.description(),
            record.signed_amount(),
            mask_address(&record.hash),
        );
    }
    Ok(())
}

async fn check(config: &CliConfig, args: CheckArgs) -> Result<()> {
    let account = AccountRef::new(config.resolve_account(args.account)?);
    let client = ExplorerClient::new(config.explorer_config())?;

    let balances = config
        .tokens
        .iter()
        .fold(AggregateBalanceSource::new(), |aggregate, token| {
            aggregate.with_source(
                token.label(),
                ExplorerTokenBalance::new(client.clone(), token.clone()),
            )
        });

    // only the balance check runs; the submitter is never reached
    let flow = TransferOrchestrator::new(account, balances, MemorySubmitter::new());
    match flow.handle_scan(&args.uri).await {
        Ok(flow_id) => debug!(flow = %flow_id, "balance check finished"),
        Err(FlowError::Parse(e)) => return Err(e).context("not a payment request"),
        Err(e) => return Err(e.into()),
    }

    let snapshot = flow.snapshot();
    if let Some(intent) = &snapshot.intent {
        println!("Pay {}", intent.summary());
    }
    match (snapshot.validation.sufficient_funds, &snapshot.validation.error_message) {
        (Some(true), _) => println!("OK: balance covers the payment"),
        (Some(false), Some(message)) => println!("Blocked: {}", message),
        (None, Some(message)) => println!("Unknown: {}", message),
        _ => println!("Unknown: balance check did not complete"),
    }
    info!(can_confirm = snapshot.can_confirm(), "check complete");

    flow.cancel()?;
    Ok(())
}
