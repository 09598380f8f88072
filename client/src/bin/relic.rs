use std::io;
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::rpc::types::BlockId;
use alloy::transports::http::{reqwest::Client, Http};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use dotenvy::dotenv;
use relic_client::provider::CachedProvider;
use relic_client::{ConfigOverride, RelicClient};
use serde_json::json;
use tracing::{info, warn};
use url::Url;

type HttpProvider = CachedProvider<RootProvider<Http<Client>>, Http<Client>>;

/// Inspect and relay Relic block history state
#[derive(Parser)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RPC of the chain where proofs are verified.
    #[arg(short = 'u', long, env = "RELIC_RPC_URL", value_hint = ValueHint::Url)]
    rpc_url: Url,

    /// RPC of the chain whose history is proven. Defaults to `--rpc-url`.
    #[arg(short = 'd', long, env = "RELIC_DATA_RPC_URL", value_hint = ValueHint::Url)]
    data_rpc_url: Option<Url>,

    /// Overrides the default proof API for the chain pair.
    #[arg(long, env = "RELIC_API_URL", value_hint = ValueHint::Url)]
    api_url: Option<Url>,
}

#[derive(Subcommand)]
enum Command {
    /// Reports whether a data-chain block can currently be verified.
    CanVerify { block: BlockId },
    /// Prints the highest verifiable block, or -1.
    LastVerifiable,
    /// Waits until a block becomes verifiable.
    WaitVerifiable {
        block: BlockId,
        /// Gives up after this many seconds.
        #[arg(short, long)]
        timeout_secs: Option<u64>,
    },
    /// Prints the unsigned L1 transaction relaying a block hash to the L2.
    SendBlock {
        block: BlockId,
        /// Relays even if the block is already verifiable.
        #[arg(short, long)]
        force: bool,
    },
}

fn load_dotenvy_vars_if_present() {
    match dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(io::Error { .. })) => (),
        Err(e) => warn!("Found local `.env` file but was unable to parse it! (err: {e})",),
    }
}

fn connect(url: Url) -> Arc<HttpProvider> {
    Arc::new(CachedProvider::new(ProviderBuilder::new().on_http(url)))
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenvy_vars_if_present();
    relic_client::tracing::init();

    let args = Cli::parse();
    let provider = connect(args.rpc_url);
    let data_provider = match args.data_rpc_url {
        Some(url) => connect(url),
        None => provider.clone(),
    };
    let config = ConfigOverride {
        api_url: args.api_url.map(String::from),
        addresses: None,
    };
    let client = RelicClient::from_providers(provider, data_provider, config).await?;
    let history = client.block_history()?;

    match args.command {
        Command::CanVerify { block } => {
            println!("{}", history.can_verify_block(block).await?);
        }
        Command::LastVerifiable => {
            println!("{}", history.last_verifiable_block().await?);
        }
        Command::WaitVerifiable {
            block,
            timeout_secs,
        } => {
            let wait = history.wait_until_verifiable(block);
            match timeout_secs {
                Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
                    .await
                    .with_context(|| format!("block not verifiable after {secs}s"))??,
                None => wait.await?,
            }
            info!(?block, "block is verifiable");
        }
        Command::SendBlock { block, force } => {
            let tx = client.bridge()?.send_block(block, force).await?;
            let out = json!({
                "to": tx.to,
                "value": tx.value.to_string(),
                "data": format!("0x{}", hex::encode(&tx.data)),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
