use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};

use xipoll_bridge::chain::{codec, LedgerRpc, RpcClient, StatePoller};
use xipoll_bridge::config::{load_or_default, ClientConfig};
use xipoll_bridge::observability::logging::init_logging;
use xipoll_bridge::state::{
    search, sort_polls, voted_only, GraphQlClient, SortOrder, StateReconciler,
};

#[derive(Parser)]
#[command(name = "xipoll-cli")]
#[command(about = "One-shot queries against the poll contract", long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reconciled polls
    Polls {
        /// Project this address's votes onto the polls
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long, value_enum, default_value_t = SortOrder::Newest)]
        sort: SortOrder,

        /// Case-insensitive match on title, token contract or creator
        #[arg(long)]
        search: Option<String>,

        /// Only polls the user has voted on
        #[arg(long)]
        voted: bool,
    },
    /// Fetch and decode a transaction result
    Tx { hash: String },
    /// Read one state key of the confirmation contract
    State { key: String },
    /// Look up a user's recorded vote on a poll
    Vote { user: String, poll_id: u64 },
    /// Poll a state key until it holds the expected JSON value
    Confirm { key: String, expected: String },
    /// Report the RPC node's latest block height
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    init_logging(&config.observability.log_level);

    match cli.command {
        Commands::Polls {
            user,
            sort,
            search: term,
            voted,
        } => {
            let reconciler = reconciler(&config);
            if user.is_some() {
                reconciler.set_user(user);
            }
            let snapshot = reconciler.refresh().await?;

            let mut polls = snapshot.polls.clone();
            sort_polls(&mut polls, sort, Utc::now());
            let mut selected = search(&polls, term.as_deref().unwrap_or_default());
            if voted {
                let voted_ids: Vec<u64> = voted_only(&polls).iter().map(|poll| poll.id).collect();
                selected.retain(|poll| voted_ids.contains(&poll.id));
            }
            print_json(&selected)?;
        }
        Commands::Tx { hash } => {
            let rpc = RpcClient::new(&config.rpc)?;
            let tx = rpc.tx(&hash).await?;
            print_json(&json!({
                "hash": hash,
                "height": tx.pointer("/result/height"),
                "result": codec::decode_tx_result_data(&tx),
            }))?;
        }
        Commands::State { key } => {
            let value = poller(&config)?.read_value(&key).await?;
            print_json(&json!({ "key": key, "value": value }))?;
        }
        Commands::Vote { user, poll_id } => {
            let choice = reconciler(&config).user_vote(&user, poll_id).await?;
            print_json(&json!({ "user": user, "poll_id": poll_id, "option_id": choice }))?;
        }
        Commands::Confirm { key, expected } => {
            let expected: Value =
                serde_json::from_str(&expected).unwrap_or(Value::String(expected));
            let status = poller(&config)?.wait_for_value(&key, &expected).await;
            print_json(&status)?;
        }
        Commands::Status => {
            let rpc = RpcClient::new(&config.rpc)?;
            let height = rpc.latest_block_height().await?;
            print_json(&json!({
                "rpc_url": rpc.base_url().as_str(),
                "latest_block_height": height,
            }))?;
        }
    }

    Ok(())
}

fn reconciler(config: &ClientConfig) -> StateReconciler {
    StateReconciler::new(Arc::new(GraphQlClient::new(&config.graphql)), &config.reconciler)
}

fn poller(config: &ClientConfig) -> Result<StatePoller, Box<dyn std::error::Error>> {
    let rpc = RpcClient::new(&config.rpc)?;
    Ok(StatePoller::new(Arc::new(rpc), &config.confirmation))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
