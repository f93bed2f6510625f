#![forbid(unsafe_code)]
//! Interactive RelayChain node

use clap::Parser;
use colored::*;
use relaychain::config::{load_config, ClusterConfig};
use relaychain::node::{Node, SubmitOutcome};
use relaychain::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Line index of this node in the cluster file
    id: usize,
    /// Cluster file, one address per line (overrides node.cluster_file)
    #[arg(long)]
    cluster: Option<String>,
    /// TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
    /// Seconds to wait for peers before showing the menu
    #[arg(long, default_value_t = 3)]
    startup_wait: u64,
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let cluster_file = cli
        .cluster
        .clone()
        .unwrap_or_else(|| config.node.cluster_file.clone());
    let cluster = ClusterConfig::load(&cluster_file, cli.id)?;

    let node = Arc::new(Node::new(cluster, &config)?);
    let handles = node.start().await?;
    println!("{}", format!("Node {} up!", node.id()).bright_green().bold());

    let peers = node.replicator().peer_count();
    let connected = node
        .wait_for_peers(peers, Duration::from_secs(cli.startup_wait))
        .await;
    println!("🔗 {}/{} peers connected", connected, peers);

    println!();
    println!("{}", "--- Welcome to RelayChain! ---".bright_cyan().bold());

    let mut integrity = handles.integrity;
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_menu();

        let line = tokio::select! {
            line = input.next_line() => line?,
            outcome = &mut integrity => integrity_exit(outcome),
        };
        let Some(option) = line else {
            break;
        };

        match option.trim() {
            "1" => send_transaction(&node, &mut input).await?,
            "2" => {
                let tip = node.tip_hash().await;
                println!("Current chain hash: {}", hex::encode(tip).bright_yellow());
            }
            "3" => println!("{}", node.chain_string().await),
            "q" | "Q" => {
                println!("Exiting...");
                break;
            }
            _ => println!(
                "{}",
                ">>> Invalid input! Please select one of the valid options.".red()
            ),
        }
    }

    handles.server.abort();
    Ok(())
}

fn print_menu() {
    println!("{}", "--------------------------------------".bright_black());
    println!("What would you like to do?");
    println!();
    println!("  {} Send a transaction", "1.".bright_white());
    println!("  {} View hash of local chain", "2.".bright_white());
    println!("  {} Print local chain", "3.".bright_white());
    println!("  {} Quit", "q.".bright_white());
    println!();
    println!("Type option:");
}

async fn send_transaction(
    node: &Node,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(">>> Enter recipient:");
    let recipient = input.next_line().await?.unwrap_or_default();

    println!(">>> Type transaction data:");
    let data = input.next_line().await?.unwrap_or_default();

    if data.is_empty() {
        println!("{}", ">>> Data cannot be empty!".red());
        return Ok(());
    }

    let transaction = Transaction::new(
        node.self_address(),
        recipient,
        relaychain::blockchain::timestamp_nanos(),
        data,
    );
    let tx_hash = transaction.hash_str();

    match node.submit_transaction(transaction).await {
        Ok(SubmitOutcome::Buffered { pending }) => {
            println!(
                "✅ Added transaction {} ({} pending)",
                tx_hash.bright_yellow(),
                pending
            );
            println!(">>> Sent transaction to all nodes!");
        }
        Ok(SubmitOutcome::Committed { hash, nonce }) => {
            println!("✅ Added transaction {}", tx_hash.bright_yellow());
            println!(
                "⛏️  Block mined and chained: {} (nonce {})",
                hex::encode(hash).bright_green(),
                nonce
            );
            println!(">>> Sent block to all nodes!");
        }
        Err(e) => println!("{} {}", "❌ Transaction failed:".red(), e),
    }
    Ok(())
}

fn integrity_exit(outcome: Result<relaychain::error::Result<()>, JoinError>) -> ! {
    match outcome {
        Ok(Err(e)) => eprintln!(
            "{} {}",
            "❌ Blockchain integrity compromised:".red().bold(),
            e
        ),
        Ok(Ok(())) => eprintln!("{}", "❌ Integrity sweep stopped".red().bold()),
        Err(e) => eprintln!("{} {}", "❌ Integrity sweep failed:".red().bold(), e),
    }
    std::process::exit(1);
}
