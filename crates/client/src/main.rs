//! CLI for driving and watching a live player auction.
//!
//! This binary provides commands for:
//! - Running the auction as the operator (select, raise, sold, unsold, undo)
//! - Submitting sealed bids on behalf of a team
//! - Querying console state
//! - Watching the auction as a polling observer

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::info;

use hammer_client::{render_summary, StateObserver};
use hammer_types::{Player, StateSnapshot, Team};

#[derive(Parser)]
#[command(name = "hammer")]
#[command(about = "CLI for the live player auction console")]
struct Cli {
    /// Console RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9210")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a tournament setup file into the console
    Init {
        /// Path to a setup JSON file (config, players, teams)
        #[arg(long)]
        setup: std::path::PathBuf,
    },

    /// Put a lot on the block
    Select {
        /// Player serial to select; omit for a random pick
        #[arg(long)]
        serial: Option<u32>,

        /// Pick among lots carried over unsold from earlier pools
        #[arg(long)]
        carry_over: bool,

        /// Switch the active pool
        #[arg(long)]
        pool: Option<String>,
    },

    /// Take the current lot off the block without an outcome
    Clear,

    /// Raise the bid for a team
    Raise {
        /// Team id
        #[arg(long)]
        team: u64,

        /// Manual amount overriding increment stepping
        #[arg(long)]
        amount: Option<u64>,
    },

    /// Hammer the current lot down to the leading team
    Sold,

    /// Pass the current lot in
    Unsold,

    /// Return a terminal lot to the block
    Reopen {
        /// Player id
        #[arg(long)]
        player: u64,
    },

    /// Reverse the most recent reversible transition
    Undo,

    /// Wipe the tournament back to its pre-auction state
    Reset,

    /// Toggle sealed bidding for the current lot
    SecretBidding {
        /// Enable (true) or disable (false)
        #[arg(long)]
        enabled: bool,
    },

    /// Submit a sealed bid for a team
    SecretBid {
        /// Team id
        #[arg(long)]
        team: u64,

        /// Serial of the lot the bid targets
        #[arg(long)]
        lot_serial: u32,

        /// Bid amount
        #[arg(long)]
        amount: u64,
    },

    /// Open the sealed bids and sell to the best-ranked eligible bidder
    Reveal,

    /// Set the viewer ticker message
    SetMessage {
        /// Message text
        text: String,
    },

    /// Clear the viewer ticker message
    ClearMessage,

    /// Show the full console state
    State,

    /// List all players
    Players,

    /// List all teams
    Teams,

    /// Show which teams may bid right now, with reasons
    Eligible,

    /// Poll the console and print every state change
    Watch {
        /// Poll interval in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
    },
}

fn print_snapshot(snapshot: &StateSnapshot) {
    println!("{}", render_summary(snapshot));
    for team in &snapshot.teams {
        println!(
            "  [{}] {} purse={} bought={}",
            team.id, team.name, team.purse_remaining, team.bought
        );
    }
}

async fn command_snapshot(
    client: &HttpClient,
    method: &str,
    params: serde_json::Value,
) -> Result<()> {
    let snapshot: StateSnapshot = client.request(method, vec![params]).await?;
    print_snapshot(&snapshot);
    Ok(())
}

async fn command_snapshot_no_params(client: &HttpClient, method: &str) -> Result<()> {
    let snapshot: StateSnapshot = client.request(method, Vec::<()>::new()).await?;
    print_snapshot(&snapshot);
    Ok(())
}

async fn secret_bid_cmd(
    client: &HttpClient,
    team: u64,
    lot_serial: u32,
    amount: u64,
) -> Result<()> {
    #[derive(serde::Deserialize)]
    struct Receipt {
        accepted: bool,
        reason: Option<String>,
    }

    let params = serde_json::json!({
        "team": team,
        "lot_serial": lot_serial,
        "amount": amount
    });
    let receipt: Receipt = client.request("secret_submitBid", vec![params]).await?;

    if receipt.accepted {
        println!("Sealed bid accepted for team {team}");
    } else {
        println!(
            "Sealed bid rejected: {}",
            receipt.reason.unwrap_or_else(|| "no reason given".into())
        );
    }
    Ok(())
}

async fn players_cmd(client: &HttpClient) -> Result<()> {
    let players: Vec<Player> = client.request("query_listPlayers", Vec::<()>::new()).await?;

    if players.is_empty() {
        println!("No players registered");
        return Ok(());
    }
    for p in players {
        let mut line = format!("[{}] {} (serial {}) base={}", p.id, p.name, p.serial, p.base_price);
        line.push_str(&format!(" {:?}", p.status));
        if let (Some(team), Some(price)) = (p.team, p.sold_price) {
            line.push_str(&format!(" -> team {team} @ {price}"));
        }
        println!("{line}");
    }
    Ok(())
}

async fn teams_cmd(client: &HttpClient) -> Result<()> {
    let teams: Vec<Team> = client.request("query_listTeams", Vec::<()>::new()).await?;

    for t in teams {
        println!(
            "[{}] {} purse={} spent={} bought={}",
            t.id,
            t.name,
            t.purse_remaining(),
            t.spent,
            t.bought
        );
    }
    Ok(())
}

async fn eligible_cmd(client: &HttpClient) -> Result<()> {
    #[derive(serde::Deserialize)]
    struct Verdict {
        team: u64,
        eligible: bool,
        candidate_bid: u64,
        reason: Option<String>,
    }

    let verdicts: Vec<Verdict> = client
        .request("query_getEligibleTeams", Vec::<()>::new())
        .await?;

    for v in verdicts {
        if v.eligible {
            println!("team {} may bid (next: {})", v.team, v.candidate_bid);
        } else {
            println!(
                "team {} may not bid: {}",
                v.team,
                v.reason.unwrap_or_else(|| "ineligible".into())
            );
        }
    }
    Ok(())
}

async fn watch_cmd(client: &HttpClient, interval: u64) -> Result<()> {
    let mut observer = StateObserver::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    info!(interval, "Watching auction state");
    loop {
        ticker.tick().await;
        let snapshot: StateSnapshot = match client
            .request("query_getState", Vec::<()>::new())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                // Transient; keep polling.
                tracing::warn!(%err, "Poll failed");
                continue;
            }
        };
        if let Some(applied) = observer.observe(snapshot) {
            println!("{}", render_summary(applied));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hammer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default().build(&cli.rpc)?;

    match cli.command {
        Commands::Init { setup } => {
            let raw = std::fs::read_to_string(&setup)?;
            let setup_json: serde_json::Value = serde_json::from_str(&raw)?;
            let _: bool = client.request("admin_init", vec![setup_json]).await?;
            println!("Tournament initialized");
        }

        Commands::Select {
            serial,
            carry_over,
            pool,
        } => {
            let params = serde_json::json!({
                "serial": serial,
                "carry_over": carry_over,
                "pool": pool
            });
            command_snapshot(&client, "operator_selectLot", params).await?;
        }

        Commands::Clear => {
            command_snapshot_no_params(&client, "operator_clearLot").await?;
        }

        Commands::Raise { team, amount } => {
            let params = serde_json::json!({ "team": team, "amount": amount });
            command_snapshot(&client, "operator_raiseBid", params).await?;
        }

        Commands::Sold => {
            command_snapshot_no_params(&client, "operator_markSold").await?;
        }

        Commands::Unsold => {
            command_snapshot_no_params(&client, "operator_markUnsold").await?;
        }

        Commands::Reopen { player } => {
            let params = serde_json::json!({ "player": player });
            command_snapshot(&client, "operator_reopen", params).await?;
        }

        Commands::Undo => {
            command_snapshot_no_params(&client, "operator_undo").await?;
        }

        Commands::Reset => {
            command_snapshot_no_params(&client, "operator_reset").await?;
        }

        Commands::SecretBidding { enabled } => {
            let snapshot: StateSnapshot = client
                .request("operator_setSecretBidding", vec![enabled])
                .await?;
            print_snapshot(&snapshot);
        }

        Commands::SecretBid {
            team,
            lot_serial,
            amount,
        } => {
            secret_bid_cmd(&client, team, lot_serial, amount).await?;
        }

        Commands::Reveal => {
            command_snapshot_no_params(&client, "operator_revealSecretBids").await?;
        }

        Commands::SetMessage { text } => {
            let _: bool = client.request("operator_setMessage", vec![text]).await?;
            println!("Message set");
        }

        Commands::ClearMessage => {
            let _: bool = client
                .request("operator_clearMessage", Vec::<()>::new())
                .await?;
            println!("Message cleared");
        }

        Commands::State => {
            command_snapshot_no_params(&client, "query_getState").await?;
        }

        Commands::Players => {
            players_cmd(&client).await?;
        }

        Commands::Teams => {
            teams_cmd(&client).await?;
        }

        Commands::Eligible => {
            eligible_cmd(&client).await?;
        }

        Commands::Watch { interval } => {
            watch_cmd(&client, interval).await?;
        }
    }

    Ok(())
}
