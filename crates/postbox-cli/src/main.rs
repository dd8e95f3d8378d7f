//! postbox - run the dispatcher and manage its queue.
//!
//! Logs go to stderr; `list` and `status` print JSON on stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing_subscriber::EnvFilter;

use postbox_core::app::status_counts;
use postbox_core::domain::NewMessage;
use postbox_core::impls::SqliteStore;
use postbox_core::ports::MessageStore;
use postbox_core::{PostboxBuilder, PostboxConfig};

#[derive(Parser, Debug)]
#[command(name = "postbox")]
#[command(about = "Drain the queued_emails table through a mail transport", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file; built-in defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides `store.path`)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log at debug level (ignored when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dispatcher until Ctrl-C
    Run,
    /// Queue one message
    Enqueue {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,
    },
    /// Queue messages for random fake recipients
    Seed {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Print every row as a JSON array
    List,
    /// Print row counts per status as JSON
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Run => cmd_run(config).await,
        Command::Enqueue { name, email } => cmd_enqueue(&config, name, email).await,
        Command::Seed { count } => cmd_seed(&config, count).await,
        Command::List => cmd_list(&config).await,
        Command::Status => cmd_status(&config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "postbox=debug,postbox_core=debug"
    } else {
        "postbox=info,postbox_core=info"
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<PostboxConfig> {
    let mut config = match &cli.config {
        Some(path) => PostboxConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PostboxConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    Ok(config)
}

fn open_store(config: &PostboxConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.store.path)
        .with_context(|| format!("opening database {}", config.store.path.display()))
}

async fn cmd_run(config: PostboxConfig) -> anyhow::Result<()> {
    let handle = PostboxBuilder::new(config)
        .build()
        .context("starting dispatcher")?
        .spawn();
    tracing::info!("dispatcher running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;

    tracing::info!("shutdown requested");
    handle.shutdown_and_join().await;
    Ok(())
}

async fn cmd_enqueue(config: &PostboxConfig, name: String, email: String) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = store.insert(NewMessage::new(name, email)).await?;
    tracing::info!(message_id = %id, "queued");
    println!("{}", id.get());
    Ok(())
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Grace", "Ken", "Margaret",
];
const LAST_NAMES: &[&str] = &[
    "Dijkstra", "Hamilton", "Hopper", "Liskov", "Lovelace", "Ritchie", "Thompson", "Turing",
];

fn fake_recipient(rng: &mut impl Rng) -> NewMessage {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Lovelace");
    let suffix: u32 = rng.gen_range(1..10_000);
    NewMessage::new(
        format!("{first} {last}"),
        format!(
            "{}.{}{suffix}@example.com",
            first.to_lowercase(),
            last.to_lowercase()
        ),
    )
}

async fn cmd_seed(config: &PostboxConfig, count: usize) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let messages: Vec<NewMessage> = {
        let mut rng = rand::thread_rng();
        (0..count).map(|_| fake_recipient(&mut rng)).collect()
    };

    for message in messages {
        store.insert(message).await?;
    }
    tracing::info!(count, "seeded fake recipients");
    Ok(())
}

async fn cmd_list(config: &PostboxConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let records = store.list_all().await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn cmd_status(config: &PostboxConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let counts = status_counts(&store).await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
