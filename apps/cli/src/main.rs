use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use inventory_core::{ConsoleView, HttpCatalog, InventoryError, InventoryManager, ListView};
use shared::domain::ItemId;
use storage::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

mod config;

use config::{load_settings, normalize_database_url};

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the remote collection service.
    #[arg(long)]
    api_base_url: Option<String>,
    /// SQLite database holding the local snapshot.
    #[arg(long)]
    database_url: Option<String>,
    /// Key the collection snapshot is stored under.
    #[arg(long)]
    snapshot_key: Option<String>,
}

const USAGE: &str = "commands: add <name> <price> | rm <id> | list | quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(v) = args.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.snapshot_key {
        settings.snapshot_key = v;
    }

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    let view = Arc::new(ConsoleView);
    let manager = InventoryManager::new(
        Arc::new(storage),
        Arc::new(HttpCatalog::new(settings.api_base_url.clone())),
        view.clone(),
        settings.snapshot_key.clone(),
    );

    info!("loading inventory, remote at {}", settings.api_base_url);
    manager.initialize().await?;

    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "add" => {
                let Some((name, price)) = rest.trim().rsplit_once(' ') else {
                    println!("usage: add <name> <price>");
                    continue;
                };
                match manager.add(name, price).await {
                    Ok(id) => println!("added (id {id})"),
                    Err(
                        err @ (InventoryError::EmptyName | InventoryError::InvalidPrice(_)),
                    ) => println!("{err}"),
                    Err(err) => return Err(err.into()),
                }
            }
            "rm" => {
                let id = rest.trim();
                if id.is_empty() {
                    println!("usage: rm <id>");
                    continue;
                }
                manager.remove(&ItemId::from(id)).await?;
            }
            "list" => {
                view.render(&manager.items().await);
            }
            "quit" | "exit" => break,
            _ => println!("{USAGE}"),
        }
    }

    Ok(())
}
