use anyhow::Result;
use dayplan::adapters::memory::{MemoryIdentity, MemoryStore};
use dayplan::intents::{self, Intent};
use dayplan::{AppSettings, ScheduleEngine, ScheduleRepository, Session};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match std::env::var_os("DAYPLAN_SETTINGS") {
        Some(path) => AppSettings::load(Path::new(&path))?,
        None => AppSettings::default(),
    };

    let identity = Arc::new(MemoryIdentity::new());
    let store = Arc::new(MemoryStore::new());
    let session = Arc::new(Session::new(identity));
    session.start();

    let repository = ScheduleRepository::new(store, &settings);
    let engine = ScheduleEngine::new(repository, session.clone());

    println!("dayplan - type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match intents::parse(line) {
            Ok(Intent::Quit) => break,
            Ok(intent) => match intents::dispatch(intent, &session, &engine).await {
                Ok(output) => println!("{}", output),
                Err(err) => eprintln!("error: {}", err),
            },
            Err(message) => eprintln!("{}", message),
        }
    }

    session.stop();
    Ok(())
}
