mod cli;
mod config;
mod console;
mod history;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use docvoice_core::Message;
use docvoice_model::{ChatClient, GeminiClient, GeminiConfig};
use docvoice_realtime::TextChat;
use docvoice_session::{CallStore, DirCallStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(cli.data_dir)?;
    match &cli.otlp_endpoint {
        Some(endpoint) => docvoice_telemetry::init_with_otlp("docvoice", endpoint),
        None => docvoice_telemetry::init_telemetry("docvoice"),
    }
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let store: Arc<dyn CallStore> = Arc::new(DirCallStore::open(config.data_dir.clone()).await?);

    let outcome = match cli.command {
        Commands::Call { mode, language } => {
            console::run_call(config.api_key()?, store, mode, language).await
        }
        Commands::Chat { text } => {
            let client = GeminiClient::new(GeminiConfig::new(config.api_key()?))?;
            let chat = TextChat::new(Some(ChatClient::new(Arc::new(client))), Some(store));
            let reply = chat.reply(Vec::new(), Message::user(text.join(" "))).await;
            println!("{}", reply.text);
            Ok(())
        }
        Commands::History { limit } => history::print(store.as_ref(), limit).await,
    };
    docvoice_telemetry::shutdown_telemetry();
    outcome
}
