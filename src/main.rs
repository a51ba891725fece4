use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use floodsense::chat::ChatService;
use floodsense::db::Database;
use floodsense::fallback::ModelFallback;
use floodsense::knowledge::KnowledgeStore;
use floodsense::{run_server, AppConfig, ResponseRouter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let db = Database::new(&config).await?;
    let store = KnowledgeStore::load(&config).await?;

    let generation_limit = Arc::new(Semaphore::new(1));
    let fallback = ModelFallback::from_config(&config, generation_limit).await;

    let router = ResponseRouter::new(store, fallback, &config.search_base_url)?;
    let chat = ChatService::new(db.clone(), router);

    run_server(config, db, chat).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
