pub mod chat;
pub mod config;
pub mod db;
pub mod domain;
pub mod fallback;
pub mod knowledge;
pub mod models;
pub mod ollama;
pub mod router;
pub mod rules;
pub mod server;
pub mod text;

pub use config::AppConfig;
pub use router::ResponseRouter;
pub use server::run_server;
