use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct FallbackConfig {
    pub model: Option<String>,
    pub max_output_tokens: usize,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub knowledge_path: Option<PathBuf>,
    pub regions_csv: Option<PathBuf>,
    pub ollama_base_url: String,
    pub search_base_url: String,
    pub fallback: FallbackConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("FLOODSENSE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Self {
            bind_addr: env::var("FLOODSENSE_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            data_dir,
            knowledge_path: non_empty_var("FLOODSENSE_KNOWLEDGE_PATH").map(PathBuf::from),
            regions_csv: non_empty_var("FLOODSENSE_REGIONS_CSV").map(PathBuf::from),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            search_base_url: env::var("SEARCH_BASE_URL")
                .unwrap_or_else(|_| "https://www.google.com/search".to_string()),
            fallback: FallbackConfig {
                // set FALLBACK_MODEL to an empty string for rule-only mode
                model: match env::var("FALLBACK_MODEL") {
                    Ok(value) if value.trim().is_empty() => None,
                    Ok(value) => Some(value.trim().to_string()),
                    Err(_) => Some("floodsense-t5".to_string()),
                },
                max_output_tokens: env::var("MAX_OUTPUT_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(150),
                temperature: env::var("FALLBACK_TEMPERATURE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.7),
            },
        }
    }

    pub fn sqlite_dsn(&self) -> String {
        format!(
            "sqlite://{}",
            self.data_dir.join("floodsense.sqlite3").display()
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            knowledge_path: None,
            regions_csv: None,
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            search_base_url: "https://www.google.com/search".to_string(),
            fallback: FallbackConfig {
                model: Some("floodsense-t5".to_string()),
                max_output_tokens: 150,
                temperature: 0.7,
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
