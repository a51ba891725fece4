use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use floodsense::config::AppConfig;
use floodsense::fallback::ModelFallback;
use floodsense::knowledge::KnowledgeStore;
use floodsense::models::Route;
use floodsense::router::ResponseRouter;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Run a routing/answer evaluation set against the response router")]
struct Cli {
    #[arg(long, default_value = "eval/prompts.jsonl")]
    file: String,
    /// Skip the model even if one is configured.
    #[arg(long, default_value_t = false)]
    rule_only: bool,
    /// Exit with an error when any prompt misses its expectations.
    #[arg(long, default_value_t = false)]
    strict: bool,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct EvalPrompt {
    id: String,
    question: String,
    #[serde(default)]
    expect_route: Option<Route>,
    #[serde(default)]
    expect_contains: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let store = KnowledgeStore::load(&config).await?;
    let fallback = if cli.rule_only {
        ModelFallback::disabled()
    } else {
        ModelFallback::from_config(&config, Arc::new(Semaphore::new(1))).await
    };
    let router = ResponseRouter::new(store, fallback, &config.search_base_url)?;

    let prompts = load_prompts(&cli.file)?;
    if prompts.is_empty() {
        anyhow::bail!("no prompts found in {}", cli.file);
    }

    let mut total = 0usize;
    let mut passed = 0usize;
    let mut route_expectations = 0usize;
    let mut route_hits = 0usize;
    let mut contains_expectations = 0usize;
    let mut contains_hits = 0usize;
    let mut referral_expected = 0usize;
    let mut referral_hits = 0usize;
    let mut failed_ids = Vec::new();

    for prompt in prompts {
        total += 1;
        let routed = router.respond(&prompt.question).await;
        let answer_lower = routed.text.to_lowercase();

        let mut prompt_pass = true;

        if let Some(expected) = prompt.expect_route {
            route_expectations += 1;
            if expected == routed.route {
                route_hits += 1;
            } else {
                prompt_pass = false;
            }

            if expected == Route::Referral {
                referral_expected += 1;
                if routed.route == Route::Referral {
                    referral_hits += 1;
                }
            }
        }

        if !prompt.expect_contains.is_empty() {
            contains_expectations += 1;
            let all_found = prompt
                .expect_contains
                .iter()
                .all(|needle| answer_lower.contains(&needle.to_lowercase()));
            if all_found {
                contains_hits += 1;
            } else {
                prompt_pass = false;
            }
        }

        if prompt_pass {
            passed += 1;
        } else {
            failed_ids.push(prompt.id.clone());
        }

        if cli.verbose || !prompt_pass {
            println!(
                "--- {} [{}] {} ---",
                prompt.id,
                routed.route.as_str(),
                if prompt_pass { "PASS" } else { "FAIL" }
            );
            println!("Q: {}", prompt.question);
            println!("A: {}", routed.text.replace('\n', " "));
            println!();
        }
    }

    println!("Eval prompts: {}", total);
    println!("Passed: {:.1}% ({}/{})", ratio(passed, total) * 100.0, passed, total);
    if route_expectations > 0 {
        println!(
            "Route accuracy: {:.1}% ({}/{})",
            ratio(route_hits, route_expectations) * 100.0,
            route_hits,
            route_expectations
        );
    }
    if contains_expectations > 0 {
        println!(
            "Content accuracy: {:.1}% ({}/{})",
            ratio(contains_hits, contains_expectations) * 100.0,
            contains_hits,
            contains_expectations
        );
    }
    if referral_expected > 0 {
        println!(
            "Out-of-domain referral rate: {:.1}% ({}/{})",
            ratio(referral_hits, referral_expected) * 100.0,
            referral_hits,
            referral_expected
        );
    }

    if cli.strict && !failed_ids.is_empty() {
        anyhow::bail!("failed prompts: {}", failed_ids.join(", "));
    }

    Ok(())
}

fn load_prompts(path: &str) -> Result<Vec<EvalPrompt>> {
    let file = File::open(path).with_context(|| format!("failed opening {}", path))?;
    let reader = BufReader::new(file);
    let mut prompts = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: EvalPrompt = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON at {} line {}", path, idx + 1))?;
        prompts.push(parsed);
    }

    Ok(prompts)
}

fn ratio(n: usize, d: usize) -> f32 {
    if d == 0 {
        return 0.0;
    }
    n as f32 / d as f32
}
