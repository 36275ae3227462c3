use std::env;
use std::process::ExitCode;

use log::error;

use chefscript::history::RecipeHistory;
use chefscript::model::RecipeStatus;
use chefscript::pipelines::{feedspy, plagiarism as plagiarism_pipeline, recipe::RecipeBatch};
use chefscript::plagiarism::WinstonClient;
use chefscript::pricing::TOKEN_PACKAGES;
use chefscript::providers::{FluxClient, ImageGenerator, OpenAiClient, RecraftClient};
use chefscript::store::Backend;
use chefscript::AppConfig;

const USAGE: &str = "Usage: chefscript <command> [args]

Commands:
  generate <name>... [--recraft]   Generate recipe text and images
  check <file.html>                Check an HTML article for plagiarism
  extract <feed.txt> <count>       Extract recipe ideas from feed data
  balance                          Show the current token balance
  packages                         List purchasable token packages";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).ok_or(USAGE)?;

    let config = AppConfig::load()?;

    match command {
        "generate" => {
            let use_recraft = args.iter().any(|arg| arg == "--recraft");
            let names: Vec<String> = args[1..]
                .iter()
                .filter(|arg| !arg.starts_with("--"))
                .cloned()
                .collect();
            generate(&config, names, use_recraft).await
        }
        "check" => {
            let path = args.get(1).ok_or("Please provide an HTML file to check")?;
            check(&config, path).await
        }
        "extract" => {
            let path = args.get(1).ok_or("Please provide a feed data file")?;
            let count: u64 = args
                .get(2)
                .ok_or("Please provide a recipe count")?
                .parse()?;
            extract(&config, path, count).await
        }
        "balance" => {
            let store = Backend::new(&config)?;
            println!("Token balance: {}", store.token_balance().await?);
            Ok(())
        }
        "packages" => {
            for pkg in TOKEN_PACKAGES {
                println!("{:>4} tokens  ${:<3} {}", pkg.tokens, pkg.price_usd, pkg.description);
            }
            Ok(())
        }
        _ => Err(USAGE.into()),
    }
}

async fn generate(
    config: &AppConfig,
    names: Vec<String>,
    use_recraft: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = OpenAiClient::new(config)?;
    let store = Backend::new(config)?;

    let recraft;
    let flux;
    let images: &dyn ImageGenerator = if use_recraft {
        recraft = RecraftClient::new(config)?;
        &recraft
    } else {
        flux = FluxClient::new(config)?;
        &flux
    };

    let batch = RecipeBatch::new(&text, images, &store);
    let recipes = batch.run(&names).await?;

    let history = RecipeHistory::new(&config.history_path);
    history.record(&recipes).await?;

    for recipe in &recipes {
        match recipe.status {
            RecipeStatus::Error => {
                println!(
                    "{}: failed ({})",
                    recipe.name,
                    recipe.error.as_deref().unwrap_or("unknown error")
                );
            }
            _ => {
                println!(
                    "{}: {}",
                    recipe.name,
                    recipe.image_url.as_deref().unwrap_or("no image")
                );
                if let Some(parsed) = &recipe.parsed {
                    println!("{}", parsed.downloadable_text());
                }
            }
        }
    }
    Ok(())
}

async fn check(config: &AppConfig, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let html = tokio::fs::read_to_string(path).await?;
    let winston = WinstonClient::new(config)?;
    let store = Backend::new(config)?;

    let result = plagiarism_pipeline::check_html(&winston, &store, &html, &[]).await?;
    println!("Plagiarism score: {:.2}%", result.score * 100.0);
    println!(
        "Words checked: {}, plagiarized: {}",
        result.stats.word_count, result.stats.plagiarized_words
    );
    for (i, m) in result.matches.iter().enumerate() {
        println!(
            "Match {}: {} ({:.2}% similar)",
            i + 1,
            m.source,
            m.similarity * 100.0
        );
    }
    Ok(())
}

async fn extract(
    config: &AppConfig,
    path: &str,
    count: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let feed_data = tokio::fs::read_to_string(path).await?;
    let openai = OpenAiClient::new(config)?;
    let store = Backend::new(config)?;

    let names = feedspy::extract_recipe_ideas(&openai, &store, &feed_data, count).await?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}
