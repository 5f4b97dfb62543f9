use anyhow::{Context, Result};
use api_transport::{logging, Config, QueryParams, Transport, Verb};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "api-transport")]
#[command(about = "Issue one call through the API transport", long_about = None)]
struct Cli {
    /// HTTP verb
    #[arg(value_enum)]
    verb: CliVerb,
    /// Path relative to the backend base URL
    path: String,
    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "param")]
    params: Vec<String>,
    /// JSON body for post/put/patch
    #[arg(short, long)]
    body: Option<String>,
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Print the metrics snapshot after the call
    #[arg(long)]
    metrics: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<CliVerb> for Verb {
    fn from(verb: CliVerb) -> Self {
        match verb {
            CliVerb::Get => Verb::Get,
            CliVerb::Post => Verb::Post,
            CliVerb::Put => Verb::Put,
            CliVerb::Patch => Verb::Patch,
            CliVerb::Delete => Verb::Delete,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_tracing("info");

    let cli = Cli::parse();

    let mut config = Config::load_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_env_overrides();
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    let params = parse_params(&cli.params)?;
    let body = cli
        .body
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--body is not valid JSON")?;

    let transport = Transport::new(config)?;
    let verb = Verb::from(cli.verb);
    info!("{} {}", verb, cli.path);

    let result = match verb {
        Verb::Get => transport.get(&cli.path, Some(params)).await,
        Verb::Delete => transport.delete(&cli.path, Some(params)).await,
        Verb::Post => transport.post(&cli.path, body).await,
        Verb::Put => transport.put(&cli.path, body).await,
        Verb::Patch => transport.patch(&cli.path, body).await,
    };

    if cli.metrics {
        let snapshot = transport.get_metrics().await;
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    transport.destroy().await;

    let payload = result?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<QueryParams> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("parameter '{}' is not key=value", pair))
        })
        .collect()
}
