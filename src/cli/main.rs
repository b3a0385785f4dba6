use anyhow::{bail, Context, Result};
use archive_search::enrichment::{DocumentEnhancer, TagAnalyzer};
use archive_search::models::{IndexingJob, WorkRecord};
use archive_search::search::{QueryBuilder, SearchRequest};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "archive-search-cli")]
#[command(about = "Archive search CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enhance a work record file and print the index document
    Enhance {
        #[arg(value_name = "WORK_FILE")]
        file: PathBuf,
    },

    /// Print the tag-quality analysis of a work record file
    Analyze {
        #[arg(value_name = "WORK_FILE")]
        file: PathBuf,
    },

    /// Compile a search request file into the index query body
    Compile {
        #[arg(value_name = "REQUEST_FILE")]
        file: PathBuf,
    },

    /// Search the running server
    Search {
        #[arg(value_name = "QUERY")]
        query: Option<String>,

        #[arg(short, long)]
        fandom: Vec<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        facets: bool,
    },

    /// Submit a bulk indexing file (JSON or YAML list of jobs)
    Bulk {
        #[arg(value_name = "JOBS_FILE")]
        file: PathBuf,
    },

    /// Show background indexing queue status
    Status,

    /// Check server health
    Health,
}

/// Read JSON or YAML, chosen by file extension
fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
    };
    Ok(parsed)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: Value = response.json().await.context("server returned a non-JSON body")?;
    print_json(&body)?;
    if !status.is_success() {
        bail!("server responded with {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Enhance { file } => {
            let record: WorkRecord = read_file(&file)?;
            let doc = DocumentEnhancer::default().enhance_record(record);
            print_json(&doc)?;
        }

        Commands::Analyze { file } => {
            let record: WorkRecord = read_file(&file)?;
            let enhancer = DocumentEnhancer::default();
            let doc = enhancer.enhance_record(record);
            let analysis = TagAnalyzer::new(enhancer.weights().clone()).analyze(&doc);
            print_json(&analysis)?;
        }

        Commands::Compile { file } => {
            let request: SearchRequest = read_file(&file)?;
            let compiled = QueryBuilder::default()
                .build(&request)
                .context("search request rejected")?;
            print_json(&compiled.to_json())?;
        }

        Commands::Search {
            query,
            fandom,
            page,
            limit,
            facets,
        } => {
            let response = client
                .post(format!("{}/v1/search", cli.endpoint))
                .json(&json!({
                    "query": query,
                    "fandoms": fandom,
                    "page": page,
                    "limit": limit,
                    "include_facets": facets,
                }))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Bulk { file } => {
            let jobs: Vec<IndexingJob> = read_file(&file)?;
            if jobs.is_empty() {
                bail!("{} contains no jobs", file.display());
            }
            let response = client
                .post(format!("{}/v1/works/bulk", cli.endpoint))
                .json(&json!({ "jobs": jobs }))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/v1/indexing/status", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }
    }

    Ok(())
}
