//! Entry point for the `arec` CLI.
//!
//! ```sh
//! arec init
//! arec structure raw_assessments.json -o structured_assessments.json
//! arec build structured_assessments.json
//! arec search "Java developer who works with business teams" -k 7
//! arec recommend --url https://jobs.example.com/data-analyst
//! arec serve --bind 127.0.0.1:8000
//! arec eval labeled_queries.jsonl --report recall.json
//! ```

use assessment_recommender::builder::{build_index, read_records};
use assessment_recommender::catalog::structure_file;
use assessment_recommender::commands::{ArtifactArgs, Cli, Commands};
use assessment_recommender::config::{RecommenderConfig, resolve_config, write_default_config};
use assessment_recommender::embedding::SentenceEmbeddingsModel;
use assessment_recommender::eval::{evaluate, read_cases};
use assessment_recommender::retriever::Recommender;
use assessment_recommender::service::{RecommendRequest, RecommendService};
use assessment_recommender::{config_dir, pretty, server};
use clap::Parser;
use once_cell::sync::OnceCell;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let cli = Cli::parse();
    run(cli)
}

fn with_artifacts(mut config: RecommenderConfig, args: &ArtifactArgs) -> RecommenderConfig {
    if let Some(index) = &args.index {
        config.index_path = index.clone();
    }
    if let Some(metadata) = &args.metadata {
        config.metadata_path = metadata.clone();
    }
    config
}

fn load_model(config: &RecommenderConfig) -> Result<SentenceEmbeddingsModel, Box<dyn Error>> {
    let source = config.model_source();
    info!("Loading embedding model {}", source.label());
    Ok(SentenceEmbeddingsModel::load(&source, config.encode_options())?)
}

fn open_recommender(config: &RecommenderConfig) -> Result<Recommender, Box<dyn Error>> {
    let model = load_model(config)?;
    Ok(Recommender::open(&config.artifact_paths(), Arc::new(model))?)
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let default_path = config_dir()?.join("config.yaml");
    if let Commands::Init = cli.command {
        debug!("Initializing configuration");
        return write_default_config(&default_path);
    }

    let config = resolve_config(cli.config.as_deref(), &default_path)?;
    debug!("Config loaded: {:?}", config);

    match cli.command {
        Commands::Init => {}
        Commands::Structure { input, output } => {
            let count = structure_file(&input, &output)?;
            println!("Structured {count} assessments into {}", output.display());
        }
        Commands::Build { input, artifacts } => {
            let config = with_artifacts(config, &artifacts);
            let records = read_records(&input)?;
            let model = load_model(&config)?;
            let report = build_index(records, &model, &config.artifact_paths())?;
            println!(
                "Indexed {} assessments ({} dimensions, {})",
                report.records, report.dimension, report.model_id
            );
        }
        Commands::Search { query, top_k, artifacts } => {
            let config = with_artifacts(config, &artifacts);
            let recommender = open_recommender(&config)?;
            let results = recommender.search(&query, top_k)?;
            pretty::print_results(&results)?;
        }
        Commands::Recommend {
            text,
            url,
            top_k,
            artifacts,
        } => {
            let config = with_artifacts(config, &artifacts);
            let service = RecommendService::from_config(&config)?;
            let request = RecommendRequest {
                query_text: text,
                query_url: url,
                top_k,
            };
            let response = runtime()?.block_on(service.recommend(&request))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve { bind, artifacts } => {
            let config = with_artifacts(config, &artifacts);
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            runtime()?.block_on(server::serve(&config, &bind))?;
        }
        Commands::Eval {
            cases,
            k,
            report,
            artifacts,
        } => {
            let config = with_artifacts(config, &artifacts);
            let cases = read_cases(&cases)?;
            let recommender = open_recommender(&config)?;
            let results = evaluate(&recommender, &cases, k)?;
            for case in &results.cases {
                println!("{:.4}  {}", case.recall, case.query);
            }
            println!("Mean Recall@{}: {:.4}", results.k, results.mean_recall);
            if let Some(path) = report {
                results.save(&path)?;
            }
        }
    }

    Ok(())
}
