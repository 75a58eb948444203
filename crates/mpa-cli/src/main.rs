//! MPA CLI - Command-line interface
//!
//! Usage:
//!   mpa ingest <path> [--collection NAME]
//!   mpa query <question> [--collection NAME] [--max-docs N] [--json]
//!   mpa info [--collection NAME]
//!   mpa analyze-resume --resume FILE --job-description FILE|TEXT
//!   mpa vehicle --image FILE [--description TEXT]

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mpa_core::{AgentError, AppConfig, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mpa")]
#[command(about = "Personal assistant: knowledge-base Q&A, resume analysis and vehicle diagnostics")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a file or a directory of documents to the knowledge base
    Ingest {
        /// File or directory (pdf, docx, txt, md)
        path: PathBuf,

        /// Target collection (defaults to index.default_collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Ask a question, grounded in a collection when one is given
    Query {
        question: String,

        /// Collection to retrieve context from
        #[arg(long)]
        collection: Option<String>,

        /// Maximum number of context documents (defaults to rag.max_context_docs)
        #[arg(long)]
        max_docs: Option<usize>,

        /// Sampling temperature (defaults to llm.temperature)
        #[arg(long)]
        temperature: Option<f32>,

        /// Replace the default system prompt
        #[arg(long)]
        system_prompt: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show collection statistics
    Info {
        #[arg(long)]
        collection: Option<String>,
    },

    /// Score a resume against a job description
    AnalyzeResume {
        /// Resume file (pdf, docx, txt, md)
        #[arg(long)]
        resume: PathBuf,

        /// Job description file, or the description text itself
        #[arg(long)]
        job_description: String,

        /// Skip the generative review
        #[arg(long)]
        no_review: bool,

        /// Write the analysis as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Diagnose a vehicle problem from a dashboard photo
    Vehicle {
        #[arg(long)]
        image: PathBuf,

        /// What happened, in your own words
        #[arg(long)]
        description: Option<String>,

        /// Leave out roadside assistance contacts
        #[arg(long)]
        no_contacts: bool,

        /// Write the diagnosis as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mpa={}", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// One-line error naming the collaborator that failed
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<AgentError>() {
        Some(agent) => format!("{} failed: {err:#}", agent.collaborator()),
        None => format!("{err:#}"),
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ingest { path, collection } => {
            commands::ingest(&config, &path, collection.as_deref()).await
        }
        Commands::Query {
            question,
            collection,
            max_docs,
            temperature,
            system_prompt,
            json,
        } => {
            let mut request = mpa_rag::QueryRequest::new(question)
                .max_context_docs(max_docs.unwrap_or(config.rag.max_context_docs))
                .temperature(temperature.unwrap_or(config.llm.temperature));
            if let Some(collection) = collection {
                request = request.collection(collection);
            }
            if let Some(prompt) = system_prompt {
                request = request.system_prompt(prompt);
            }
            commands::query(&config, &request, json).await
        }
        Commands::Info { collection } => commands::info(&config, collection.as_deref()).await,
        Commands::AnalyzeResume {
            resume,
            job_description,
            no_review,
            output,
        } => {
            commands::analyze_resume(
                &config,
                &resume,
                &job_description,
                !no_review,
                output.as_deref(),
            )
            .await
        }
        Commands::Vehicle {
            image,
            description,
            no_contacts,
            output,
        } => {
            commands::vehicle(
                &config,
                &image,
                description.as_deref(),
                !no_contacts,
                output.as_deref(),
            )
            .await
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()).context("loading configuration") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: configuration failed: {err:#}");
            std::process::exit(2);
        }
    };
    init_tracing(&config.logging);

    if let Err(err) = run(cli, config).await {
        tracing::debug!(error = ?err, "Command failed");
        eprintln!("Error: {}", describe_error(&err));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_flags() {
        let cli = Cli::try_parse_from([
            "mpa",
            "query",
            "What is in my notes?",
            "--collection",
            "notes",
            "--max-docs",
            "3",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                question,
                collection,
                max_docs,
                json,
                ..
            } => {
                assert_eq!(question, "What is in my notes?");
                assert_eq!(collection.as_deref(), Some("notes"));
                assert_eq!(max_docs, Some(3));
                assert!(json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_parse_vehicle_defaults() {
        let cli = Cli::try_parse_from(["mpa", "vehicle", "--image", "dash.jpg"]).unwrap();
        match cli.command {
            Commands::Vehicle {
                image,
                description,
                no_contacts,
                output,
            } => {
                assert_eq!(image, PathBuf::from("dash.jpg"));
                assert!(description.is_none());
                assert!(!no_contacts);
                assert!(output.is_none());
            }
            _ => panic!("expected vehicle command"),
        }
    }

    #[test]
    fn test_error_names_collaborator() {
        let err = anyhow::Error::new(AgentError::retrieval("local", "snapshot unreadable"));
        assert!(describe_error(&err).starts_with("retrieval failed:"));

        let plain = anyhow::anyhow!("boom");
        assert_eq!(describe_error(&plain), "boom");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpa.toml");
        std::fs::write(&path, "[rag]\nmax_context_length = 4000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.rag.max_context_length, 4000);
    }

    #[test]
    fn test_example_config_parses() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/mpa.example.toml");
        let config = AppConfig::from_file(path).unwrap();
        assert_eq!(config.index.default_collection, "personal_agent");
        assert_eq!(config.rag.chunk_overlap, 200);
    }
}
