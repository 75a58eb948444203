//! Command handlers
//!
//! Each handler builds only the collaborators its command needs from the
//! loaded [`AppConfig`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mpa_assist::{ResumeAnalysis, ResumeAnalyzer, VehicleDiagnostics};
use mpa_ats::Scorer;
use mpa_core::{
    AgentError, AppConfig, EmbeddingClient, GenerativeBackend, ImageInput, VectorIndex,
};
use mpa_parser::FileType;
use mpa_rag::{
    add_knowledge, chunk_text, create_llm_client, KnowledgeDocument, QueryRequest, RagEngine,
};
use mpa_vector::{create_embedding_client, create_index, CacheConfig, CachedEmbedder};
use walkdir::WalkDir;

// ============================================================================
// Wiring
// ============================================================================

fn build_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn GenerativeBackend>> {
    Ok(Arc::from(create_llm_client(&config.llm)?))
}

fn build_embedder(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    let inner: Arc<dyn EmbeddingClient> =
        Arc::from(create_embedding_client(&config.embedding, &config.llm)?);
    Ok(Arc::new(CachedEmbedder::with_config(
        inner,
        &CacheConfig::from(&config.rag),
    )))
}

async fn build_index(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    Ok(Arc::from(create_index(&config.index).await?))
}

async fn build_engine(config: &AppConfig) -> anyhow::Result<RagEngine> {
    let embedder = build_embedder(config)?;
    let index = build_index(config).await?;
    let backend = build_backend(config)?;
    Ok(RagEngine::new(embedder, index, backend, config.rag.clone()))
}

fn collection_or_default<'a>(config: &'a AppConfig, collection: Option<&'a str>) -> &'a str {
    collection
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(config.index.default_collection.as_str())
}

fn extract(path: &Path) -> Result<String, AgentError> {
    Ok(mpa_parser::extract_text(path)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("\nFull analysis saved to: {}", path.display());
    Ok(())
}

// ============================================================================
// Ingest
// ============================================================================

/// Supported files under `path`, in a stable order. Symlinks are not followed.
fn collect_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if FileType::from_path(entry.path()) != FileType::Unknown {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Chunk a document's text into knowledge documents tagged with their origin
fn to_documents(
    source: &Path,
    text: &str,
    chunk_size: usize,
    overlap: usize,
    ingested_at: &str,
) -> Vec<KnowledgeDocument> {
    chunk_text(text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            KnowledgeDocument::new(chunk)
                .with_metadata("source", source.display().to_string())
                .with_metadata("chunk", i.to_string())
                .with_metadata("ingested_at", ingested_at)
        })
        .collect()
}

pub async fn ingest(
    config: &AppConfig,
    path: &Path,
    collection: Option<&str>,
) -> anyhow::Result<()> {
    let collection = collection_or_default(config, collection);
    let files = collect_files(path)?;
    if files.is_empty() {
        println!("No supported documents found in {}", path.display());
        return Ok(());
    }

    // Ingestion only embeds and stores; no generative backend is built
    let embedder = build_embedder(config)?;
    let index = build_index(config).await?;
    let ingested_at = chrono::Utc::now().to_rfc3339();

    let mut chunk_total = 0;
    for file in &files {
        let text = extract(file)?;
        let documents = to_documents(
            file,
            &text,
            config.rag.chunk_size,
            config.rag.chunk_overlap,
            &ingested_at,
        );
        if documents.is_empty() {
            tracing::warn!(path = %file.display(), "No text extracted, skipping");
            continue;
        }

        let ids =
            add_knowledge(embedder.as_ref(), index.as_ref(), collection, &documents).await?;
        println!("  {} ({} chunks)", file.display(), ids.len());
        chunk_total += ids.len();
    }

    println!(
        "Ingested {chunk_total} chunks from {} files into '{collection}'",
        files.len()
    );
    Ok(())
}

// ============================================================================
// Query / Info
// ============================================================================

pub async fn query(config: &AppConfig, request: &QueryRequest, json: bool) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let result = engine.query(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in result.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, source.source_label());
        }
    }
    println!("\n(model: {})", result.metadata.model);
    Ok(())
}

pub async fn info(config: &AppConfig, collection: Option<&str>) -> anyhow::Result<()> {
    let collection = collection_or_default(config, collection);
    let index = create_index(&config.index).await?;
    let info = index.info(collection).await?;

    println!("Collection: {}", info.name);
    println!("Backend:    {}", index.name());
    println!("Documents:  {}", info.count);
    match info.dimension {
        Some(dim) => println!("Dimension:  {dim}"),
        None => println!("Dimension:  -"),
    }
    Ok(())
}

// ============================================================================
// Resume / Vehicle
// ============================================================================

/// A job description argument is a file when it names one, else literal text
fn job_description_text(arg: &str) -> Result<String, AgentError> {
    let path = Path::new(arg);
    if path.is_file() {
        extract(path)
    } else {
        Ok(arg.to_string())
    }
}

fn print_analysis(analysis: &ResumeAnalysis) {
    println!("{}", analysis.summary());

    if !analysis.report.missing_keywords.is_empty() {
        let missing: Vec<&str> = mpa_ats::top_missing_keywords(&analysis.report, 10);
        println!("\nTop missing keywords: {}", missing.join(", "));
    }

    if !analysis.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &analysis.recommendations {
            println!("  [{}] {}", rec.priority, rec.text);
        }
    }

    if let Some(review) = &analysis.review {
        if let Some(fit) = review.fit_score {
            println!("\nReviewer fit score: {fit}/10");
        }
        for (title, items) in [
            ("Strengths", &review.strengths),
            ("Weaknesses", &review.weaknesses),
            ("Suggestions", &review.suggestions),
        ] {
            if !items.is_empty() {
                println!("\n{title}:");
                for item in items {
                    println!("  - {item}");
                }
            }
        }
    }
}

pub async fn analyze_resume(
    config: &AppConfig,
    resume: &Path,
    job_description: &str,
    review: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let resume_text = extract(resume)?;
    let job_text = job_description_text(job_description)?;

    let mut analyzer = ResumeAnalyzer::new(Scorer::from_config(&config.ats)?);
    if review {
        analyzer = analyzer.with_backend(build_backend(config)?);
    }

    let analysis = analyzer.analyze(&resume_text, &job_text, review).await?;
    print_analysis(&analysis);

    if let Some(path) = output {
        write_json(path, &analysis)?;
    }
    Ok(())
}

pub async fn vehicle(
    config: &AppConfig,
    image: &Path,
    description: Option<&str>,
    include_contacts: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let image = ImageInput::from_path(image)?;
    let backend = build_backend(config)?;

    let diagnosis = VehicleDiagnostics::new(backend)
        .diagnose(&image, description, include_contacts)
        .await?;

    println!("Diagnosis: {}", diagnosis.diagnosis);

    if !diagnosis.recommended_actions.is_empty() {
        println!("\nRecommended actions:");
        for (i, action) in diagnosis.recommended_actions.iter().enumerate() {
            println!("  {}. {action}", i + 1);
        }
    }

    let solution = &diagnosis.detailed_solution;
    if solution.quick_fix_available {
        println!("\nStep-by-step:");
        for (i, step) in solution.steps.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
        println!("\nSafety warnings:");
        for warning in &solution.safety_warnings {
            println!("  ! {warning}");
        }
    }

    if !diagnosis.emergency_contacts.is_empty() {
        println!("\nRoadside assistance:");
        for contact in &diagnosis.emergency_contacts {
            let marker = if contact.recommended { " (recommended)" } else { "" };
            println!("  {}{marker}: {}", contact.name, contact.phone);
            if let Some(service) = &contact.service_type {
                println!("    Service: {service}");
            }
        }
    }

    if let Some(path) = output {
        write_json(path, &diagnosis)?;
    }
    Ok(())
}
