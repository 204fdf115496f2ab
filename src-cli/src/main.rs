use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dqa_ai::answer::{AnswerPipeline, PromptBuilder, DEFAULT_SUBJECT};
use dqa_ai::config::CompletionConfig;
use dqa_ai::fragments::{AddDocumentInput, FragmentStore};
use dqa_ai::guardrails::{audit_answer, CitationAudit};
use dqa_ai::llm::openai_llm::OpenAiLlm;
use dqa_ai::retrieve::TfIdfRetriever;
use dqa_core::domain::{AnswerResult, RetrievalRequest};
use dqa_core::error::AppError;
use dqa_core::kpi::{KpiCatalog, KpiCategory};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dqa", version, about = "Grounded Q&A over financial and ESG disclosures")]
struct Cli {
    /// Fragment corpus directory
    #[arg(long, global = true, default_value = "./data/corpus", env = "DQA_CORPUS_DIR")]
    corpus: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a text document into the corpus
    Ingest {
        /// Document name recorded on every fragment (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        doc_type: String,
        #[arg(long)]
        year: i32,
        file: PathBuf,
    },
    /// List ingested fragments
    Fragments {
        #[arg(long = "doc-type")]
        doc_types: Vec<String>,
    },
    /// Ask a question against the corpus
    Ask {
        question: String,
        /// Maximum fragments to retrieve
        #[arg(short, long, default_value_t = 6)]
        k: usize,
        /// Restrict retrieval to these doc types (repeatable)
        #[arg(long = "doc-type")]
        doc_types: Vec<String>,
        /// Company the analyst persona answers about
        #[arg(long, default_value = DEFAULT_SUBJECT)]
        subject: String,
        /// Override the completion model
        #[arg(long)]
        model: Option<String>,
        /// Print the full prompt sent to the model
        #[arg(long)]
        show_prompt: bool,
        /// Emit the answer, fragments, prompt and citation audit as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the KPI catalog
    Kpis {
        #[arg(long)]
        category: Option<String>,
        /// Load KPIs from a JSON file instead of the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        csv: bool,
        /// Check provenance against the corpus
        #[arg(long)]
        validate: bool,
    },
}

#[derive(serde::Serialize)]
struct AskOutput<'a> {
    #[serde(flatten)]
    result: &'a AnswerResult,
    citations: CitationAudit,
}

fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = FragmentStore::open(cli.corpus.clone());
    debug!(corpus = %store.root().display(), "using corpus");

    match cli.command {
        Command::Ingest {
            source,
            doc_type,
            year,
            file,
        } => ingest(&store, source, doc_type, year, file),
        Command::Fragments { doc_types } => list_fragments(&store, doc_types),
        Command::Ask {
            question,
            k,
            doc_types,
            subject,
            model,
            show_prompt,
            json,
        } => ask(&store, &question, k, doc_types, subject, model, show_prompt, json),
        Command::Kpis {
            category,
            catalog,
            csv,
            validate,
        } => kpis(&store, category, catalog, csv, validate),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| {
            AppError::new("CLI_TIME_FAILED", "Failed to format time").with_details(e.to_string())
        })
}

fn doc_type_filter(doc_types: Vec<String>) -> Option<BTreeSet<String>> {
    if doc_types.is_empty() {
        None
    } else {
        Some(doc_types.into_iter().collect())
    }
}

fn ingest(
    store: &FragmentStore,
    source: Option<String>,
    doc_type: String,
    year: i32,
    file: PathBuf,
) -> Result<()> {
    let text = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source = match source {
        Some(s) => s,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Input path has no file name; pass --source")?,
    };

    let doc = store.add_document(AddDocumentInput {
        source,
        doc_type,
        year,
        text,
        ingested_at: now_rfc3339_utc()?,
    })?;
    println!(
        "{} ({}, {}): {} fragment(s) {:?}",
        doc.source,
        doc.doc_type,
        doc.year,
        doc.fragment_ids.len(),
        doc.fragment_ids
    );
    Ok(())
}

fn list_fragments(store: &FragmentStore, doc_types: Vec<String>) -> Result<()> {
    let filter = doc_type_filter(doc_types);
    for f in store.list_fragments(filter.as_ref())? {
        let first_line = f.text.lines().next().unwrap_or("");
        println!(
            "[chunk_id={}] {} | {} | {} | {}",
            f.id, f.source, f.doc_type, f.year, first_line
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn ask(
    store: &FragmentStore,
    question: &str,
    k: usize,
    doc_types: Vec<String>,
    subject: String,
    model: Option<String>,
    show_prompt: bool,
    json: bool,
) -> Result<()> {
    let req = RetrievalRequest::new(question, k, doc_type_filter(doc_types));
    req.validate()?;

    let mut config = CompletionConfig::from_env()?;
    if let Some(m) = model {
        config.model = m;
    }

    let retriever = TfIdfRetriever::from_store(store)?;
    info!(fragments = retriever.len(), model = %config.model, "corpus loaded");

    let pipeline = AnswerPipeline::new(
        Arc::new(retriever),
        Arc::new(OpenAiLlm::new(config)),
        PromptBuilder::new(subject),
    );
    let result = pipeline.answer_request(&req)?;
    let citations = audit_answer(&result);

    if json {
        let out = AskOutput {
            result: &result,
            citations,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", result.answer);
    println!();
    println!("Fragments used:");
    if result.fragments_used.is_empty() {
        println!("  (none)");
    }
    for f in &result.fragments_used {
        println!(
            "  [chunk_id={}] {} ({}, {})",
            f.id, f.source, f.doc_type, f.year
        );
    }
    if !citations.unknown_chunk_ids.is_empty() {
        println!();
        println!(
            "Warning: answer cites fragments that were not retrieved: {:?}",
            citations.unknown_chunk_ids
        );
    }
    if show_prompt {
        println!();
        println!("--- PROMPT ---");
        println!("{}", result.prompt_used);
    }
    Ok(())
}

fn kpis(
    store: &FragmentStore,
    category: Option<String>,
    catalog: Option<PathBuf>,
    csv: bool,
    validate: bool,
) -> Result<()> {
    let catalog = match catalog {
        Some(path) => KpiCatalog::load(&path)?,
        None => KpiCatalog::builtin(),
    };
    let category = category.as_deref().map(KpiCategory::parse).transpose()?;

    if validate {
        let known = store.fragment_ids()?;
        let warnings = catalog.validate(Some(&known));
        if warnings.is_empty() {
            println!("KPI catalog OK");
        }
        for w in warnings {
            match w.details {
                Some(d) => println!("{}: {} ({})", w.code, w.message, d),
                None => println!("{}: {}", w.code, w.message),
            }
        }
        return Ok(());
    }

    if csv {
        print!("{}", catalog.to_csv(category)?);
        return Ok(());
    }

    for row in catalog.rows(category) {
        let value = row
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{} [{}] {} {} ({}) source={} chunks=[{}]",
            row.name,
            row.category.as_str(),
            value,
            row.unit,
            row.year,
            row.source,
            row.chunk_ids
        );
        if !row.notes.is_empty() {
            println!("    {}", row.notes);
        }
    }
    Ok(())
}
