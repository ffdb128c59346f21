use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tasmi::{
    compare, load_corpus_file, AlignmentResult, EngineConfig, MemorySnapshotWriter, SessionEngine,
    SessionStore, SnapshotWriter, StaticCorpus, TraversalMode, WordStatus,
};

#[derive(Parser)]
#[command(name = "tasmi")]
#[command(author, version, about = "Live recitation verification engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align a spoken fragment against expected words, one-shot
    Compare {
        /// Expected reference text (whitespace-tokenized)
        #[arg(short, long)]
        expected: String,

        /// Spoken transcript fragment
        #[arg(short, long)]
        spoken: String,

        /// Treat the fragment as provisional instead of final
        #[arg(long)]
        provisional: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run an interactive session against a JSON corpus file, reading
    /// transcript lines from stdin (prefix a line with '~' for provisional)
    Session {
        /// Corpus file (JSON array of unit records)
        #[arg(short, long)]
        corpus: PathBuf,

        /// Corpus id to start in
        #[arg(long, default_value = "1")]
        corpus_id: u32,

        /// Unit id to start at
        #[arg(short, long, default_value = "1")]
        unit: u32,

        /// Traversal mode: unit, page or section
        #[arg(short, long, default_value = "unit")]
        mode: String,

        /// Owner identifier recorded on the session
        #[arg(long, default_value = "cli")]
        owner: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            expected,
            spoken,
            provisional,
            verbose,
        } => {
            setup_logging(verbose);
            run_compare(&expected, &spoken, provisional)
        }
        Commands::Session {
            corpus,
            corpus_id,
            unit,
            mode,
            owner,
            verbose,
        } => {
            setup_logging(verbose);
            run_session(corpus, corpus_id, unit, &mode, &owner).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn run_compare(expected: &str, spoken: &str, provisional: bool) -> Result<()> {
    let expected_words: Vec<String> = expected.split_whitespace().map(str::to_string).collect();
    if expected_words.is_empty() {
        bail!("--expected must contain at least one word");
    }

    let (results, summary) = compare(&expected_words, spoken, !provisional);
    print_results(&results);
    println!(
        "matched {} / mismatched {} / skipped {} / total {}",
        summary.matched, summary.mismatched, summary.skipped, summary.total
    );
    Ok(())
}

async fn run_session(
    corpus: PathBuf,
    corpus_id: u32,
    unit: u32,
    mode: &str,
    owner: &str,
) -> Result<()> {
    let mode = match mode {
        "unit" => TraversalMode::UnitSequential,
        "page" => TraversalMode::PageSequential,
        "section" => TraversalMode::SectionSequential,
        other => bail!("unknown traversal mode: {other} (expected unit, page or section)"),
    };

    let raw_units = load_corpus_file(&corpus).context("Failed to load corpus")?;
    info!("Loaded {} units from {:?}", raw_units.len(), corpus);

    let engine = SessionEngine::new(
        Arc::new(SessionStore::new()),
        Arc::new(StaticCorpus::new(raw_units)),
        Arc::new(MemorySnapshotWriter::new()) as Arc<dyn SnapshotWriter>,
        EngineConfig::default(),
    );

    let snapshot = engine.start(owner, corpus_id, unit, mode).await?;
    let session_id = snapshot.session.session_id;
    println!("Session {session_id} started at {corpus_id}:{unit}");
    println!("Expected: {}", snapshot.unit.words.join(" "));

    let stdin = std::io::stdin();
    let mut ended = false;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (text, is_final) = match trimmed.strip_prefix('~') {
            Some(rest) => (rest.trim(), false),
            None => (trimmed, true),
        };

        match engine.apply_transcript(session_id, text, is_final).await {
            Ok(outcome) => {
                print_results(&outcome.results);
                if let Some(summary) = outcome.summary {
                    println!(
                        "matched {} / mismatched {} / skipped {} (position {})",
                        summary.matched, summary.mismatched, summary.skipped, outcome.position
                    );
                }
                if let Some(next_unit) = outcome.advanced_to {
                    if let Some(status) = engine.status(session_id) {
                        println!("Advanced to unit {next_unit}");
                        println!("Expected: {}", status.unit.words.join(" "));
                    }
                }
                if outcome.ended {
                    println!("No successor unit; session ended");
                    ended = true;
                    break;
                }
            }
            Err(err) => eprintln!("error [{}]: {err}", err.code()),
        }
    }

    if !ended {
        let session = engine.end(session_id).await?;
        println!(
            "Session ended at {}:{} position {}",
            session.corpus_id, session.unit_id, session.position
        );
    }
    Ok(())
}

fn print_results(results: &[AlignmentResult]) {
    for result in results {
        let verdict = match result.status {
            WordStatus::Matched => "matched",
            WordStatus::Mismatched => "mismatched",
            WordStatus::Skipped => "skipped",
            WordStatus::ProvisionalMatched => "~matched",
            WordStatus::ProvisionalMismatched => "~mismatched",
        };
        match (&result.spoken, result.similarity) {
            (Some(spoken), Some(similarity)) => println!(
                "  [{}] {} -> {} ({:.2}) {}",
                result.position, result.expected, spoken, similarity, verdict
            ),
            _ => println!("  [{}] {} -> - {}", result.position, result.expected, verdict),
        }
    }
}
