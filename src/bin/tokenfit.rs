//! Tokenfit CLI - fit source files into LLM context budgets.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use rayon::prelude::*;
use serde::Serialize;
use tokenfit::chunker::{Chunk, ChunkerStats, ChunkingStrategy, SmartChunker};
use tokenfit::condenser::{CondenserStats, CondensingResult, ProgressiveCondenser};
use tokenfit::errors::{exit_code, TokenfitError};
use tokenfit::language::{detect_language, Language};
use tokenfit::priority::PriorityLevel;
use tokenfit::tokens::{Encoding, TokenCounter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tokenfit")]
#[command(about = "Fit source files into LLM context budgets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Condense files to fit a per-file token budget
    Condense {
        /// Files to condense
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tokens available to each file
        #[arg(long)]
        budget: usize,

        /// Importance of the content
        #[arg(long, default_value = "medium")]
        priority: PriorityArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Token encoding
        #[arg(long, default_value = "cl100k")]
        encoding: EncodingArg,
    },

    /// Split a file into context-preserving chunks
    Chunk {
        /// File to split
        file: PathBuf,

        /// Token limit per chunk
        #[arg(long)]
        max_tokens: usize,

        /// Importance of the content
        #[arg(long, default_value = "medium")]
        priority: PriorityArg,

        /// Omit part headers and footers
        #[arg(long)]
        no_context_headers: bool,

        /// Omit markers for functions crossing chunk edges
        #[arg(long)]
        no_overlap: bool,

        /// Pack plain lines without keeping functions whole
        #[arg(long)]
        no_preserve_functions: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Token encoding
        #[arg(long, default_value = "cl100k")]
        encoding: EncodingArg,
    },

    /// Count tokens for files
    Tokens {
        /// Files to count
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Token encoding
        #[arg(long, default_value = "cl100k")]
        encoding: EncodingArg,
    },

    /// Show supported languages
    Languages {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
    Heuristic,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
            EncodingArg::Heuristic => Encoding::Heuristic,
        }
    }
}

impl From<PriorityArg> for PriorityLevel {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => PriorityLevel::Low,
            PriorityArg::Medium => PriorityLevel::Medium,
            PriorityArg::High => PriorityLevel::High,
            PriorityArg::Critical => PriorityLevel::Critical,
        }
    }
}

fn main() {
    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Condense {
            files,
            budget,
            priority,
            json,
            encoding,
        } => run_condense(files, budget, priority.into(), json, encoding.into()),
        Commands::Chunk {
            file,
            max_tokens,
            priority,
            no_context_headers,
            no_overlap,
            no_preserve_functions,
            json,
            encoding,
        } => {
            let strategy = ChunkingStrategy::default()
                .include_context_headers(!no_context_headers)
                .overlap_functions(!no_overlap)
                .preserve_functions(!no_preserve_functions);
            run_chunk(file, max_tokens, priority.into(), strategy, json, encoding.into())
        }
        Commands::Tokens {
            files,
            json,
            encoding,
        } => run_tokens(files, json, encoding.into()),
        Commands::Languages { json } => run_languages(json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "tokenfit", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Condense { json, .. } => *json,
        Commands::Chunk { json, .. } => *json,
        Commands::Tokens { json, .. } => *json,
        Commands::Languages { json } => *json,
        Commands::Completions { .. } => false,
    }
}

/// Read every input up front so a missing file fails before any work.
fn read_inputs(paths: Vec<PathBuf>) -> Result<Vec<(PathBuf, String)>, TokenfitError> {
    paths
        .into_iter()
        .map(|path| {
            if !path.is_file() {
                return Err(TokenfitError::PathNotFound(path));
            }
            let content = fs::read_to_string(&path)?;
            Ok((path, content))
        })
        .collect()
}

fn locator(path: &Path) -> String {
    path.display().to_string()
}

// --- Languages command ---

#[derive(Serialize)]
struct LanguageInfo {
    name: String,
    extensions: Vec<String>,
}

fn run_languages(json: bool) -> Result<(), TokenfitError> {
    let languages: Vec<LanguageInfo> = Language::all()
        .iter()
        .filter(|lang| !lang.extensions().is_empty())
        .map(|lang| LanguageInfo {
            name: lang.to_string(),
            extensions: lang
                .extensions()
                .iter()
                .map(|e| format!(".{}", e))
                .collect(),
        })
        .collect();

    if json {
        #[derive(Serialize)]
        struct Output {
            languages: Vec<LanguageInfo>,
        }
        let output = Output { languages };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Supported languages:");
        for lang in &languages {
            println!("  {:12} {}", lang.name, lang.extensions.join(", "));
        }
    }

    Ok(())
}

// --- Tokens command ---

fn run_tokens(files: Vec<PathBuf>, json: bool, encoding: Encoding) -> Result<(), TokenfitError> {
    let inputs = read_inputs(files)?;
    let counter = TokenCounter::new(encoding);

    let counts: Vec<(String, usize)> = inputs
        .par_iter()
        .map(|(path, content)| (locator(path), counter.count(content)))
        .collect();
    let total: usize = counts.iter().map(|(_, n)| n).sum();

    if json {
        #[derive(Serialize)]
        struct Output {
            total: usize,
            encoding: String,
            files: serde_json::Map<String, serde_json::Value>,
        }

        let output = Output {
            total,
            encoding: encoding.to_string(),
            files: counts
                .into_iter()
                .map(|(path, n)| (path, serde_json::Value::from(n)))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        for (file, count) in &counts {
            writeln!(out, "{}: {} tokens", file, count)?;
        }
        writeln!(out, "Total: {} tokens", total)?;
    }

    Ok(())
}

// --- Condense command ---

#[derive(Serialize)]
struct CondensedFile {
    path: String,
    language: String,
    #[serde(flatten)]
    result: CondensingResult,
}

fn run_condense(
    files: Vec<PathBuf>,
    budget: usize,
    priority: PriorityLevel,
    json: bool,
    encoding: Encoding,
) -> Result<(), TokenfitError> {
    let inputs = read_inputs(files)?;

    // One condenser per worker; per-worker stats are merged at the end.
    let (mut condensed, stats) = inputs
        .par_iter()
        .enumerate()
        .fold(
            || {
                (
                    Vec::new(),
                    ProgressiveCondenser::with_estimator(TokenCounter::new(encoding)),
                )
            },
            |(mut out, mut condenser), (index, (path, content))| {
                let locator = locator(path);
                let result = condenser.condense_with_budget(content, &locator, budget, priority, None);
                out.push((
                    index,
                    CondensedFile {
                        language: detect_language(&locator).to_string(),
                        path: locator,
                        result,
                    },
                ));
                (out, condenser)
            },
        )
        .map(|(out, condenser)| (out, condenser.into_stats()))
        .reduce(
            || (Vec::new(), CondenserStats::default()),
            |(mut out, mut stats), (more, other)| {
                out.extend(more);
                stats.merge(&other);
                (out, stats)
            },
        );
    condensed.sort_by_key(|(index, _)| *index);
    let condensed: Vec<CondensedFile> = condensed.into_iter().map(|(_, file)| file).collect();

    if json {
        #[derive(Serialize)]
        struct Output {
            budget: usize,
            priority: PriorityLevel,
            encoding: String,
            files: Vec<CondensedFile>,
            stats: CondenserStats,
        }

        let output = Output {
            budget,
            priority,
            encoding: encoding.to_string(),
            files: condensed,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        for file in &condensed {
            let r = &file.result;
            writeln!(
                out,
                "=== {} ({}, {} -> {} tokens) ===",
                file.path, r.level, r.original_tokens, r.final_tokens
            )?;
            writeln!(out, "{}", r.content)?;
        }
        writeln!(
            out,
            "Condensed {} files, saved {} tokens",
            stats.files_processed, stats.tokens_saved
        )?;
    }

    Ok(())
}

// --- Chunk command ---

fn run_chunk(
    file: PathBuf,
    max_tokens: usize,
    priority: PriorityLevel,
    strategy: ChunkingStrategy,
    json: bool,
    encoding: Encoding,
) -> Result<(), TokenfitError> {
    let preserve_functions = strategy.preserve_functions;
    let mut inputs = read_inputs(vec![file])?;
    let Some((path, content)) = inputs.pop() else {
        return Ok(());
    };
    let locator = locator(&path);

    let mut chunker = SmartChunker::with_estimator(strategy, TokenCounter::new(encoding));
    let chunks = chunker.chunk_with_context(&content, &locator, max_tokens, priority, preserve_functions);
    let stats = chunker.into_stats();

    if json {
        #[derive(Serialize)]
        struct Output {
            path: String,
            max_tokens: usize,
            chunks: Vec<Chunk>,
            stats: ChunkerStats,
        }

        let output = Output {
            path: locator,
            max_tokens,
            chunks,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        for chunk in &chunks {
            let lines = match chunk.line_range() {
                Some(range) => format!("lines {}-{}", range.start() + 1, range.end() + 1),
                None => "lines ?".to_string(),
            };
            writeln!(
                out,
                "--- chunk {}/{} ({}, {} tokens) ---",
                chunk.chunk_id, chunk.total_chunks, lines, chunk.estimated_tokens
            )?;
            writeln!(out, "{}", chunk.content)?;
        }
    }

    Ok(())
}
