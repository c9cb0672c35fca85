//! # qcanon CLI
//!
//! The `qcanon` binary maps exam questions onto syllabus topics and writes
//! the canonical recurring questions for each topic.
//!
//! ## Usage
//!
//! ```bash
//! qcanon --config ./config/qcanon.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qcanon run` | Map questions, cluster them, and write both output files |
//! | `qcanon map` | Map questions only; JSON to stdout or a file |
//! | `qcanon acronyms` | Print the acronym map derived from a syllabus |
//! | `qcanon modules` | List syllabus modules and the valid module range |
//!
//! ## Examples
//!
//! ```bash
//! # Full run over a directory of paper files
//! qcanon run --syllabus ./syllabus.json --papers ./papers
//!
//! # Only modules 2 to 4
//! qcanon run --syllabus ./syllabus.json --papers ./papers --start-module 2 --end-module 4
//!
//! # Mapping only, from a pre-unified question list
//! qcanon map --syllabus ./syllabus.json --questions ./questions.json
//! ```
//!
//! Logs go to stderr and are controlled by `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qcanon::config::{self, Config};
use qcanon::embedding::create_provider;
use qcanon::run::{self, QuestionSource, RunOptions};
use qcanon::{export, loader};
use qcanon_core::text::extract_acronyms;

/// qcanon: exam question topic mapping and canonical question extraction.
///
/// Commands that embed text read the `[embedding]`, `[mapping]`,
/// `[canonical]`, `[scope]` and `[output]` sections of the `--config` file.
/// See `config/qcanon.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qcanon",
    about = "Map exam questions onto syllabus topics and extract canonical recurring questions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qcanon.toml`. Required by `run` and `map`.
    #[arg(long, global = true, default_value = "./config/qcanon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Where to read questions from. Exactly one must be given.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Directory of per-paper JSON files. Every paper must match the
    /// syllabus course code.
    #[arg(long)]
    papers: Option<PathBuf>,

    /// Pre-unified JSON array of questions.
    #[arg(long)]
    questions: Option<PathBuf>,
}

impl InputArgs {
    fn source(&self) -> Result<QuestionSource> {
        match (&self.papers, &self.questions) {
            (Some(dir), None) => Ok(QuestionSource::Papers(dir.clone())),
            (None, Some(file)) => Ok(QuestionSource::Questions(file.clone())),
            _ => anyhow::bail!("Exactly one of --papers or --questions is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Map questions to topics and extract canonical questions.
    ///
    /// Writes `mapped_questions_<course>.json` and
    /// `canonical_questions_<course>.json` to the output directory. Nothing
    /// is written if any stage fails.
    Run {
        /// Enriched syllabus JSON.
        #[arg(long)]
        syllabus: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        /// First module in scope (inclusive). Overrides `[scope]`.
        #[arg(long)]
        start_module: Option<i64>,

        /// Last module in scope (inclusive). Overrides `[scope]`.
        #[arg(long)]
        end_module: Option<i64>,

        /// Output directory. Overrides `[output].dir`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Map questions to topics without clustering.
    Map {
        /// Enriched syllabus JSON.
        #[arg(long)]
        syllabus: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        /// Output file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the acronym map derived from a syllabus.
    Acronyms {
        /// Enriched syllabus JSON.
        #[arg(long)]
        syllabus: PathBuf,
    },

    /// List syllabus modules and the valid module range.
    Modules {
        /// Enriched syllabus JSON.
        #[arg(long)]
        syllabus: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            syllabus,
            input,
            start_module,
            end_module,
            output,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let options = RunOptions {
                syllabus,
                source: input.source()?,
                start_module,
                end_module,
                output_dir: output,
            };
            let report = tokio::task::spawn_blocking(move || run_blocking(&cfg, &options))
                .await
                .context("Run task panicked")??;

            println!("Course:            {}", report.course_code);
            println!("Module range:      {}", report.range);
            println!("Questions:         {}", report.questions);
            println!("Mapped in range:   {}", report.mapped);
            println!("Out of range:      {}", report.out_of_range);
            println!("Module fallbacks:  {}", report.fallbacks);
            println!("Canonical topics:  {}", report.canonical_topics);
            println!("Canonical groups:  {}", report.canonical_groups);
            println!("Wrote {}", report.mapped_path.display());
            println!("Wrote {}", report.canonical_path.display());
        }
        Commands::Map {
            syllabus,
            input,
            output,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let source = input.source()?;
            let mapped = tokio::task::spawn_blocking(move || {
                let syllabus = loader::load_syllabus(&syllabus)?;
                let questions = run::load_questions(&source, &syllabus)?;
                let range = run::resolve_range(&cfg, None, None, &syllabus)?;
                let provider = create_provider(&cfg.embedding)?;
                run::map_in_range(&cfg, &syllabus, range, &questions, provider.as_ref())
            })
            .await
            .context("Map task panicked")??;

            export::write_json(&mapped, output.as_deref())?;
        }
        Commands::Acronyms { syllabus } => {
            let syllabus = loader::load_syllabus(&syllabus)?;
            let acronyms = extract_acronyms(&syllabus.modules);
            if acronyms.is_empty() {
                println!("No acronyms found.");
            }
            for (acronym, expansion) in &acronyms {
                println!("{:<8} {}", acronym, expansion);
            }
        }
        Commands::Modules { syllabus } => {
            let syllabus = loader::load_syllabus(&syllabus)?;
            println!("{} {}", syllabus.course_code, syllabus.course_title);
            for module in &syllabus.modules {
                println!(
                    "  {:>3}  {} ({} topics)",
                    module.module_id,
                    module.module_name,
                    module.main_topics.len()
                );
            }
            if let Some(max) = syllabus.max_module_id() {
                println!("Valid module range: 1..={}", max);
            }
        }
    }

    Ok(())
}

fn run_blocking(cfg: &Config, options: &RunOptions) -> Result<run::RunReport> {
    let provider = create_provider(&cfg.embedding)?;
    run::run_pipeline(cfg, options, provider.as_ref())
}
