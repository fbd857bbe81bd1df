use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stylemine::{
    config::{Config, MiningPaths, RunOverrides},
    generation::PromptEngine,
    logging,
    mining::StyleMiner,
    style_context::load_context,
};

#[derive(Parser)]
#[command(
    name = "stylemine",
    version,
    about = "Mine a reusable style profile from cleaned transcripts"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run block analysis and fusion, writing the stylebook.
    Mine(MineArgs),
    /// Print (and optionally save) the generation context derived from a stylebook.
    Context(ContextArgs),
}

#[derive(Args)]
struct MineArgs {
    /// Maximum characters per block.
    #[arg(long)]
    max_chars: Option<usize>,
    /// Generation model (e.g. gpt-4o, gpt-4o-mini, llama3).
    #[arg(long)]
    model: Option<String>,
    /// Output language tag (e.g. pt-BR, en-US, es-ES).
    #[arg(long)]
    language: Option<String>,
    /// Maximum items per list in partial analyses.
    #[arg(long)]
    max_items: Option<usize>,
    /// Clean transcripts before segmentation.
    #[arg(long)]
    clean_first: bool,
    /// Do not save per-block partials.
    #[arg(long)]
    no_partials: bool,
    /// Block analyses allowed in flight at once.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Agent root holding `data/`.
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Folder with cleaned `.txt` transcripts.
    #[arg(long)]
    cleaned_dir: Option<PathBuf>,
    /// Folder receiving per-block partials.
    #[arg(long)]
    partials_dir: Option<PathBuf>,
    /// Path of the final stylebook.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ContextArgs {
    /// Agent root holding `data/`.
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Path of the stylebook to read.
    #[arg(long)]
    stylebook: Option<PathBuf>,
    /// Save the context to `data/style_context.json`.
    #[arg(long)]
    save: bool,
}

impl From<MineArgs> for RunOverrides {
    fn from(args: MineArgs) -> Self {
        Self {
            block_max_chars: args.max_chars,
            generation_model: args.model,
            output_language: args.language,
            max_list_items: args.max_items,
            clean_first: args.clean_first,
            no_partials: args.no_partials,
            block_concurrency: args.concurrency,
            base_dir: args.base_dir,
            cleaned_dir: args.cleaned_dir,
            partials_dir: args.partials_dir,
            stylebook_path: args.output,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(err) = run(cli.command).await {
        tracing::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Mine(args) => mine(args).await,
        Command::Context(args) => context(args),
    }
}

async fn mine(args: MineArgs) -> Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;
    config
        .apply_overrides(args.into())
        .context("invalid command-line override")?;

    let engine = PromptEngine::from_config(&config);
    tracing::info!(
        provider = ?config.generation_provider,
        model = %engine.model(),
        max_chars = config.block_max_chars,
        language = %config.output_language,
        "Starting style mining"
    );
    tracing::info!(cleaned = %config.paths.cleaned_dir.display(), "Input");
    if config.save_partials {
        tracing::info!(partials = %config.paths.partials_dir.display(), "Partials");
    }
    tracing::info!(output = %config.output_dir().display(), "Output");

    let outcome = StyleMiner::new(&config, &engine)
        .run()
        .await
        .context("style mining failed")?;

    tracing::info!(
        path = %outcome.artifact_path.display(),
        documents = outcome.document_count,
        blocks = outcome.block_count,
        corpus_sha256 = %outcome.corpus_sha256,
        fallback = outcome.artifact_failed,
        "Done"
    );
    println!("{}", outcome.artifact_path.display());
    Ok(())
}

fn context(args: ContextArgs) -> Result<()> {
    dotenvy::dotenv().ok();
    let paths = match args.base_dir {
        Some(base_dir) => MiningPaths::under(base_dir),
        None => MiningPaths::from_env(),
    };
    let context = load_context(&paths, args.stylebook.as_deref())
        .context("failed to derive the style context")?;
    let rendered = serde_json::to_string_pretty(&context)?;
    println!("{rendered}");

    if args.save {
        let destination = context
            .save(&paths)
            .context("failed to save the style context")?;
        tracing::info!(path = %destination.display(), "Context saved");
    }
    Ok(())
}
