use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pmcparse_core::config_file;
use pmcparse_core::{
    ArticleOutcome, Config, FilePageSource, PageSource, PmcPageSource, Strategy, parse_article,
};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// PMC article extractor - structured papers from PubMed Central pages
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an article page from PMC and extract it
    Article {
        /// PMC accession, e.g. PMC3148254
        accession: String,

        #[command(flatten)]
        options: Options,
    },

    /// Extract an article page saved on disk
    File {
        /// Path to the saved HTML page
        path: PathBuf,

        /// Accession key recorded on the paper (default: file stem)
        #[arg(long)]
        accession: Option<String>,

        #[command(flatten)]
        options: Options,
    },
}

#[derive(Args, Debug)]
struct Options {
    /// Extraction strategy: tree or stream
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Send every reference to the citation oracle
    #[arg(long)]
    normalize: bool,

    /// FreeCite-compatible oracle endpoint
    #[arg(long)]
    oracle_url: Option<String>,

    /// PubMed id to record on the paper
    #[arg(long)]
    pmid: Option<u64>,

    /// Write the JSON paper to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Article { accession, options } => {
            let config = resolve_config(&options);
            let source = PmcPageSource::new(&config)?;
            run(&source, &accession, &config, &options).await
        }
        Command::File {
            path,
            accession,
            options,
        } => {
            if !path.exists() {
                anyhow::bail!("File not found: {}", path.display());
            }
            let accession = accession
                .or_else(|| {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                })
                .unwrap_or_default();
            let config = resolve_config(&options);
            let source = FilePageSource::new(path);
            run(&source, &accession, &config, &options).await
        }
    }
}

/// Resolve configuration: CLI flags > env vars > config files > defaults.
fn resolve_config(options: &Options) -> Config {
    let mut config = Config::default();
    config_file::apply_to(&config_file::load_config(), &mut config);

    if let Ok(url) = std::env::var("PMCPARSE_ORACLE_URL")
        && !url.trim().is_empty()
    {
        config.oracle_url = Some(url);
    }

    if let Some(strategy) = options.strategy {
        config.strategy = strategy;
    }
    if let Some(url) = &options.oracle_url {
        config.oracle_url = Some(url.clone());
    }
    config
}

async fn run(
    source: &dyn PageSource,
    accession: &str,
    config: &Config,
    options: &Options,
) -> anyhow::Result<()> {
    tracing::debug!(
        accession,
        source = source.name(),
        strategy = ?config.strategy,
        oracle = config.oracle_url.as_deref(),
        "configuration resolved"
    );
    let normalizer = if options.normalize {
        let Some(normalizer) = config.normalizer() else {
            anyhow::bail!(
                "--normalize needs an oracle URL (--oracle-url, PMCPARSE_ORACLE_URL or [oracle] url in .pmcparse.toml)"
            );
        };
        Some(normalizer)
    } else {
        None
    };

    let ArticleOutcome {
        paper,
        warnings,
        normalization,
    } = parse_article(
        source,
        accession,
        options.pmid,
        config.strategy.extractor(),
        normalizer.as_ref(),
    )
    .await?;

    let color = ColorMode(!options.no_color);
    let mut diag = std::io::stderr();
    output::print_warnings(&mut diag, &warnings, color)?;
    output::print_summary(&mut diag, &paper, color)?;
    if let Some(report) = &normalization {
        output::print_normalization(&mut diag, report, color)?;
    }

    let json = serde_json::to_string_pretty(&paper)?;
    match &options.output {
        Some(path) => std::fs::write(path, json + "\n")?,
        None => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}
