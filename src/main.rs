use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use dric_check::classify::{Classifier, ChatClassifier, KeywordClassifier, TextClassifier};
use dric_check::config::{
    find_config_file, load_config, ClassifierBackend, Config, FetchBackend, LoggingConfig,
};
use dric_check::discovery::{build_queries, parse_period, period_paths};
use dric_check::fetch::{ContentService, DirectService, FetchClient, FirecrawlService};
use dric_check::models::PublicationRecord;
use dric_check::pipeline::{Pipeline, RunContext};
use dric_check::resolve::{HttpPageSource, LinkResolver, LinkRules};
use dric_check::store::{completed_rows, read_records};
use dric_check::ui::{link_table, summary_table, RunProgress};
use dric_check::utils::Pacer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// DRIC Check - find explicit DRIC funding acknowledgements in publication full texts
#[derive(Parser, Debug)]
#[command(name = "dric-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Label publications YES / NO / NF for explicit DRIC funding acknowledgements", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Content fetch service
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FetchBackendArg {
    /// Firecrawl scrape API (needs FIRECRAWL_API_KEY)
    Firecrawl,
    /// Plain HTTP with local HTML/PDF text extraction
    Direct,
}

/// Classification service
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ClassifierArg {
    /// Chat completion model under the strict prompt (needs GROQ_API_KEY)
    Chat,
    /// Offline explicit-phrase matcher
    Keyword,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Label every row of an input table and write the result file
    Run {
        /// Input CSV (authors,title,year,scholar_link)
        #[arg(long, short, requires = "output", conflicts_with = "period")]
        input: Option<PathBuf>,

        /// Output CSV (authors,title,year,dric)
        #[arg(long, short, requires = "input")]
        output: Option<PathBuf>,

        /// Academic period (e.g. 2016-2017); uses the conventional data layout
        #[arg(long, short, required_unless_present = "input")]
        period: Option<String>,

        /// Root of the data layout used with --period
        #[arg(long, default_value = "Data")]
        data_dir: PathBuf,

        /// Keep the first N rows of the output and continue from row N
        #[arg(long, conflicts_with = "resume")]
        start_row: Option<usize>,

        /// Continue after the last complete row of the output
        #[arg(long)]
        resume: bool,

        /// Content fetch service (overrides configuration)
        #[arg(long, value_enum)]
        fetch_backend: Option<FetchBackendArg>,

        /// Classification service (overrides configuration)
        #[arg(long, value_enum)]
        classifier: Option<ClassifierArg>,
    },

    /// Resolve the full-text link behind one search-result link
    Resolve {
        /// Search-engine result page URL
        source_link: String,
    },

    /// Show the search strings generated for an author name
    Queries {
        /// Full author name
        name: String,
    },

    /// Show the effective configuration
    Config {
        /// Write a default configuration file to PATH instead
        #[arg(long, value_name = "PATH")]
        init: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8, quiet: bool, logging: &LoggingConfig) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let json = logging
        .format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("dric_check={}", level)),
        ))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn build_resolver(config: &Config) -> Result<LinkResolver> {
    let pages = HttpPageSource::new(
        config.resolver.page_timeout(),
        Pacer::new(config.resolver.min_interval()),
    )
        .context("Failed to build HTTP client for result pages")?;
    Ok(LinkResolver::new(
        Arc::new(pages),
        LinkRules::from_config(&config.resolver),
    ))
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let resolver = build_resolver(config)?;

    let content: Arc<dyn ContentService> = match config.fetch.backend {
        FetchBackend::Firecrawl => {
            let key = config.api_keys.firecrawl.clone().context(
                "Firecrawl backend needs an API key: set FIRECRAWL_API_KEY or [api_keys] firecrawl, \
                 or use --fetch-backend direct",
            )?;
            Arc::new(FirecrawlService::new(&config.fetch, key).context("Failed to build Firecrawl client")?)
        }
        FetchBackend::Direct => Arc::new(
            DirectService::new(config.fetch.request_timeout())
                .context("Failed to build HTTP client for content")?,
        ),
    };
    let fetcher = FetchClient::new(
        content,
        Pacer::new(config.fetch.min_interval()),
        config.fetch.retry_config(),
    );

    let judge: Arc<dyn TextClassifier> = match config.classifier.backend {
        ClassifierBackend::Chat => {
            let key = config.api_keys.groq.clone().context(
                "Chat classifier needs an API key: set GROQ_API_KEY or [api_keys] groq, \
                 or use --classifier keyword",
            )?;
            Arc::new(
                ChatClassifier::new(&config.classifier, key)
                    .context("Failed to build classifier client")?,
            )
        }
        ClassifierBackend::Keyword => {
            Arc::new(KeywordClassifier::new().context("Failed to build keyword classifier")?)
        }
    };
    let classifier = Classifier::new(
        judge,
        Pacer::new(config.classifier.min_interval()),
        config.classifier.retry_config(),
    );

    Ok(Pipeline::new(resolver, fetcher, classifier))
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    mut config: Config,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    period: Option<String>,
    data_dir: &Path,
    start_row: Option<usize>,
    resume: bool,
    fetch_backend: Option<FetchBackendArg>,
    classifier: Option<ClassifierArg>,
    quiet: bool,
) -> Result<()> {
    if let Some(backend) = fetch_backend {
        config.fetch.backend = match backend {
            FetchBackendArg::Firecrawl => FetchBackend::Firecrawl,
            FetchBackendArg::Direct => FetchBackend::Direct,
        };
    }
    if let Some(backend) = classifier {
        config.classifier.backend = match backend {
            ClassifierArg::Chat => ClassifierBackend::Chat,
            ClassifierArg::Keyword => ClassifierBackend::Keyword,
        };
    }

    let (input, output) = match (input, output, period) {
        (Some(input), Some(output), _) => (input, output),
        (_, _, Some(period)) => {
            let (first, last) = parse_period(&period)?;
            tracing::info!("Processing period {} ({}-{})", period, first, last);
            let paths = period_paths(data_dir, &period);
            (paths.input, paths.output)
        }
        _ => bail!("Either --input and --output, or --period, is required"),
    };

    let records = read_records(&input)
        .with_context(|| format!("Failed to read input {}", input.display()))?;
    tracing::info!("Loaded {} records from {}", records.len(), input.display());

    let pipeline = build_pipeline(&config)?;

    let start_row = if resume {
        Some(completed_rows(&output)?)
    } else {
        start_row
    };
    let mut context = RunContext::open(&output, start_row, records.len())
        .with_context(|| format!("Failed to open output {}", output.display()))?;

    let progress = RunProgress::new(records.len(), context.current_row());
    let finished = tokio::select! {
        result = pipeline.run_with(&records, &mut context, |row, outcome| progress.row_done(row, outcome)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    progress.finish();

    let summary = match finished {
        Some(result) => result?,
        None => {
            tracing::warn!(
                "Interrupted; {} rows complete, continue with --resume or --start-row {}",
                context.current_row(),
                context.current_row()
            );
            context.summary()
        }
    };

    if !quiet {
        println!("{}", summary_table(&summary));
        println!("Results written to {}", output.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    init_tracing(cli.verbose, cli.quiet, &config.logging);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Run {
            input,
            output,
            period,
            data_dir,
            start_row,
            resume,
            fetch_backend,
            classifier,
        } => {
            run_command(
                config,
                input,
                output,
                period,
                &data_dir,
                start_row,
                resume,
                fetch_backend,
                classifier,
                cli.quiet,
            )
            .await?;
        }

        Commands::Resolve { source_link } => {
            let resolver = build_resolver(&config)?;
            let record = PublicationRecord::new("", "", 0, source_link.clone());
            match resolver.resolve(&record).await {
                Ok(link) => println!("{}", link_table(&link)),
                Err(e) => bail!("Could not resolve {}: {} (label would be NF)", source_link, e),
            }
        }

        Commands::Queries { name } => {
            for query in build_queries(&name) {
                println!("{}", query);
            }
        }

        Commands::Config { init } => match init {
            Some(path) => {
                if path.exists() {
                    bail!("{} already exists", path.display());
                }
                let mut defaults = Config::default();
                defaults.api_keys.firecrawl = None;
                defaults.api_keys.groq = None;
                let content = toml::to_string_pretty(&defaults)?;
                std::fs::write(&path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote default configuration to {}", path.display());
            }
            None => {
                println!("{}", toml::to_string_pretty(&config.redacted())?);
            }
        },

        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "dric-check", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_with_paths() {
        let cli = Cli::try_parse_from([
            "dric-check",
            "run",
            "--input",
            "raw.csv",
            "--output",
            "out.csv",
            "--start-row",
            "12",
            "--classifier",
            "keyword",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                input,
                output,
                start_row,
                classifier,
                period,
                ..
            } => {
                assert_eq!(input, Some(PathBuf::from("raw.csv")));
                assert_eq!(output, Some(PathBuf::from("out.csv")));
                assert_eq!(start_row, Some(12));
                assert_eq!(classifier, Some(ClassifierArg::Keyword));
                assert!(period.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_with_period() {
        let cli = Cli::try_parse_from(["dric-check", "-v", "run", "--period", "2016-2017", "--resume"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Commands::Run { resume: true, period: Some(_), .. }
        ));
    }

    #[test]
    fn test_run_argument_conflicts() {
        assert!(Cli::try_parse_from(["dric-check", "run"]).is_err());
        assert!(Cli::try_parse_from(["dric-check", "run", "--input", "a.csv"]).is_err());
        assert!(Cli::try_parse_from([
            "dric-check", "run", "--period", "2020", "--resume", "--start-row", "3"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "dric-check", "run", "--input", "a.csv", "--output", "b.csv", "--period", "2020"
        ])
        .is_err());
    }
}
