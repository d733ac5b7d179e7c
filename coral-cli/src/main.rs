mod progress_bar;
mod prompt;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use coral::{
    browser::{ResultBrowser, Viewer},
    config::{ConfigOverrides, CoralConfig},
    query::{Query, SearchMode, SearchRequest},
    report,
    search::SearchEngine,
    SearchError,
};
use std::{io, num::NonZeroUsize, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use progress_bar::BarProgress;
use prompt::PromptKind;

type Result<T> = std::result::Result<T, SearchError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file applied over the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Fixed string
    Literal,
    /// POSIX basic regular expression
    Regex,
    /// POSIX extended regular expression
    Extended,
    /// Any of the terms
    Or,
    /// All of the terms
    And,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Literal => SearchMode::Literal,
            ModeArg::Regex => SearchMode::BasicRegex,
            ModeArg::Extended => SearchMode::ExtendedRegex,
            ModeArg::Or => SearchMode::Or,
            ModeArg::And => SearchMode::And,
        }
    }
}

#[derive(Parser)]
struct SearchArgs {
    /// Query. With --mode or/and, each argument is a term, or a single argument is
    /// split with shell-style quoting. Prompts when omitted.
    query: Vec<String>,

    /// Directory to search; a file means its parent directory
    #[arg(short = 'd', long, default_value = ".")]
    root: PathBuf,

    /// How the query is matched
    #[arg(short, long, value_enum, default_value_t = ModeArg::Literal)]
    mode: ModeArg,

    /// Only search files whose name matches this glob (repeatable)
    #[arg(short, long)]
    include: Vec<String>,

    /// Skip paths matching this glob, e.g. '*/node_modules' (repeatable)
    #[arg(short = 'x', long)]
    exclude: Vec<String>,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_links: bool,

    /// pdftotext-compatible program used for PDF files
    #[arg(long)]
    extractor: Option<PathBuf>,

    /// Directory for extracted PDF text
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// How to ask for the query when none is given
    #[arg(long, value_enum, default_value_t = PromptKind::Terminal)]
    prompt: PromptKind,

    /// Print absolute result paths instead of opening the browser
    #[arg(long)]
    no_browse: bool,

    /// Also write a Markdown report next to the result list
    #[arg(long)]
    report: bool,

    /// Print results as JSON instead of opening the browser
    #[arg(long)]
    json: bool,

    /// Don't show progress
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search file contents and names
    Search(Box<SearchArgs>),

    /// Print the text of a PDF, using the cache
    Extract {
        /// PDF file
        path: PathBuf,

        /// pdftotext-compatible program
        #[arg(long)]
        extractor: Option<PathBuf>,

        /// Directory for extracted PDF text
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Inspect or clear the PDF text cache
    Cache {
        /// Print the cache directory
        #[arg(long)]
        path: bool,

        /// Print the number and size of entries
        #[arg(long)]
        stats: bool,

        /// Remove every entry
        #[arg(long)]
        clear: bool,

        /// Directory for extracted PDF text
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(SearchError::Cancelled) => {
            eprintln!("{}", "Search cancelled".yellow());
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            if e.is_validation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = CoralConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Search(args) => {
            let config = config.merge_with_cli(ConfigOverrides {
                included: Some(args.include.clone()),
                excluded: Some(args.exclude.clone()),
                follow_links: args.follow_links.then_some(true),
                thread_count: args.threads,
                log_level: cli.log_level,
                cache_dir: args.cache_dir.clone(),
                extractor: args.extractor.clone(),
            });
            init_logging(&config.log_level);
            run_search(&args, &config)
        }
        Commands::Extract {
            path,
            extractor,
            cache_dir,
        } => {
            let config = config.merge_with_cli(ConfigOverrides {
                log_level: cli.log_level,
                cache_dir,
                extractor,
                ..ConfigOverrides::default()
            });
            init_logging(&config.log_level);

            if !path.is_file() {
                return Err(SearchError::root_not_found(path));
            }
            let cache = config.build_cache();
            if !cache.extractor_available() {
                return Err(SearchError::cache_error(format!(
                    "{} is not installed",
                    config.cache.extractor.display()
                )));
            }
            let text = cache.get_text(&path).ok_or_else(|| {
                SearchError::cache_error(format!(
                    "no text could be extracted from {}",
                    path.display()
                ))
            })?;
            print!("{}", text);
            Ok(())
        }
        Commands::Cache {
            path,
            stats,
            clear,
            cache_dir,
        } => {
            let config = config.merge_with_cli(ConfigOverrides {
                log_level: cli.log_level,
                cache_dir,
                ..ConfigOverrides::default()
            });
            init_logging(&config.log_level);

            let cache = config.build_cache();
            let show_all = !(path || stats || clear);
            if path || show_all {
                println!("{}", cache.dir().display());
            }
            if stats || show_all {
                let stats = cache.stats()?;
                println!("{} entries, {} bytes", stats.entries, stats.bytes);
            }
            if clear {
                let removed = cache.clear()?;
                println!("Removed {} entries", removed);
            }
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_query(args: &SearchArgs, mode: SearchMode) -> Result<Query> {
    match args.query.as_slice() {
        [] => {
            let message = if mode.is_multi_term() {
                "Enter search terms (space separated, quote phrases):"
            } else {
                "Enter search term:"
            };
            let raw = args
                .prompt
                .prompt()
                .ask(message)?
                .ok_or(SearchError::Cancelled)?;
            Query::parse(mode, &raw)
        }
        [single] => Query::parse(mode, single),
        terms => Query::from_terms(mode, terms.to_vec()),
    }
}

/// Progress is drawn unless `--quiet` or `--json` is given
fn progress_bar(args: &SearchArgs) -> Option<Arc<BarProgress>> {
    (!args.quiet && !args.json).then(|| Arc::new(BarProgress::new()))
}

fn run_search(args: &SearchArgs, config: &CoralConfig) -> Result<()> {
    let mode = SearchMode::from(args.mode);
    let query = read_query(args, mode)?;
    let request = SearchRequest::builder(&args.root)
        .mode(mode)
        .query(query)
        .include(config.search.included.clone())
        .exclude(config.search.excluded.clone())
        .build()?;

    let bar = progress_bar(args);
    let mut engine = SearchEngine::new(config.build_cache())
        .with_thread_count(config.thread_count)
        .with_follow_links(config.search.follow_links);
    if let Some(bar) = &bar {
        engine = engine.with_progress(bar.clone());
    }

    let token = engine.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    eprintln!("Searching for: {}", request.query().raw().bold());
    eprintln!("Search type: {}", request.mode());
    eprintln!("In folder: {}", request.root().display());

    let output = engine.search(&request);
    if let Some(bar) = &bar {
        bar.finish();
    }
    let output = output?;

    for warning in &output.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    let scratch = report::scratch_dir();
    let stamp = report::timestamp();
    let list = report::write_results_list(&scratch, &stamp, &output)?;
    debug!("Results written to {}", list.display());
    if args.report {
        let path = report::write_markdown_report(&scratch, &stamp, &request, &output)?;
        eprintln!("Report written to: {}", path.display());
    }

    let elapsed = Duration::from_millis(output.elapsed.as_millis() as u64);
    eprintln!(
        "{} {} results in {}",
        "Search complete!".green().bold(),
        output.results.len(),
        humantime::format_duration(elapsed)
    );

    if args.json {
        let json = serde_json::to_string_pretty(&output.results).map_err(io::Error::other)?;
        println!("{}", json);
        return Ok(());
    }
    if args.no_browse {
        print!("{}", output.results.to_list_string());
        return Ok(());
    }

    ResultBrowser::new(
        request.root(),
        &output.results,
        Viewer::from_settings(&config.viewer),
    )
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_args(args: &[&str]) -> SearchArgs {
        SearchArgs::try_parse_from(std::iter::once("search").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_progress_bar_only_when_shown() {
        assert!(progress_bar(&search_args(&["needle"])).is_some());
        assert!(progress_bar(&search_args(&["--quiet", "needle"])).is_none());
        assert!(progress_bar(&search_args(&["--json", "needle"])).is_none());
    }

    #[test]
    fn test_mode_arg_maps_to_search_mode() {
        let args = search_args(&["--mode", "extended", "a|b"]);
        assert_eq!(SearchMode::from(args.mode), SearchMode::ExtendedRegex);
        assert_eq!(args.query, vec!["a|b"]);
    }
}
