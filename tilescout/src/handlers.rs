use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tilescout_core::report::{
    ReportFormat, generate_enriched_report, generate_report, save_report, summary_line,
};
use tilescout_core::scrape::{ScrapeOptions, Scraper, execute_scrape};
use tilescout_core::{SiteProfile, load_profile};
use tilescout_scanner::normalize::extract_url_path;
use tilescout_scanner::{ChromeConfig, ChromeDriver};
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_LOG_FILTER: &str = "tilescout=info,tilescout_core=warn,tilescout_scanner=warn";
const VERBOSE_LOG_FILTER: &str = "tilescout=debug,tilescout_core=debug,tilescout_scanner=debug";

/// Set up tracing on stderr. `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{} {}",
        "tilescout".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "category tree product scraper".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Parse a start URL, assuming https:// when no scheme is given
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.has_host() => Some(with_scheme),
        _ => None,
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Explicit `--format` wins, then the output file extension, then text.
pub fn resolve_format(format: Option<&str>, output: Option<&Path>) -> ReportFormat {
    format
        .and_then(ReportFormat::from_str)
        .or_else(|| output.and_then(ReportFormat::from_path))
        .unwrap_or(ReportFormat::Text)
}

/// Sibling file for the enriched snapshot: `products.csv` -> `products_full.csv`.
pub fn enriched_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "products".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}_full.{}", stem, ext.to_string_lossy()),
        None => format!("{}_full", stem),
    };
    path.with_file_name(name)
}

pub fn load_profile_arg(args: &ArgMatches) -> Result<SiteProfile> {
    let path = args.get_one::<String>("profile").map(|p| expand_path(p));
    Ok(load_profile(path.as_deref())?)
}

/// Build scrape options from whichever of the scrape/discover/classify
/// arguments are present.
pub fn scrape_options_from_args(args: &ArgMatches) -> Result<ScrapeOptions> {
    let raw = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let Some(start_url) = parse_url_line(raw) else {
        bail!("'{}' is not a valid start URL", raw);
    };

    let mut options = ScrapeOptions::new(start_url);
    if let Some(depth) = optional::<usize>(args, "depth") {
        options.max_depth = depth;
    }
    if let Some(threads) = optional::<usize>(args, "threads") {
        if threads == 0 {
            bail!("--threads must be at least 1");
        }
        options.workers = threads;
    }
    if let Some(max_steps) = optional::<usize>(args, "max-steps") {
        options.max_steps = max_steps;
    }
    options.budget = optional::<u64>(args, "budget").map(Duration::from_secs);
    options.enrich = flag(args, "enrich");
    options.show_progress_bars = true;
    Ok(options)
}

pub fn chrome_config(args: &ArgMatches, profile: &SiteProfile) -> ChromeConfig {
    let timeout = optional::<u64>(args, "timeout").unwrap_or(60);
    ChromeConfig::from_profile(profile)
        .with_headless(!flag(args, "headful"))
        .with_remote_url(args.get_one::<String>("remote").cloned())
        .with_timeout(Duration::from_secs(timeout))
}

// Arguments are not shared by every subcommand; absent ids read as unset.
fn optional<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    args.try_get_one::<T>(id).ok().flatten().cloned()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

async fn start_browser(args: &ArgMatches, profile: &SiteProfile) -> Result<Arc<ChromeDriver>> {
    let config = chrome_config(args, profile);
    let driver = ChromeDriver::start(config)
        .await
        .context("Could not start a browser session")?;
    Ok(Arc::new(driver))
}

async fn stop_browser(driver: Arc<ChromeDriver>) {
    if let Ok(driver) = Arc::try_unwrap(driver) {
        driver.shutdown().await;
    }
}

pub async fn handle_scrape(args: &ArgMatches) -> Result<()> {
    let profile = load_profile_arg(args)?;
    let options = scrape_options_from_args(args)?;
    let output = args.get_one::<String>("output").map(|p| expand_path(p));
    let format = resolve_format(
        args.get_one::<String>("format").map(String::as_str),
        output.as_deref(),
    );

    print_divider();
    println!("{} {}", "→".blue(), options.start_url.bright_white());
    println!("Workers: {}", options.workers);
    println!("Max depth: {}", options.max_depth);
    println!(
        "Enrichment: {}",
        if options.enrich { "on" } else { "off" }
    );
    print_divider();
    println!();

    let driver = start_browser(args, &profile).await?;
    let outcome = execute_scrape(driver.clone(), profile, options, None).await;
    stop_browser(driver).await;
    let outcome = outcome?;

    let content = generate_report(&outcome, format)?;
    let enriched = generate_enriched_report(&outcome, format)?;
    match output {
        Some(path) => {
            save_report(&content, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Saved {} to {}",
                "✓".green().bold(),
                summary_line(&outcome),
                path.display().to_string().bright_white()
            );

            if let Some(enriched) = enriched {
                let full_path = enriched_output_path(&path);
                save_report(&enriched, &full_path)
                    .with_context(|| format!("Failed to write {}", full_path.display()))?;
                println!(
                    "{} Saved enriched records to {}",
                    "✓".green().bold(),
                    full_path.display().to_string().bright_white()
                );
            }
        }
        None => {
            print!("{}", content);
            if let Some(enriched) = enriched {
                print_divider();
                print!("{}", enriched);
            }
            println!("{} {}", "✓".green().bold(), summary_line(&outcome));
        }
    }

    if outcome.cancelled {
        println!(
            "{}",
            "⚠ Run budget exhausted, results are partial.".yellow()
        );
    }
    Ok(())
}

pub async fn handle_discover(args: &ArgMatches) -> Result<()> {
    let profile = load_profile_arg(args)?;
    let options = scrape_options_from_args(args)?;

    let driver = start_browser(args, &profile).await?;
    let discovery = match Scraper::new(driver.clone(), profile, options) {
        Ok(scraper) => scraper.discover().await,
        Err(e) => Err(e),
    };
    stop_browser(driver).await;
    let discovery = discovery?;

    println!(
        "\n{} {} categories found, {} listing pages\n",
        "✓".green().bold(),
        discovery.discovered.len(),
        discovery.listings.len()
    );
    for listing in &discovery.listings {
        println!("  {}", extract_url_path(listing));
    }
    if discovery.cancelled {
        println!(
            "\n{}",
            "⚠ Run budget exhausted, discovery is partial.".yellow()
        );
    }
    Ok(())
}

pub async fn handle_classify(args: &ArgMatches) -> Result<()> {
    let profile = load_profile_arg(args)?;
    let options = scrape_options_from_args(args)?;
    let start = options.start_url.clone();

    let driver = start_browser(args, &profile).await?;
    let listing = match Scraper::new(driver.clone(), profile, options) {
        Ok(scraper) => scraper.classify_start().await,
        Err(e) => Err(e),
    };
    stop_browser(driver).await;

    if listing? {
        println!("{} {} is a listing page", "✓".green().bold(), start);
    } else {
        println!("{} {} is not a listing page", "✗".red().bold(), start);
    }
    Ok(())
}
