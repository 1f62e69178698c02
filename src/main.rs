//! Loco-Mirror main entry point
//!
//! This is the command-line interface for mirroring a JavaScript-rendered
//! site into static files.

use anyhow::Context;
use clap::Parser;
use loco_mirror::config::{load_config_with_hash, load_target, Config, ConfigResolver};
use loco_mirror::crawler::{mirror, RunOptions};
use loco_mirror::output::{print_summary, CleanOptions};
use loco_mirror::url::canonicalize;
use loco_mirror::PathMapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Loco-Mirror: offline copies of JavaScript-rendered sites
///
/// Every page is rendered in Chromium, its images, stylesheets, scripts and
/// fonts are downloaded next to it, and every in-domain link is followed and
/// rewritten to the local copy.
#[derive(Parser, Debug)]
#[command(name = "loco-mirror")]
#[command(version)]
#[command(about = "Mirror a JavaScript-rendered site to static files", long_about = None)]
struct Cli {
    /// Starting URL or path to a TOML/JSON configuration file
    #[arg(value_name = "TARGET")]
    target: String,

    /// Destination directory (overrides `output` in the config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Mirror only the starting page
    #[arg(long)]
    single_page: bool,

    /// Per-page render timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Delete the destination directory before mirroring
    #[arg(long)]
    clean: bool,

    /// Delete cached stylesheets before mirroring
    #[arg(long)]
    clean_css: bool,

    /// Delete cached scripts before mirroring
    #[arg(long)]
    clean_js: bool,

    /// Show the browser window
    #[arg(long)]
    non_headless: bool,

    /// Chrome/Chromium executable to use
    #[arg(long, value_name = "PATH")]
    browser: Option<PathBuf>,

    /// Validate the configuration and show what would be mirrored
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = load(&cli.target)?;
    apply_overrides(&mut config, &cli);

    if cli.dry_run {
        handle_dry_run(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let options = RunOptions {
        single_page: cli.single_page,
        timeout: cli.timeout.map(Duration::from_secs),
        clean: CleanOptions {
            all: cli.clean,
            css: cli.clean_css,
            js: cli.clean_js,
        },
    };

    let summary = match mirror(config, options).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            return Err(e.into());
        }
    };

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("loco_mirror=info,warn"),
            1 => EnvFilter::new("loco_mirror=debug,info"),
            2 => EnvFilter::new("loco_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration for a URL or config file target
fn load(target: &str) -> anyhow::Result<Config> {
    let path = Path::new(target);
    if path.is_file() {
        tracing::info!("Loading configuration from: {}", path.display());
        let (config, hash) = load_config_with_hash(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        tracing::info!("Configuration loaded successfully (hash: {})", hash);
        return Ok(config);
    }

    load_target(target).with_context(|| format!("Invalid target '{}'", target))
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    if cli.non_headless {
        config.render.headless = false;
    }
    if let Some(browser) = &cli.browser {
        config.render.browser_path = Some(browser.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.render.timeout_secs = timeout;
    }
}

/// Handles the --dry-run mode: validates config and shows what would be mirrored
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let start = canonicalize(&config.page)?;
    let resolver = ConfigResolver::new(config);
    let mapper = PathMapper::new(&start).with_overrides(resolver.path_overrides());
    let effective = resolver.resolve(&start);

    println!("=== Loco-Mirror Dry Run ===\n");

    println!("Site:");
    println!("  Start page: {}", start);
    println!("  Output: {}", config.output_dir().display());
    println!("  Assets: {}", config.output_dir().join(&config.assets_dir).display());
    println!("  Extension in links: {}", config.extension_in_links);
    if !config.asset_hosts.is_empty() {
        println!("  Extra asset hosts: {}", config.asset_hosts.join(", "));
    }

    println!("\nRender:");
    println!("  Readiness: {:?}", config.render.readiness);
    println!("  Timeout: {}s", config.render.timeout_secs);
    println!("  Headless: {}", config.render.headless);
    println!(
        "  Window: {}x{}",
        config.render.window_width, config.render.window_height
    );

    println!("\nStart page settings:");
    println!("  Written to: {}", mapper.to_local_path(&start).display());
    println!(
        "  Cache images/backgrounds/stylesheets/scripts/fonts: {}/{}/{}/{}/{}",
        effective.cache_images,
        effective.cache_backgrounds,
        effective.cache_stylesheets,
        effective.cache_scripts,
        effective.cache_fonts
    );
    println!("  Remove selectors: {}", effective.remove_selectors.join(", "));
    println!("  Fonts: {}", effective.fonts.len());
    println!(
        "  Injected elements: {} head, {} body",
        effective.inject_head.len(),
        effective.inject_body.len()
    );

    println!("\nDomain Settings ({}):", config.domains.len());
    for pattern in config.domains.keys() {
        println!("  - {}", pattern);
    }

    println!("\nPage Settings ({}):", config.pages.len());
    for (token, layer) in &config.pages {
        match &layer.path {
            Some(path) => println!("  - {} -> {}", token, path.display()),
            None => println!("  - {}", token),
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
