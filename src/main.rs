use clap::{Parser, Subcommand};
use inbox_gallery::cache::OcrCache;
use inbox_gallery::config::{self, DEFAULT_CONFIG_FILE, GalleryConfig};
use inbox_gallery::metadata::Extractor;
use inbox_gallery::scan::{self, ScanOptions, ScanReport};
use inbox_gallery::{generate, output};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inbox-gallery")]
#[command(about = "Build a static photo gallery from an inbox directory, grouped by camera model")]
#[command(long_about = "\
Build a static photo gallery from an inbox directory, grouped by camera model

Drop images into the inbox and run inbox-gallery. Every image gets a page,
grouped by the device that took it:

  inbox/                     site/
  ├── IMG_0042.HEIC    →     ├── index.html
  ├── canon_01.jpg           ├── models/<model>.html
  └── PXL_0001.jpg           ├── photos/<photo>.html
                             └── assets/<model>/<file>

Model resolution (first available wins):
  1. Embedded EXIF make/model
  2. Filename rules (iphone → iPhone, canon → Canon, ...)
  3. Product code in recognized text (with detect.infer_codes)
  4. \"unknown\"

Run 'inbox-gallery gen-config' to generate a documented inbox-gallery.toml.")]
#[command(version)]
struct Cli {
    /// Inbox directory [default: inbox, or `inbox` from the config file]
    #[arg(long, global = true)]
    inbox: Option<PathBuf>,

    /// Output directory [default: site, or `output` from the config file]
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Config file (optional unless given explicitly)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore cached text recognition results
    #[arg(long, global = true)]
    no_cache: bool,

    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the inbox and build the site (default)
    Build,
    /// Scan the inbox and print what would be built, without writing anything
    Check {
        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock inbox-gallery.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        None | Some(Command::Build) => {
            let run = Run::from_cli(&cli)?;
            let mut extractor = Extractor::from_config(&run.config).with_cache(run.load_cache());

            println!("==> Scanning {}", run.inbox.display());
            let report = scan::scan(&run.inbox, &mut extractor, &run.options)?;
            output::print_scan_output(&report);

            println!("==> Building {}", run.output.display());
            let summary = generate::build(&report.records, &run.output, &run.config.site)?;
            output::print_build_output(&report.records);

            let ocr_enabled = extractor.recognizer_enabled();
            let stats = extractor.stats().clone();
            if ocr_enabled {
                // Losing the cache only costs time on the next run.
                if let Err(e) = extractor.into_cache().save(&run.output) {
                    warn!(error = %e, "could not save text recognition cache");
                }
            }

            println!();
            output::print_summary(&report, ocr_enabled.then_some(&stats), Some(&summary));
            println!("==> Build complete: {}", run.output.display());
        }
        Some(Command::Check { json }) => {
            let run = Run::from_cli(&cli)?;
            let mut extractor = Extractor::from_config(&run.config).with_cache(run.load_cache());
            let report = scan::scan(&run.inbox, &mut extractor, &run.options)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_check(&report, &extractor);
            }
        }
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Settings for one scan, after merging the config file and CLI flags.
struct Run {
    config: GalleryConfig,
    inbox: PathBuf,
    output: PathBuf,
    options: ScanOptions,
    no_cache: bool,
}

impl Run {
    fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let config = load_config(cli.config.as_deref())?;
        let inbox = cli.inbox.clone().unwrap_or_else(|| PathBuf::from(&config.inbox));
        let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(&config.output));
        let options = ScanOptions::from_config(&config);
        Ok(Self {
            config,
            inbox,
            output,
            options,
            no_cache: cli.no_cache,
        })
    }

    fn load_cache(&self) -> OcrCache {
        if self.no_cache {
            OcrCache::empty()
        } else {
            OcrCache::load(&self.output)
        }
    }
}

fn print_check(report: &ScanReport, extractor: &Extractor) {
    output::print_scan_output(report);
    println!();
    output::print_build_output(&report.records);
    println!();
    let stats = extractor.recognizer_enabled().then(|| extractor.stats());
    output::print_summary(report, stats, None);
}

/// Load the explicitly named config file, or `inbox-gallery.toml` if present.
fn load_config(explicit: Option<&Path>) -> Result<GalleryConfig, config::ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let config = config::load_config(&path, required)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Diagnostics on stderr: `RUST_LOG` if set, otherwise `warn` (`debug` with -v).
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
