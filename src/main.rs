use clap::{Parser, Subcommand};
use photo_publish::config::{self, ExportOptions};
use photo_publish::imaging::RustBackend;
use photo_publish::naming::NamingStrategy;
use photo_publish::{collection, export, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photo-publish")]
#[command(about = "Export a picture collection as a static website and publish it")]
#[command(long_about = "\
Export a picture collection as a static website and publish it

A collection is either a directory tree or a collection.json document:

  holiday/
  ├── collection.json          # Optional: full metadata, replaces the scan
  ├── 010-beach.jpg            # Picture (NNN- prefix orders, then is stripped)
  ├── 010-beach.txt            # Sidecar description
  └── 030-Day-Trips/           # Subgroup
      └── 001-harbour.jpg

Each group becomes a thumbnail table page, each picture a lowres thumbnail, a
midres page and optionally a highres copy. The root page is index.htm. The
finished site is written to target_dir and then, depending on [output], left
there or uploaded over FTP or SCP.

Run 'photo-publish gen-config' to generate a documented export.toml.")]
#[command(version)]
struct Cli {
    /// Export configuration file (defaults apply when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the site and publish it to the configured output
    Export {
        /// Collection directory or collection.json document
        collection: PathBuf,
        /// Override target_dir from the configuration
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Load the collection and show the page each node becomes
    Check {
        /// Collection directory or collection.json document
        collection: PathBuf,
    },
    /// Print a stock export.toml with all options documented
    GenConfig,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("photo_publish=debug,warn")
    } else {
        EnvFilter::new("photo_publish=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ExportOptions, config::ConfigError> {
    match path {
        Some(path) => config::load_options(path),
        None => Ok(ExportOptions::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Export { collection, target } => {
            setup_logging(cli.verbose);
            let mut options = load_config(cli.config.as_deref())?;
            if let Some(target) = target {
                options.target_dir = target;
            }
            options.validate()?;
            let root = collection::load(&collection)?;
            options.naming.check_capacity(root.count_pictures())?;

            let handle = export::spawn(options, root, RustBackend::new());
            let interrupt = handle.interrupt();
            ctrlc::set_handler(move || {
                eprintln!("\nInterrupt received, finishing current picture...");
                interrupt.trip();
            })?;
            let (progress, run) = handle.into_parts();
            let printer = std::thread::spawn(move || {
                for event in progress {
                    for line in output::format_progress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = run.join()?;
            printer.join().map_err(|_| "progress printer panicked")?;

            println!();
            output::print_report(&report);
            if report.publish.as_ref().is_some_and(|p| !p.is_complete()) {
                return Err("some files were not published".into());
            }
        }
        Command::Check { collection } => {
            setup_logging(cli.verbose);
            let options = load_config(cli.config.as_deref())?;
            options.validate()?;
            let root = collection::load(&collection)?;
            options.naming.check_capacity(root.count_pictures())?;
            let naming = NamingStrategy::new(&root, &options.naming, options.highres.rotate);
            output::print_collection_tree(&root, &naming);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
