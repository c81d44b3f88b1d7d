use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::InquireError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use invoice_wizard::config::{self, Settings};
use invoice_wizard::prompt;
use invoice_wizard::{Publisher, Wizard};

#[derive(Parser)]
#[command(name = "invoice-wizard", version, about = "Build a PDF invoice step by step")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Save invoices here instead of the configured directory
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Do not reveal the saved PDF in the file manager
    #[arg(long, global = true)]
    no_open: bool,

    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new invoice (default)
    New,
    /// Configure output directory, typst binary and template
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        if let Some(InquireError::OperationInterrupted) = e.downcast_ref::<InquireError>() {
            println!("\n👋 Cancelled.");
            return;
        }
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let path = config::config_path();
    let mut settings = Settings::load(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    debug!(path = %path.display(), "settings loaded");

    match cli.command.unwrap_or(Commands::New) {
        Commands::Config => {
            let updated = prompt::config_wizard(settings)?;
            updated
                .save(&path)
                .with_context(|| format!("failed to save settings to {}", path.display()))?;
            println!("✅ Configuration saved to {}", path.display());
        }
        Commands::New => {
            if let Some(dir) = cli.output_dir {
                settings.output_dir = dir.to_string_lossy().into_owned();
            }
            if cli.no_open {
                settings.open_after_save = false;
            }

            let publisher = Publisher::new(&settings).context("failed to load invoice template")?;
            info!(output = %publisher.output_dir().display(), "starting invoice wizard");
            let mut wizard = Wizard::new(publisher);

            match prompt::run(&mut wizard)? {
                Some(path) => println!("📄 Saved to {}", path.display()),
                None => println!("No invoice created."),
            }
        }
    }
    Ok(())
}
