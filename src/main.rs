//! doclink CLI - resolve document imports, or serve the tool adapter

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use doclink::config::DoclinkConfig;
use doclink::document::{render, OutputFormat};
use doclink::error::{DoclinkError, FixSuggestion};
use doclink::linker::{ImportBase, Linker};
use doclink::server::{self, ExitCodePolicy};

#[derive(Parser)]
#[command(name = "doclink")]
#[command(about = "Resolve {import: path} references in workflow documents")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    link: LinkArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP adapter (/get_command_line, /get_outputs)
    Serve(ServeArgs),
}

#[derive(Args)]
struct LinkArgs {
    /// Path to the root document (YAML or JSON)
    file: Option<PathBuf>,

    /// Resolve imports inside imported files as well
    #[arg(short, long)]
    recursive: bool,

    /// Base for relative import paths
    #[arg(long, value_enum)]
    relative_to: Option<ImportBase>,

    /// Maximum number of nested imports
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address, host:port
    #[arg(short, long)]
    bind: Option<String>,

    /// How job status is derived from exit codes
    #[arg(long, value_enum)]
    exit_codes: Option<ExitCodePolicy>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Serve(args)) => {
            init_tracing("info");
            run_server(args).await
        }
        None => {
            init_tracing("warn");
            run_link(cli.link)
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<DoclinkError>() {
            Some(error) => {
                eprintln!("{} {}", "Error:".red().bold(), error);
                if let Some(suggestion) = error.fix_suggestion() {
                    eprintln!("  {} {}", "Fix:".yellow(), suggestion);
                }
            }
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout is reserved for the linked document
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_link(args: LinkArgs) -> anyhow::Result<()> {
    let Some(file) = args.file else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "a document path is required (or use `doclink serve`)",
            )
            .exit();
    };

    let mut settings = DoclinkConfig::load(args.config.as_deref())?.link;
    if args.recursive {
        settings.recursive = true;
    }
    if let Some(base) = args.relative_to {
        settings.relative_to = base;
    }
    if let Some(depth) = args.max_depth {
        settings.max_depth = depth;
    }
    if let Some(format) = args.format {
        settings.format = format;
    }

    let mut linker = Linker::new(settings.options());
    let linked = linker.link(&file)?;
    let rendered = render(&linked, settings.format)?;

    println!("{}", rendered.trim_end_matches('\n'));
    Ok(())
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = DoclinkConfig::load(args.config.as_deref())?.with_env().server;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if let Some(policy) = args.exit_codes {
        settings.exit_codes = policy;
    }

    server::run(&settings).await
}
