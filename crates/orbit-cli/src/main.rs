//! Orbit CLI - incremental Rust notebook kernel in the terminal.

mod colors;
mod console;
mod notebook;
mod repl;
mod run;
mod session;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use session::KernelOptions;

#[derive(Parser)]
#[command(name = "orbit")]
#[command(about = "Incremental Rust notebook kernel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every cell of a notebook file in order
    Run {
        /// Path to the notebook; cells are separated by `// ---` lines
        notebook: String,

        #[command(flatten)]
        kernel: KernelArgs,
    },

    /// Start an interactive session on the terminal
    Repl {
        #[command(flatten)]
        kernel: KernelArgs,
    },
}

#[derive(Args)]
struct KernelArgs {
    /// Working directory for programs and shell escapes
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep the scratch workspace after exit
    #[arg(long)]
    keep_scratch: bool,

    /// Do not add missing crates to the manifest automatically
    #[arg(long)]
    no_autofetch: bool,

    /// Refuse input requests from programs and shell escapes
    #[arg(long)]
    no_input: bool,
}

impl From<KernelArgs> for KernelOptions {
    fn from(args: KernelArgs) -> Self {
        Self {
            work_dir: args.work_dir,
            keep_scratch: args.keep_scratch,
            no_autofetch: args.no_autofetch,
            no_input: args.no_input,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Helper to format orbit-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(orbit_err) = err.downcast_ref::<orbit_core::Error>() {
            anyhow::anyhow!("{}", orbit_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run { notebook, kernel } => {
            run::execute(&notebook, &kernel.into()).await.map_err(format_error)?;
        }
        Commands::Repl { kernel } => {
            repl::execute(&kernel.into()).await.map_err(format_error)?;
        }
    }

    Ok(())
}
