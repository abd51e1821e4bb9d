use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timefix_core::gateway::{
    Collaborators, ConsolePrompt, DirMover, ExiftoolGateway, FiletimeWriter, FsRenamer,
    SystemPreview,
};
use timefix_core::{Config, Mode};

#[derive(Parser)]
#[command(name = "timefix", version, about = "Reconcile media file timestamps between metadata tags and filename prefixes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Use embedded metadata as the reference timestamp source
    Exif {
        /// Rename files with a canonical timestamp prefix
        #[arg(short, long)]
        rename: bool,

        /// Offer secondary tags interactively when principal tags are empty
        #[arg(short, long)]
        secondary: bool,

        /// Target directory
        dir: PathBuf,
    },
    /// Use filename patterns as the reference timestamp source
    Filename {
        /// Also write the reconciled timestamp back into metadata tags
        #[arg(short = 'x', long)]
        write_exif: bool,

        /// Target directory
        dir: PathBuf,
    },
    /// Cross-check filename prefixes against metadata and quarantine mismatches
    Validate {
        /// Target directory
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let config = Config::default();
    let metadata = ExiftoolGateway::new(config.call_timeout);
    match metadata.version() {
        Ok(version) => tracing::debug!(version, "exiftool available"),
        Err(e) => anyhow::bail!("exiftool is required but not usable: {e}"),
    }

    let attrs = FiletimeWriter;
    let prompt = ConsolePrompt::new();
    let renamer = FsRenamer;
    let mover = DirMover;
    let preview = SystemPreview;
    let ext = Collaborators {
        metadata: &metadata,
        attrs: &attrs,
        prompt: &prompt,
        renamer: &renamer,
        mover: &mover,
        preview: &preview,
    };

    let (mode, dir) = match cli.command {
        Command::Exif { rename, secondary, dir } => (
            Mode::ExifReference { rename, treat_secondary: secondary },
            dir,
        ),
        Command::Filename { write_exif, dir } => {
            (Mode::FilenameReference { treat_exif: write_exif }, dir)
        }
        Command::Validate { dir } => (Mode::ValidateOnly, dir),
    };

    let summary = timefix_core::run(mode, &dir, &config, &ext)?;

    eprintln!(
        "Done! {} files, {} resolved, {} written, {} renamed, {} skipped, {} quarantined, {} failures ({:.2}s)",
        summary.files_seen,
        summary.resolved,
        summary.written,
        summary.renamed,
        summary.skipped,
        summary.quarantined,
        summary.failures,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
