//! `medscribe` command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medscribe::config::MedscribeConfig;
use medscribe::coordinator::{ConsultationSession, Coordinator};
use medscribe::observability::init_tracing;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "medscribe")]
#[command(about = "Transcribe consultation recordings and generate clinical documents")]
#[command(version)]
struct Cli {
    /// Configuration file, layered over config/default and config/local
    #[arg(long, short, env = "MEDSCRIBE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, overriding logging.level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive conversation on stdin
    Chat,
    /// Process one recording and print the outcome
    Process {
        /// Filename in the upload folder, or a local path with --import
        filename: String,

        /// Copy the file into the upload folder first
        #[arg(long)]
        import: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config =
        MedscribeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging);

    let coordinator = Coordinator::from_config(&config).context("Failed to set up the model client")?;
    info!(
        upload_dir = %config.storage.upload_dir.display(),
        processing_dir = %config.storage.processing_dir.display(),
        "Medscribe ready"
    );

    match cli.command {
        Command::Chat => chat(&coordinator).await,
        Command::Process {
            filename,
            import,
            json,
        } => process(&coordinator, &filename, import, json).await,
    }
}

async fn chat(coordinator: &Coordinator) -> Result<()> {
    let mut session = ConsultationSession::new();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Medscribe. Name a recording to process, ask questions, or type 'exit'.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if !message.is_empty() {
            let reply = coordinator.handle_turn(&mut session, message).await;
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn process(coordinator: &Coordinator, filename: &str, import: bool, json: bool) -> Result<()> {
    let filename = if import {
        let source = coordinator
            .catalog()
            .layer()
            .import_audio(Path::new(filename))
            .await
            .with_context(|| format!("Failed to import {filename}"))?;
        info!(path = %source.path.display(), "Imported recording");
        source.filename
    } else {
        filename.to_string()
    };

    let mut session = ConsultationSession::new();
    let reply = coordinator.process(&mut session, &filename).await;
    println!("{reply}");

    let Some(report) = session.last_report else {
        bail!("No report was produced for {filename}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_dict())?);
    }
    if report.intake_failure().is_some() {
        bail!("Processing {filename} failed");
    }
    Ok(())
}
