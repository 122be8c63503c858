use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{load_settings, telemetry::TelemetryView, TeleopClient};
use tokio::{
    fs::File,
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::broadcast,
    time,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{info, warn};

mod console;

use console::ConsoleCommand;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; `teleop.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    /// Read console commands from this file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
        settings.validate()?;
    }

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path)
                .await
                .with_context(|| format!("failed to open script {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut lines = LinesStream::new(input.lines());

    let client = TeleopClient::start(&settings)?;
    let mut events = client.subscribe_events();
    let mut view = TelemetryView::new(settings.initial_mode);

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => match console::parse_line(&line) {
                    Ok(Some(ConsoleCommand::Action(action))) => client.send(action).await?,
                    Ok(Some(ConsoleCommand::Wait(pause))) => time::sleep(pause).await,
                    Ok(Some(ConsoleCommand::Status)) => println!("{}", console::render(&view)),
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(None) => {}
                    Err(err) => eprintln!("error: {err:#}"),
                },
                Some(Err(err)) => return Err(err).context("failed to read console input"),
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    view.apply(&event);
                    if let Some(line) = console::describe(&event, &view) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console fell behind, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    let session = client.shutdown().await?;
    info!(session = %session.id(), "teleop session ended");
    Ok(())
}
