mod cli;
mod commands;
mod terminal;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vista_chat::{ChatService, DispatchSettings, Dispatcher, LocalResponder};
use vista_compute::{AnomalyDetector, ScoringEngine};
use vista_core::{config, load_records, Config, MetricsRecord};
use vista_llm::BackendRegistry;

use crate::cli::{CliArgs, Command};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    config::load_dotenv();
    let args = CliArgs::parse();

    let mut config = match &args.profile {
        Some(p) => Config::for_profile(p),
        None => Config::from_env(),
    };
    if let Some(path) = &args.scoring {
        config.scoring.path = Some(path.clone());
    }
    config.log_summary();

    let scoring = config.scoring.load().context("failed to load scoring config")?;
    let engine = ScoringEngine::new(scoring);
    let mut stdout = io::stdout().lock();

    match args.command {
        Command::Score { data, branch, json } => {
            let records = read_data(&data.data)?;
            match branch {
                Some(key) => commands::branch_report(commands::find_branch(&records, &key)?, &engine, &mut stdout),
                None => commands::score(&records, &engine, json, &mut stdout),
            }
        }
        Command::Profile { data, branch } => {
            let records = read_data(&data.data)?;
            commands::profile(commands::find_branch(&records, &branch)?, &engine, &mut stdout)
        }
        Command::Anomalies { data, z, metrics, json } => {
            let records = read_data(&data.data)?;
            let detector = AnomalyDetector::new(z.unwrap_or(config.anomaly.z_threshold))
                .with_metrics(commands::parse_metrics(&metrics)?);
            commands::anomalies(&records, &detector, json, &mut stdout)
        }
        Command::Formula { rows } => commands::formula(rows, &engine, &mut stdout),
        Command::Export { data, out } => {
            let records = read_data(&data.data)?;
            commands::export(&records, &engine, &out)?;
            writeln!(stdout, "Wrote {}", out.display())?;
            Ok(())
        }
        Command::Chat { data, offline, transcript } => {
            drop(stdout);
            let records = read_data(&data.data)?;
            chat(records, engine, &config, offline, transcript).await
        }
        Command::Config => commands::show_config(&config, &mut stdout),
    }
}

fn read_data(path: &std::path::Path) -> Result<Vec<MetricsRecord>> {
    load_records(path).with_context(|| format!("failed to load branch data from {}", path.display()))
}

async fn chat(
    records: Vec<MetricsRecord>,
    engine: ScoringEngine,
    config: &Config,
    offline: bool,
    transcript: Option<PathBuf>,
) -> Result<()> {
    let terminal = Terminal;
    let branches = records.len();
    let local = LocalResponder::new(
        records,
        engine,
        AnomalyDetector::new(config.anomaly.z_threshold),
        config.chat.top_n,
    );
    let registry = if offline {
        Arc::new(BackendRegistry::with_handles(Vec::new()))
    } else {
        // A registry built for this profile wins over the env default.
        let _ = BackendRegistry::install_global(BackendRegistry::from_config(config.clone()));
        BackendRegistry::global()
    };
    let backends: Vec<String> = registry.handles().await.iter().map(|h| h.name.clone()).collect();

    let service = ChatService::new(Dispatcher::new(local, registry, DispatchSettings::from_config(config)));
    let session = service.create_session().await;
    terminal.print_banner(branches, &backends)?;

    while let Some(input) = terminal.read_input()? {
        if input.is_empty() {
            continue;
        }
        match service.ask(&session, &input).await {
            Ok(turn) => terminal.print_reply(&turn.reply, &turn.source, &turn.attempts)?,
            Err(e) => terminal.print_error(&e.to_string())?,
        }
    }

    if let Some(path) = transcript {
        let history = service.history(&session).await?;
        vista_chat::write_history(&history, &path)
            .with_context(|| format!("failed to write transcript {}", path.display()))?;
        terminal.print_info(&format!("Transcript saved: {}", path.display()))?;
    }
    info!(session = %session, "chat ended");
    terminal.print_info("Goodbye.")?;
    Ok(())
}
