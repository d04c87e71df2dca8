use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ActionOutcome, ActionResultKind, AppState, ClientEvent, ClientSnapshot,
    QueueClient, ToastKind, ViewSlice,
};
use shared::domain::{EntryId, QueueId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "queue-operator", about = "Operator console for a queue engine")]
struct Cli {
    /// Overrides the configured engine URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file, `operator.toml` in the working directory by default.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the full view snapshot as JSON after the command.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every queue on the engine.
    Queues,
    /// Create a queue and select it.
    Create { name: String },
    /// Select an existing queue.
    Select { queue_id: i64, name: String },
    /// Forget the selected queue.
    Forget,
    Status,
    Join {
        user_name: String,
        #[arg(long)]
        dry_run: bool,
    },
    Serve {
        #[arg(long)]
        dry_run: bool,
    },
    Skip {
        #[arg(long)]
        dry_run: bool,
    },
    SkipEntry { entry_id: i64 },
    TogglePause,
    Summary,
    Preview,
    Events {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Follow the selected queue, printing every status refresh.
    Watch {
        #[arg(long, default_value_t = 3)]
        ticks: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref());
    if let Some(url) = cli.server_url {
        settings.server_url = url;
    }
    if let Command::Events { limit: Some(limit) } = &cli.command {
        settings.events_limit = *limit;
    }
    info!(server_url = %settings.server_url, "queue operator starting");
    let client = QueueClient::from_settings(&settings).context("failed to build client")?;

    let outcome = run(&client, cli.command).await;
    let snapshot = client.snapshot().await;
    print_feedback(&snapshot);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    outcome
}

async fn run(client: &Arc<QueueClient>, command: Command) -> Result<()> {
    match command {
        Command::Queues => {
            for queue in client.list_queues().await? {
                println!(
                    "#{:<4} {:<24} {:<6} waiting {:>3} / total {:>3}",
                    queue.id,
                    queue.name,
                    if queue.status.is_paused() { "PAUSED" } else { "ACTIVE" },
                    queue.waiting_count,
                    queue.total_count
                );
            }
        }
        Command::Create { name } => {
            let created = client.create_queue(&name).await?;
            println!("created queue #{} {}", created.id, created.name);
        }
        Command::Select { queue_id, name } => {
            client.select_queue(QueueId(queue_id), &name).await?;
            client.refresh_all().await?;
            print_status(&client.snapshot().await.state);
        }
        Command::Forget => {
            client.deselect().await;
            println!("no queue selected");
        }
        Command::Status => {
            ensure_selected(client).await?;
            print_status(&client.snapshot().await.state);
        }
        Command::Join { user_name, dry_run } => {
            ensure_selected(client).await?;
            let outcome = client.join(&user_name, dry_run).await?;
            if let ActionOutcome::Live { data, .. } = &outcome {
                println!("{} is #{} in line", data.user_name, data.position);
            }
        }
        Command::Serve { dry_run } => {
            ensure_selected(client).await?;
            client.serve_next(dry_run).await?;
        }
        Command::Skip { dry_run } => {
            ensure_selected(client).await?;
            client.skip_next(dry_run).await?;
        }
        Command::SkipEntry { entry_id } => {
            ensure_selected(client).await?;
            client.skip_entry(EntryId(entry_id)).await?;
        }
        Command::TogglePause => {
            ensure_selected(client).await?;
            client.toggle_pause().await?;
        }
        Command::Summary => {
            ensure_selected(client).await?;
            print_summary(&client.snapshot().await.state);
        }
        Command::Preview => {
            ensure_selected(client).await?;
            match client.preview().await? {
                Some(preview) => {
                    println!("skip target:        {}", preview.skip_target);
                    println!("next if served:     {}", preview.next_if_served);
                    println!("next if skipped:    {}", preview.next_if_skipped);
                    println!("projected change:   {}", preview.projected_wait_change);
                    println!("waiting:            {}", preview.waiting_count);
                }
                None => println!("nothing to preview"),
            }
        }
        Command::Events { .. } => {
            ensure_selected(client).await?;
            for event in &client.snapshot().await.state.events {
                println!(
                    "{:<20} {:<10} {:<8} {} [{}]",
                    event.created_at.as_deref().unwrap_or("-"),
                    event.action,
                    event.result,
                    event.detail,
                    event.request_id
                );
            }
        }
        Command::Watch { ticks } => watch(client, ticks).await?,
    }
    Ok(())
}

/// Restores the bookmarked queue and loads its read views.
async fn ensure_selected(client: &Arc<QueueClient>) -> Result<()> {
    if client.restore_selection().await?.is_none() {
        bail!("no queue selected; run `select <id> <name>` or `create <name>` first");
    }
    client.refresh_all().await?;
    Ok(())
}

async fn watch(client: &Arc<QueueClient>, ticks: u32) -> Result<()> {
    let mut events = client.subscribe_events();
    if client.restore_selection().await?.is_none() {
        bail!("no queue selected; run `select <id> <name>` or `create <name>` first");
    }

    let mut seen = 0;
    while seen < ticks {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::ViewUpdated(ViewSlice::Status)) => {
                    seen += 1;
                    print_status(&client.snapshot().await.state);
                }
                Ok(ClientEvent::Toast(toast)) if toast.kind == ToastKind::Error => {
                    eprintln!("! {}", toast.message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    client.stop_polling().await;
    Ok(())
}

fn print_status(state: &AppState) {
    let Some(status) = &state.status else {
        println!("status unavailable");
        return;
    };
    println!(
        "{} (#{}) {}",
        status.queue_name,
        status.queue_id,
        if state.is_paused { "PAUSED" } else { "ACTIVE" }
    );
    for entry in &status.entries {
        let place = if entry.status.is_terminal() {
            "-".to_string()
        } else {
            entry.position.to_string()
        };
        let wait = status
            .wait_explanations
            .get(&entry.id.to_string())
            .map(|text| format!("  ({text})"))
            .unwrap_or_default();
        println!(
            "  {place:>3}  [{:>4}] {:<24} {}{wait}",
            entry.id, entry.user_name, entry.status
        );
    }
    if !status.explanation.is_empty() {
        println!("  {}", status.explanation);
    }
    print_summary(state);
}

fn print_summary(state: &AppState) {
    if let Some(summary) = &state.summary {
        println!(
            "waiting {} | served {} | skipped {} | est. wait {}",
            summary.waiting_count,
            summary.served_count,
            summary.skipped_count,
            if summary.estimated_wait.is_empty() {
                "-"
            } else {
                summary.estimated_wait.as_str()
            }
        );
    }
}

fn print_feedback(snapshot: &ClientSnapshot) {
    if let Some(toast) = &snapshot.toast {
        match toast.kind {
            ToastKind::Success => println!("{}", toast.message),
            ToastKind::Error => eprintln!("error: {}", toast.message),
        }
    }
    if let Some(result) = &snapshot.action_result {
        let label = match result.kind {
            ActionResultKind::Success => "success",
            ActionResultKind::Blocked => "blocked",
            ActionResultKind::DryRun => "dry run",
        };
        println!("[{label}] {}", result.message);
        if let Some(rule_code) = &result.rule_code {
            println!("  rule:    {rule_code}");
        }
        if let Some(reason) = &result.reason {
            println!("  reason:  {reason}");
        }
        println!("  request: {}", result.request_id);
    }
    println!(
        "request {} | api {}",
        snapshot.state.last_request_id.as_deref().unwrap_or("unknown"),
        snapshot.state.api_version.as_deref().unwrap_or("unknown")
    );
}
