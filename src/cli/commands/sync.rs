//! Sync command handlers

use std::sync::Arc;

use crate::config::Config;
use crate::services::Scheduler;
use crate::state::SharedState;

pub async fn cmd_sync(config: Config, client: Option<i32>) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    if state.store.count_clients().await? == 0 {
        println!("No clients configured.");
        println!();
        println!("Add a [[clients]] entry to config.toml or POST /api/clients.");
        return Ok(());
    }

    let stats = state.media_sync.run(client).await?;

    println!("Media sync finished");
    println!("{:-<50}", "");
    println!("  Clients:   {}", stats.clients);
    println!("  Units:     {} ({} failed)", stats.units, stats.failed_units);
    println!("  Fetched:   {}", stats.fetched);
    println!("  Created:   {}", stats.created);
    println!("  Updated:   {}", stats.updated);
    println!("  Unchanged: {}", stats.unchanged);
    if stats.failed > 0 {
        println!("  Failed:    {}", stats.failed);
    }
    if stats.enriched > 0 {
        println!("  Enriched:  {}", stats.enriched);
    }
    if stats.orphans_deleted > 0 {
        println!("  Orphans deleted: {}", stats.orphans_deleted);
    }

    Ok(())
}

pub async fn cmd_list_sync(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;
    let syncs = state.store.list_enabled_list_syncs().await?;

    if syncs.is_empty() {
        println!("No enabled list syncs.");
        return Ok(());
    }

    let summary = state.list_sync.run_all().await?;
    println!(
        "List sync finished: {} synced, {} failed",
        summary.synced, summary.failed
    );

    Ok(())
}

pub async fn cmd_run_once(config: Config) -> anyhow::Result<()> {
    let scheduler_config = config.scheduler.clone();
    let state = Arc::new(SharedState::new(config).await?);
    let scheduler = Scheduler::new(state, scheduler_config);

    scheduler.run_once().await?;

    println!("Run complete");
    Ok(())
}
