//! Recommendation command handler

use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_recommend(config: Config, refresh: bool, limit: u64) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    if refresh {
        let outcome = state.recommendations.refresh().await?;
        println!(
            "Refreshed {} recommendations from {}",
            outcome.count, outcome.source
        );
        println!();
    }

    let items = state.recommendations.list(limit.max(1)).await?;
    if items.is_empty() {
        println!("No recommendations yet.");
        println!();
        println!("Run: mediahub recommend --refresh");
        return Ok(());
    }

    for (i, item) in items.iter().enumerate() {
        let year = item.year.map(|y| format!(" ({y})")).unwrap_or_default();
        println!("{}. {}{} [{}]", i + 1, item.title, year, item.media_type);
        if let Some(reason) = &item.reason {
            println!("   {reason}");
        }
    }

    Ok(())
}
