//! Client command handlers

use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_clients_list(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;
    let clients = state.client_service.list().await?;

    if clients.is_empty() {
        println!("No clients configured.");
        return Ok(());
    }

    println!("Clients ({} total)", clients.len());
    println!("{:-<70}", "");

    for client in clients {
        let status = if client.enabled { "enabled" } else { "disabled" };
        println!("{} [{}] {}", client.name, client.kind, status);
        println!(
            "  ID: {} | URL: {} | Last sync: {}",
            client.id,
            client.base_url,
            client.last_synced_at.as_deref().unwrap_or("never")
        );
    }

    Ok(())
}

pub async fn cmd_client_test(config: Config, id: i32) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    match state.client_service.test_connection(id).await {
        Ok(info) => {
            println!("✓ Connected to {}", info.name);
            if let Some(version) = info.version {
                println!("  Version: {version}");
            }
            if let Some(server_id) = info.id {
                println!("  Server ID: {server_id}");
            }
        }
        Err(e) => {
            println!("✗ Connection failed: {e}");
        }
    }

    Ok(())
}
