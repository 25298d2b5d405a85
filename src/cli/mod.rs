//! CLI module - Command-line interface for mediahub
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// mediahub - one library over Emby, Jellyfin, Plex and Subsonic
#[derive(Parser)]
#[command(name = "mediahub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server and the scheduler
    #[command(alias = "d")]
    Daemon,

    /// Run one media sync now
    Sync {
        /// Only sync the client with this ID
        #[arg(long)]
        client: Option<i32>,
    },

    /// Run every enabled list sync now
    ListSync,

    /// Media sync, list sync and recommendations, once
    #[command(alias = "once")]
    Run,

    /// Manage media server clients
    Clients {
        #[command(subcommand)]
        command: Option<ClientCommands>,
    },

    /// Show stored recommendations
    Recommend {
        /// Rebuild the recommendations first
        #[arg(long)]
        refresh: bool,

        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: u64,
    },

    /// Create default config file
    Init,
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// List configured clients
    #[command(alias = "ls")]
    List,

    /// Check that a client can reach its server
    Test {
        /// Client ID
        id: i32,
    },
}

pub use commands::*;
