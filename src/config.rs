use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::clients::ClientKind;
use crate::models::MediaType;

/// Placeholder returned instead of secrets by the config and client APIs.
pub const MASKED_SECRET: &str = "********";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub scheduler: SchedulerConfig,

    pub sync: SyncConfig,

    pub tmdb: TmdbConfig,

    pub claude: ClaudeConfig,

    pub recommendations: RecommendationsConfig,

    pub observability: ObservabilityConfig,

    /// Media servers seeded into the database at startup, matched by name.
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Timeout applied to every outbound HTTP request.
    pub request_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/mediahub.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Key expected in `X-Api-Key` or `Authorization: Bearer`.
    /// Empty disables authentication.
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8686,
            cors_allowed_origins: vec![
                "http://localhost:8686".to_string(),
                "http://127.0.0.1:8686".to_string(),
            ],
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub sync_interval_minutes: u32,

    pub cron_expression: Option<String>,

    /// Recommendation refresh interval in hours. 0 disables the refresh.
    pub recommendation_refresh_hours: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval_minutes: 60,
            cron_expression: None,
            recommendation_refresh_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Media types fetched from each client during a media sync.
    pub media_types: Vec<MediaType>,

    /// Page size for paged vendor endpoints.
    pub page_size: u32,

    /// Minimum title similarity for a fuzzy match, in `(0, 1]`.
    pub fuzzy_threshold: f64,

    /// Maximum year difference still considered the same item.
    pub year_tolerance: i32,

    /// Pause between two clients of the same run.
    pub client_delay_seconds: u64,

    pub enrich_with_tmdb: bool,

    /// Upper bound of items looked up on TMDB per run.
    pub enrich_limit: usize,

    /// Delete repository items no client reports anymore.
    pub delete_orphans: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            media_types: vec![
                MediaType::Movie,
                MediaType::Series,
                MediaType::Episode,
                MediaType::Artist,
                MediaType::Album,
                MediaType::Track,
                MediaType::Playlist,
                MediaType::Collection,
            ],
            page_size: 200,
            fuzzy_threshold: 0.85,
            year_tolerance: 1,
            client_delay_seconds: 0,
            enrich_with_tmdb: false,
            enrich_limit: 50,
            delete_orphans: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub enabled: bool,

    /// v3 API key or v4 read access token.
    pub api_key: String,

    pub language: String,

    pub base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            language: "en-US".to_string(),
            base_url: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub enabled: bool,

    pub api_key: String,

    pub model: String,

    pub base_url: String,

    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationsConfig {
    /// Number of recommendations kept after a refresh.
    pub count: usize,

    /// Library titles included in the Claude prompt.
    pub library_sample: usize,

    /// Library titles used as TMDB recommendation seeds.
    pub seed_count: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            count: 20,
            library_sample: 50,
            seed_count: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "mediahub".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEntry {
    pub name: String,

    pub kind: ClientKind,

    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Emby/Jellyfin user to browse as. Resolved from `/Users` when absent.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_paths()
            .into_iter()
            .find(|p| p.exists())
            .unwrap_or_else(Self::default_config_path);
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mediahub").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".mediahub").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// Writes a default config with a fresh API key unless one already exists.
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let mut config = Self::default();
            config.server.api_key = generate_api_key();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.enabled
            && self.scheduler.sync_interval_minutes == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Scheduler interval must be > 0 or cron expression must be set");
        }

        if self.tmdb.enabled && self.tmdb.api_key.trim().is_empty() {
            anyhow::bail!("TMDB API key cannot be empty when enabled");
        }

        if self.claude.enabled && self.claude.api_key.trim().is_empty() {
            anyhow::bail!("Claude API key cannot be empty when enabled");
        }

        if !(self.sync.fuzzy_threshold > 0.0 && self.sync.fuzzy_threshold <= 1.0) {
            anyhow::bail!(
                "sync.fuzzy_threshold must be in (0, 1], got {}",
                self.sync.fuzzy_threshold
            );
        }

        if self.sync.page_size == 0 {
            anyhow::bail!("sync.page_size must be > 0");
        }

        let mut names = HashSet::new();
        for client in &self.clients {
            if client.name.trim().is_empty() {
                anyhow::bail!("Client name cannot be empty");
            }
            if client.url.trim().is_empty() {
                anyhow::bail!("Client '{}' has an empty url", client.name);
            }
            if !names.insert(client.name.to_lowercase()) {
                anyhow::bail!("Duplicate client name '{}'", client.name);
            }
        }

        Ok(())
    }

    /// Copy of the config with every secret replaced by [`MASKED_SECRET`].
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        mask(&mut config.server.api_key);
        mask(&mut config.tmdb.api_key);
        mask(&mut config.claude.api_key);
        for client in &mut config.clients {
            mask_opt(&mut client.api_key);
            mask_opt(&mut client.password);
        }
        config
    }

    /// Puts back secrets that came in masked, so a round-tripped
    /// [`Config::redacted`] value never overwrites a real key.
    pub fn restore_secrets(&mut self, current: &Self) {
        restore(&mut self.server.api_key, &current.server.api_key);
        restore(&mut self.tmdb.api_key, &current.tmdb.api_key);
        restore(&mut self.claude.api_key, &current.claude.api_key);

        for client in &mut self.clients {
            let existing = current.clients.iter().find(|c| c.name == client.name);
            restore_opt(
                &mut client.api_key,
                existing.and_then(|c| c.api_key.as_ref()),
            );
            restore_opt(
                &mut client.password,
                existing.and_then(|c| c.password.as_ref()),
            );
        }
    }
}

fn mask(value: &mut String) {
    if !value.is_empty() {
        *value = MASKED_SECRET.to_string();
    }
}

fn mask_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        mask(v);
    }
}

fn restore(value: &mut String, current: &str) {
    if value == MASKED_SECRET {
        *value = current.to_string();
    }
}

fn restore_opt(value: &mut Option<String>, current: Option<&String>) {
    if value.as_deref() == Some(MASKED_SECRET) {
        *value = current.cloned();
    }
}

/// 32 random bytes, hex encoded.
#[must_use]
pub fn generate_api_key() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}
