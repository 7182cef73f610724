use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use pair_engine::{DEFAULT_MAX_MESSAGE_CHARS, EngineConfig};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 8080
//
//   env var:         DUET_SERVER__PORT=8080   (double underscore = nesting)
//
//   (single underscore stays within field names: DUET_CHAT__MAX_MESSAGE_CHARS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of frontend assets served at `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Chat tunables (lives under `[chat]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            mailbox_capacity: default_mailbox_capacity(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}
fn default_max_message_chars() -> usize {
    DEFAULT_MAX_MESSAGE_CHARS
}
fn default_mailbox_capacity() -> usize {
    100
}
fn default_command_buffer() -> usize {
    256
}

/// Build a figment that layers: defaults → config.toml → DUET_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `DUET_SERVER__PORT=8080`  →  `server.port = 8080`
///   `DUET_CHAT__MAX_MESSAGE_CHARS=500`  →  `chat.max_message_chars = 500`
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed("DUET_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig + CLI overrides)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub chat: ChatConfig,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Longest accepted chat message, in characters
    pub max_message_chars: usize,
    /// Outbound notification queue per connection
    pub mailbox_capacity: usize,
    /// Pairing engine command inbox capacity
    pub command_buffer: usize,
}

impl ChatConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_message_chars: self.max_message_chars,
            command_buffer: self.command_buffer,
        }
    }
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let bind_addr = format!("{}:{}", fc.server.host, fc.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    fc.server.host, fc.server.port
                )
            })?;

        Ok(Self {
            bind_addr,
            static_dir: fc.server.static_dir.clone(),
            chat: ChatConfig {
                max_message_chars: fc.chat.max_message_chars,
                mailbox_capacity: fc.chat.mailbox_capacity.max(1),
                command_buffer: fc.chat.command_buffer.max(1),
            },
        })
    }
}

/// Resolve the directory holding `config.toml` (defaults to ~/.duet).
pub fn config_dir(custom_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match custom_dir {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("Could not find home directory")?
            .join(".duet"),
    };
    info!("Config directory: {}", dir.display());
    Ok(dir)
}
