use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;

/// Settings loaded from ~/.config/code-companion/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Chat completion endpoint used by analyze, execute and chat
    pub chat_endpoint: String,
    /// Third-party syntax highlighting service
    pub highlight_url: String,
    pub highlight_host: String,
    pub rapid_api_key: Option<String>,
    /// Port for `serve`
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_endpoint: format!(
                "http://127.0.0.1:{DEFAULT_PORT}/integrations/chat-gpt/conversationgpt4"
            ),
            highlight_url: "https://judge0-ce.p.rapidapi.com/highlight".to_string(),
            highlight_host: "judge0-ce.p.rapidapi.com".to_string(),
            rapid_api_key: None,
            port: DEFAULT_PORT,
        }
    }
}

/// Directory holding settings and saved state
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home.join(".config").join("code-companion");
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Path of the key-value state file (statistics)
pub fn state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("state.json"))
}

impl Settings {
    /// Load settings from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let settings_path = config_dir()?.join("settings.json");
        let settings = if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|err| {
                tracing::warn!(
                    "Failed to read settings from {}: {err}",
                    settings_path.display()
                );
                err
            })?;
            Self::from_json(&contents)?
        } else {
            Self::default()
        };
        Ok(settings.with_env_overrides())
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(contents)?;

        // Allow ${VAR} references for secrets
        if let Some(api_key) = &mut settings.rapid_api_key {
            if let Some(resolved) = substitute_env_vars(api_key) {
                *api_key = resolved;
            }
        }
        if let Some(resolved) = substitute_env_vars(&settings.chat_endpoint) {
            settings.chat_endpoint = resolved;
        }
        Ok(settings)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("CODE_COMPANION_CHAT_ENDPOINT") {
            self.chat_endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("RAPID_API_KEY") {
            self.rapid_api_key = Some(api_key);
        }
        self
    }
}

/// Expand `${VAR}` references. Inserted values are not expanded again.
/// Returns `None` when nothing was substituted or a variable is unset.
fn substitute_env_vars(input: &str) -> Option<String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let len = rest[start + 2..].find('}')?;
        let name = &rest[start + 2..start + 2 + len];
        output.push_str(&rest[..start]);
        output.push_str(&std::env::var(name).ok()?);
        rest = &rest[start + 2 + len + 1..];
    }

    if rest.len() == input.len() {
        return None;
    }
    output.push_str(rest);
    Some(output)
}
