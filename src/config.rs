use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{MobiClawError, MobiClawResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml. `MOBICLAW_<ID>_API_KEY` overrides it.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps oracle roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Text oracle: turns an instruction into a JSON action plan.
    pub planner: Option<RoleEntry>,
    /// Vision oracle: locates the target element on a screenshot.
    pub vision: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Minimum learning confidence for a stored correction to replace the vision oracle.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Explicit wait applied to every element lookup.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub learning_enabled: bool,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    /// Upper bound on one instruction's processing time; checked between actions.
    #[serde(default)]
    pub instruction_timeout_secs: Option<u64>,
    /// Let high-confidence successful locators skip the vision oracle too.
    #[serde(default)]
    pub reuse_successful_locators: bool,
    #[serde(default = "default_true")]
    pub journal_enabled: bool,
}

impl AutomationConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn instruction_timeout(&self) -> Option<Duration> {
        self.instruction_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            wait_timeout_secs: default_wait_timeout_secs(),
            learning_enabled: true,
            screenshot_dir: default_screenshot_dir(),
            instruction_timeout_secs: None,
            reuse_successful_locators: false,
            journal_enabled: true,
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_screenshot_dir() -> PathBuf {
    data_dir().join("screenshots")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_platform_name")]
    pub platform_name: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_automation_name")]
    pub automation_name: String,
    #[serde(default)]
    pub app_package: Option<String>,
    #[serde(default)]
    pub app_activity: Option<String>,
    #[serde(default = "default_new_command_timeout")]
    pub new_command_timeout_secs: u64,
    /// Interval between element lookups while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            platform_name: default_platform_name(),
            device_name: default_device_name(),
            automation_name: default_automation_name(),
            app_package: None,
            app_activity: None,
            new_command_timeout_secs: default_new_command_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:4723".into()
}

fn default_platform_name() -> String {
    "Android".into()
}

fn default_device_name() -> String {
    "Android Device".into()
}

fn default_automation_name() -> String {
    "UiAutomator2".into()
}

fn default_new_command_timeout() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// `<local data dir>/mobiclaw`, or the working directory when the platform has none.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mobiclaw"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn resolve_config_path() -> MobiClawResult<PathBuf> {
    if let Ok(path) = std::env::var("MOBICLAW_CONFIG") {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config path taken from MOBICLAW_CONFIG");
            return Ok(candidate);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(MobiClawError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> MobiClawResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if !(0.0..=1.0).contains(&config.automation.confidence_threshold) {
        return Err(MobiClawError::Config(format!(
            "confidence_threshold must be within [0, 1], got {}",
            config.automation.confidence_threshold
        )));
    }
    Ok(config)
}

pub fn load_config() -> MobiClawResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.automation.confidence_threshold, 0.7);
        assert_eq!(cfg.automation.wait_timeout(), Duration::from_secs(10));
        assert!(cfg.automation.learning_enabled);
        assert!(!cfg.automation.reuse_successful_locators);
        assert_eq!(cfg.driver.server_url, "http://localhost:4723");
    }

    #[test]
    fn roles_and_overrides_are_read() {
        let cfg = parse_config(
            r#"
            [llm]
            active_provider = "gemini"

            [llm.providers.gemini]
            display_name = "Gemini"
            api_base = "https://example.invalid/v1/chat/completions"
            model = "gemini-pro"

            [llm.roles.vision]
            provider = "gemini"
            model = "gemini-pro-vision"
            temperature = 0.0

            [automation]
            confidence_threshold = 0.8
            wait_timeout_secs = 3
            learning_enabled = false
            screenshot_dir = "/tmp/shots"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.providers["gemini"].temperature, 0.1);
        let vision = cfg.llm.roles.vision.unwrap();
        assert_eq!(vision.model, "gemini-pro-vision");
        assert!(!vision.stream);
        assert!(cfg.llm.roles.planner.is_none());
        assert_eq!(cfg.automation.confidence_threshold, 0.8);
        assert!(!cfg.automation.learning_enabled);
        assert_eq!(cfg.automation.screenshot_dir, PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = parse_config("[automation]\nconfidence_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, MobiClawError::Config(_)));
    }
}
