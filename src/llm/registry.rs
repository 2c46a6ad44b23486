use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{MobiClawError, MobiClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Oracle roles the pipeline calls models for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleRole {
    Planner,
    Vision,
}

impl OracleRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleRole::Planner => "planner",
            OracleRole::Vision => "vision",
        }
    }
}

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    /// Kept for role-to-model lookups (does not need to be mutable after init).
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn with_config(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            active: llm_config.active_provider.clone(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> MobiClawResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            MobiClawError::Config(format!("Active provider '{}' not found in registry", self.active))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Return the provider and call configuration for an oracle role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature, non-streaming
    pub fn call_config_for_role(
        &self,
        role: OracleRole,
    ) -> MobiClawResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            OracleRole::Planner => self.llm_config.roles.planner.as_ref(),
            OracleRole::Vision => self.llm_config.roles.vision.as_ref(),
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                MobiClawError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role.as_str(),
                    entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = role.as_str(),
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                },
            ));
        }

        let provider = self.get_active()?;
        let (model, temperature) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = role.as_str(),
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((provider, CallConfig { model, stream: false, temperature }))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `MOBICLAW_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::with_config(config.llm.clone());
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("MOBICLAW_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            let provider = OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key);
            registry.register(Arc::new(provider));
        }
        registry
    }
}
