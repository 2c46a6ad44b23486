//! Black-box oracles consumed by the planner and the resolver. Replies are untrusted
//! free text; callers extract and validate whatever structure they need.
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::MobiClawResult;
use crate::llm::provider::LlmProvider;
use crate::llm::registry::{OracleRole, ProviderRegistry};
use crate::llm::types::{CallConfig, ChatMessage, ContentPart, ImageUrl};

/// Text in, text out.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> MobiClawResult<String>;
}

/// Image plus directive in, text out.
#[async_trait]
pub trait VisionOracle: Send + Sync {
    async fn analyze(&self, system: &str, prompt: &str, image_png: &[u8]) -> MobiClawResult<String>;
}

/// Both oracle kinds backed by a chat-completion provider.
pub struct ProviderOracle {
    provider: Arc<dyn LlmProvider>,
    cfg: CallConfig,
}

impl ProviderOracle {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: CallConfig) -> Self {
        Self { provider, cfg }
    }

    pub fn for_role(registry: &ProviderRegistry, role: OracleRole) -> MobiClawResult<Self> {
        let (provider, cfg) = registry.call_config_for_role(role)?;
        Ok(Self::new(provider, cfg))
    }
}

#[async_trait]
impl TextOracle for ProviderOracle {
    async fn complete(&self, system: &str, user: &str) -> MobiClawResult<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self.provider.chat(messages, &self.cfg).await?;
        Ok(response.content)
    }
}

#[async_trait]
impl VisionOracle for ProviderOracle {
    async fn analyze(&self, system: &str, prompt: &str, image_png: &[u8]) -> MobiClawResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_png);
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user_parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{encoded}"),
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ]),
        ];
        let response = self.provider.chat(messages, &self.cfg).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{LlmResponse, MessageContent};
    use tokio::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl LlmProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> MobiClawResult<LlmResponse> {
            *self.seen.lock().await = messages;
            Ok(LlmResponse {
                content: "ok".into(),
                reasoning: String::new(),
            })
        }
    }

    fn cfg() -> CallConfig {
        CallConfig {
            model: "m".into(),
            stream: false,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn vision_request_carries_data_uri() {
        let provider = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let oracle = ProviderOracle::new(provider.clone(), cfg());
        let reply = oracle.analyze("sys", "find it", &[1, 2, 3]).await.unwrap();
        assert_eq!(reply, "ok");

        let seen = provider.seen.lock().await;
        assert_eq!(seen.len(), 2);
        let MessageContent::Parts(parts) = &seen[1].content else {
            panic!("expected multipart user message");
        };
        match &parts[0] {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/png;base64,AQID");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_request_is_system_then_user() {
        let provider = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let oracle = ProviderOracle::new(provider.clone(), cfg());
        oracle.complete("directive", "Open settings").await.unwrap();
        let seen = provider.seen.lock().await;
        assert_eq!(seen[0].role, "system");
        assert_eq!(seen[1].role, "user");
    }
}
