//! Chat orchestration — turns one user message into one assistant reply
//! while keeping the conversation store and the analytics log consistent.
//!
//! The orchestrator owns no state of its own: it resolves the conversation,
//! appends the user turn, calls the model collaborator (holding no store
//! lock across that await), appends the reply, and emits an interaction
//! event. If generation fails, the user message stays recorded and nothing
//! else is written; the caller sees a distinguishable upstream error.

use std::sync::Arc;

use serde::Deserialize;

use crate::analytics::{AnalyticsEngine, Interaction, TopicClassifier};
use crate::conversation::{ConversationStore, Role};
use crate::error::{Error, Result};
use crate::model::{Citation, ModelProvider};

/// Fixed persona and safety preamble sent with every generation call.
pub const SYSTEM_PROMPT: &str = "\
You are a sleep science explainer, an assistant specialized in explaining \
sleep-related research, medical guidelines, and health information in \
simple, accessible terms.

Your expertise covers sleep cycles and circadian rhythms, sleep disorders \
(insomnia, sleep apnea, and others), sleep hygiene, sleep research, sleep \
medicine, and the relationship between sleep and overall health.

Guidelines:
1. Provide evidence-based information from reputable sources.
2. Explain complex medical concepts in layperson-friendly language.
3. Be accurate and never make medical diagnoses.
4. Encourage users to consult healthcare professionals for medical advice.
5. Cite sources when referencing specific research or guidelines.
6. Be empathetic and supportive.

When discussing research papers, summarize key findings clearly, explain \
their significance, and note limitations. You are an educational tool, not \
a replacement for professional medical advice.";

/// An inbound chat exchange request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    /// Free-form caller context, carried onto the interaction as metadata.
    pub context: Option<serde_json::Value>,
}

/// The completed exchange returned to the caller.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub sources: Vec<Citation>,
    pub confidence: f64,
}

pub struct ChatOrchestrator {
    conversations: Arc<dyn ConversationStore>,
    analytics: Arc<dyn AnalyticsEngine>,
    provider: Arc<dyn ModelProvider>,
    classifier: Arc<dyn TopicClassifier>,
    history_window: usize,
    default_confidence: f64,
    analytics_enabled: bool,
}

impl ChatOrchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        analytics: Arc<dyn AnalyticsEngine>,
        provider: Arc<dyn ModelProvider>,
        classifier: Arc<dyn TopicClassifier>,
        history_window: usize,
        default_confidence: f64,
        analytics_enabled: bool,
    ) -> Self {
        Self {
            conversations,
            analytics,
            provider,
            classifier,
            history_window,
            default_confidence,
            analytics_enabled,
        }
    }

    /// Run one full exchange. See the module docs for the failure contract.
    pub async fn handle_message(&self, request: ChatRequest) -> Result<ChatReply> {
        if request.message.trim().is_empty() {
            return Err(Error::validation("message must not be empty"));
        }

        let conversation_id = self
            .conversations
            .create_or_get(request.conversation_id.as_deref(), request.user_id.as_deref())
            .await?;

        tracing::info!(
            conversation_id = %conversation_id,
            user_id = request.user_id.as_deref().unwrap_or("-"),
            message_len = request.message.chars().count(),
            "handling chat message"
        );

        self.conversations
            .append_message(&conversation_id, Role::User, &request.message)
            .await?;

        let window = self
            .conversations
            .recent_messages(&conversation_id, self.history_window)
            .await?;

        // The long-latency step. No store lock is held here: every store
        // call above has already returned.
        let reply = match self.provider.generate(SYSTEM_PROMPT, &window).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    provider = self.provider.name(),
                    error = %e,
                    "model generation failed"
                );
                return Err(Error::upstream("failed to generate response, please try again"));
            }
        };

        self.conversations
            .append_message(&conversation_id, Role::Assistant, &reply.text)
            .await?;

        if self.analytics_enabled {
            if let Some(user_id) = &request.user_id {
                let mut interaction = Interaction::new(
                    Some(user_id.clone()),
                    conversation_id.clone(),
                    request.message.clone(),
                    reply.text.clone(),
                    self.classifier.classify(&request.message),
                );
                interaction.metadata = request.context.clone();

                // The exchange is already committed; an analytics failure
                // undercounts but must not fail the reply.
                if let Err(e) = self.analytics.record(interaction).await {
                    tracing::error!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "failed to record interaction"
                    );
                }
            }
        }

        Ok(ChatReply {
            response: reply.text,
            conversation_id,
            sources: reply.sources,
            confidence: reply.confidence.unwrap_or(self.default_confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{FixedTopic, MemoryAnalytics};
    use crate::conversation::{Message, MemoryConversationStore};
    use crate::model::{ModelError, ModelReply};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that plays back a queue of canned outcomes.
    struct ScriptedModel {
        outcomes: Mutex<VecDeque<std::result::Result<ModelReply, ModelError>>>,
    }

    impl ScriptedModel {
        fn replying(texts: &[&str]) -> Self {
            Self {
                outcomes: Mutex::new(
                    texts
                        .iter()
                        .map(|t| {
                            Ok(ModelReply {
                                text: t.to_string(),
                                sources: Vec::new(),
                                confidence: None,
                            })
                        })
                        .collect(),
                ),
            }
        }

        fn failing(error: ModelError) -> Self {
            Self {
                outcomes: Mutex::new(VecDeque::from([Err(error)])),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedModel {
        async fn generate(
            &self,
            _system: &str,
            _history: &[Message],
        ) -> std::result::Result<ModelReply, ModelError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Fixture {
        conversations: Arc<MemoryConversationStore>,
        analytics: Arc<MemoryAnalytics>,
        orchestrator: ChatOrchestrator,
    }

    fn fixture(provider: ScriptedModel) -> Fixture {
        let conversations = Arc::new(MemoryConversationStore::new(false));
        let analytics = Arc::new(MemoryAnalytics::new());
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&conversations) as Arc<dyn ConversationStore>,
            Arc::clone(&analytics) as Arc<dyn AnalyticsEngine>,
            Arc::new(provider),
            Arc::new(FixedTopic("sleep_science".into())),
            10,
            0.8,
            true,
        );
        Fixture {
            conversations,
            analytics,
            orchestrator,
        }
    }

    fn request(message: &str, conversation_id: Option<&str>, user_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            user_id: user_id.map(str::to_string),
            context: None,
        }
    }

    #[tokio::test]
    async fn first_message_mints_id_and_follow_up_reuses_it() {
        let fx = fixture(ScriptedModel::replying(&[
            "REM sleep is the dreaming stage.",
            "Most adults need 7 to 9 hours.",
        ]));

        let first = fx
            .orchestrator
            .handle_message(request("What is REM sleep?", None, Some("u1")))
            .await
            .unwrap();
        assert!(!first.conversation_id.is_empty());
        assert_eq!(first.response, "REM sleep is the dreaming stage.");

        let second = fx
            .orchestrator
            .handle_message(request(
                "How much sleep do I need?",
                Some(&first.conversation_id),
                Some("u1"),
            ))
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);

        let history = fx.conversations.history(&first.conversation_id).await.unwrap();
        let roles: Vec<Role> = history.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn generation_failure_keeps_user_message_and_records_nothing_else() {
        let fx = fixture(ScriptedModel::failing(ModelError::RateLimited(
            "quota".into(),
        )));

        let err = fx
            .orchestrator
            .handle_message(request("hello", Some("c1"), Some("u1")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));

        // The user turn survives the failed exchange
        let history = fx.conversations.history("c1").await.unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].role, Role::User);

        // No interaction was logged
        assert!(fx.analytics.user_report("u1").await.is_err());
        let overview = fx.analytics.overview(30).await.unwrap();
        assert_eq!(overview.total_interactions, 0);
    }

    #[tokio::test]
    async fn interaction_carries_topic_lengths_and_metadata() {
        let fx = fixture(ScriptedModel::replying(&["Answer."]));

        let mut req = request("Is melatonin safe?", None, Some("u7"));
        req.context = Some(serde_json::json!({"locale": "en-GB"}));
        let reply = fx.orchestrator.handle_message(req).await.unwrap();

        let report = fx.analytics.user_report("u7").await.unwrap();
        assert_eq!(report.total_interactions, 1);
        assert_eq!(report.topics, ["sleep_science"]);

        let conv_report = fx
            .analytics
            .conversation_report(&reply.conversation_id)
            .await
            .unwrap();
        assert_eq!(conv_report.avg_message_length, 18.0); // "Is melatonin safe?"
        assert_eq!(conv_report.avg_response_length, 7.0); // "Answer."
    }

    #[tokio::test]
    async fn anonymous_exchanges_skip_the_interaction_log() {
        let fx = fixture(ScriptedModel::replying(&["Answer."]));

        fx.orchestrator
            .handle_message(request("hello there", None, None))
            .await
            .unwrap();

        let overview = fx.analytics.overview(30).await.unwrap();
        assert_eq!(overview.total_interactions, 0);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_mutation() {
        let fx = fixture(ScriptedModel::replying(&["never used"]));

        let err = fx
            .orchestrator
            .handle_message(request("   ", Some("c9"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Validation happens before conversation creation
        assert!(fx.conversations.history("c9").await.is_err());
    }

    #[tokio::test]
    async fn missing_confidence_falls_back_to_default() {
        let fx = fixture(ScriptedModel::replying(&["Answer."]));
        let reply = fx
            .orchestrator
            .handle_message(request("hi", None, None))
            .await
            .unwrap();
        assert!((reply.confidence - 0.8).abs() < f64::EPSILON);
    }
}
