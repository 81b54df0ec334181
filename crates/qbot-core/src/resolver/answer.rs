use super::{GenerationResult, RemoteGenerator, ReplySink, ReplySource, ReplyStyle, Resolution, SinkError};
use crate::knowledge::KnowledgeSource;
use crate::shared::{IncomingMessage, MessageContext};
use std::sync::Arc;

/// Decides between a canned answer and a generation call, and runs the per-message reply sequence.
///
/// Holds only shared read-only state, so one instance serves every concurrent message task.
pub struct AnswerResolver {
    knowledge: Arc<dyn KnowledgeSource>,
    generator: Arc<dyn RemoteGenerator>,
    style: ReplyStyle,
}

impl AnswerResolver {
    pub fn new(knowledge: Arc<dyn KnowledgeSource>, generator: Arc<dyn RemoteGenerator>) -> Self {
        Self::with_style(knowledge, generator, ReplyStyle::default())
    }

    pub fn with_style(
        knowledge: Arc<dyn KnowledgeSource>,
        generator: Arc<dyn RemoteGenerator>,
        style: ReplyStyle,
    ) -> Self {
        Self {
            knowledge,
            generator,
            style,
        }
    }

    pub fn knowledge(&self) -> &dyn KnowledgeSource {
        self.knowledge.as_ref()
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Canned answer for the first matching trigger, or `Delegate`.
    pub fn resolve(&self, message: &IncomingMessage) -> Resolution {
        match self.knowledge.query(&message.text) {
            Some(answer) => Resolution::Immediate(answer),
            None => Resolution::Delegate,
        }
    }

    /// Full reply sequence for one message.
    ///
    /// One reply on a knowledge hit. On a miss, the acknowledgment goes out first and the
    /// generator's text second; the generator is called exactly once. If the acknowledgment
    /// cannot be sent the generator is skipped.
    pub async fn handle(
        &self,
        ctx: &MessageContext,
        message: &IncomingMessage,
        sink: &dyn ReplySink,
    ) -> Result<ReplySource, SinkError> {
        match self.resolve(message) {
            Resolution::Immediate(answer) => {
                tracing::debug!(correlation_id = %ctx.correlation_id, "answered from knowledge table");
                sink.send(&format!("{}{}", self.style.answer_prefix, answer)).await?;
                Ok(ReplySource::Knowledge)
            }
            Resolution::Delegate => {
                sink.send(&self.style.thinking_message).await?;
                let result = self.generator.generate(&message.text).await;
                match &result {
                    GenerationResult::Success(_) => tracing::debug!(
                        correlation_id = %ctx.correlation_id,
                        generator = self.generator.name(),
                        "generation succeeded"
                    ),
                    GenerationResult::Failure(diagnostic) => tracing::warn!(
                        correlation_id = %ctx.correlation_id,
                        generator = self.generator.name(),
                        diagnostic = %diagnostic,
                        "generation failed"
                    ),
                }
                sink.send(result.text()).await?;
                Ok(ReplySource::Generator)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeTable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingGenerator {
        calls: AtomicUsize,
        reply: GenerationResult,
    }

    impl CountingGenerator {
        fn new(reply: GenerationResult) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RemoteGenerator for CountingGenerator {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(&self, _prompt: &str) -> GenerationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), SinkError> {
            if self.fail {
                return Err("chat unavailable".into());
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn resolver(table: KnowledgeTable, generator: Arc<CountingGenerator>) -> AnswerResolver {
        AnswerResolver::new(Arc::new(table), generator)
    }

    #[test]
    fn resolve_returns_canned_answer_case_insensitively() {
        let generator = CountingGenerator::new(GenerationResult::Success("unused".into()));
        let resolver = resolver(KnowledgeTable::from_pairs([("hello", "hi there!")]), Arc::clone(&generator));
        assert_eq!(
            resolver.resolve(&IncomingMessage::new("Hello, how are you?")),
            Resolution::Immediate("hi there!".to_string())
        );
        assert_eq!(resolver.resolve(&IncomingMessage::new("goodbye")), Resolution::Delegate);
    }

    #[test]
    fn empty_table_always_delegates() {
        let generator = CountingGenerator::new(GenerationResult::Success("unused".into()));
        let resolver = resolver(KnowledgeTable::empty(), generator);
        for text in ["", "hello", "what is 2+2?"] {
            assert_eq!(resolver.resolve(&IncomingMessage::new(text)), Resolution::Delegate);
        }
    }

    #[tokio::test]
    async fn knowledge_hit_sends_one_reply_without_generating() {
        let generator = CountingGenerator::new(GenerationResult::Success("unused".into()));
        let resolver = resolver(KnowledgeTable::from_pairs([("hello", "hi there!")]), Arc::clone(&generator));
        let sink = RecordingSink::default();

        let source = resolver
            .handle(&MessageContext::new(None), &IncomingMessage::new("HELLO bot"), &sink)
            .await
            .unwrap();

        assert_eq!(source, ReplySource::Knowledge);
        assert_eq!(sink.sent(), vec!["🤖 hi there!".to_string()]);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn miss_acknowledges_then_relays_generation() {
        let generator = CountingGenerator::new(GenerationResult::Success("4".into()));
        let resolver = resolver(KnowledgeTable::empty(), Arc::clone(&generator));
        let sink = RecordingSink::default();

        let source = resolver
            .handle(&MessageContext::new(None), &IncomingMessage::new("what is 2+2?"), &sink)
            .await
            .unwrap();

        assert_eq!(source, ReplySource::Generator);
        assert_eq!(sink.sent(), vec!["🧠 Thinking...".to_string(), "4".to_string()]);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn failure_diagnostic_is_relayed_as_text() {
        let generator = CountingGenerator::new(GenerationResult::Failure(
            "⚠️ exception during communication: timed out after 15s".into(),
        ));
        let resolver = AnswerResolver::with_style(
            Arc::new(KnowledgeTable::empty()),
            generator.clone(),
            ReplyStyle {
                answer_prefix: String::new(),
                thinking_message: "one moment".to_string(),
            },
        );
        let sink = RecordingSink::default();

        resolver
            .handle(&MessageContext::new(Some(7)), &IncomingMessage::new("anything"), &sink)
            .await
            .unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], "one moment");
        assert!(sent[1].contains("timed out"));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn failed_acknowledgment_skips_generation() {
        let generator = CountingGenerator::new(GenerationResult::Success("unused".into()));
        let resolver = resolver(KnowledgeTable::empty(), Arc::clone(&generator));
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let err = resolver
            .handle(&MessageContext::new(None), &IncomingMessage::new("hi"), &sink)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "chat unavailable");
        assert_eq!(generator.calls(), 0);
    }
}
