// ABOUTME: Drafts perspectives with a language model, then hydrates and writes each one
// ABOUTME: Supports one batch request or one request per perspective; never retries

use std::path::PathBuf;
use std::sync::Arc;

use bloomgen_ai::{GenerationConfig, LLMProvider};
use bloomgen_core::{
    BloomError, ExampleCorpus, GenerationStrategy, Hydrator, LLMConfig, PerspectiveWriter, Result,
    SchemaSnapshot,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::extraction::extract_documents;
use crate::prompts::{build_batch_prompt, build_single_prompt, PromptPayload, PromptPolicy};

/// A document or request slot that produced no file
#[derive(Debug)]
pub struct GenerationFailure {
    /// Which document failed, e.g. "perspective 2" or its name
    pub slot: String,
    pub error: BloomError,
}

/// Outcome of one generator run
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub names: Vec<String>,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, slot: impl Into<String>, error: BloomError) {
        let slot = slot.into();
        warn!("{} failed: {}", slot, error);
        self.failures.push(GenerationFailure { slot, error });
    }
}

pub struct LlmPerspectiveGenerator {
    provider: Arc<dyn LLMProvider>,
    generation: GenerationConfig,
    policy: PromptPolicy,
    strategy: GenerationStrategy,
}

impl LlmPerspectiveGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, strategy: GenerationStrategy) -> Self {
        Self {
            provider,
            generation: GenerationConfig::default(),
            policy: PromptPolicy::default(),
            strategy,
        }
    }

    /// Sampling parameters taken from the `[llm]` configuration section
    pub fn with_llm_config(mut self, config: &LLMConfig) -> Self {
        self.generation.temperature = config.temperature;
        self.generation.max_tokens = config.max_tokens;
        self
    }

    pub fn with_policy(mut self, policy: PromptPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strategy(&self) -> GenerationStrategy {
        self.strategy
    }

    pub async fn generate(
        &self,
        schema: &SchemaSnapshot,
        corpus: &ExampleCorpus,
        writer: &mut PerspectiveWriter,
    ) -> Result<GenerationReport> {
        let hydrator =
            Hydrator::new().with_known_relationship_types(schema.relationship_type_names());

        info!(
            "Generating perspectives with {} ({}) using the {} strategy",
            self.provider.provider_name(),
            self.provider.model_name(),
            self.strategy
        );

        match self.strategy {
            GenerationStrategy::Batch => self.generate_batch(schema, corpus, &hydrator, writer).await,
            GenerationStrategy::PerPerspective => {
                self.generate_each(schema, corpus, &hydrator, writer).await
            }
        }
    }

    async fn generate_batch(
        &self,
        schema: &SchemaSnapshot,
        corpus: &ExampleCorpus,
        hydrator: &Hydrator,
        writer: &mut PerspectiveWriter,
    ) -> Result<GenerationReport> {
        let prompt = build_batch_prompt(schema, corpus, &self.policy)?;
        let documents = extract_documents(&self.complete(&prompt).await?)?;
        info!("Model returned {} perspective(s)", documents.len());

        let mut report = GenerationReport::default();
        for (idx, document) in documents.into_iter().enumerate() {
            let slot = format!("perspective {}", idx + 1);
            Self::finish_document(&slot, document, hydrator, writer, &mut report)?;
        }
        Ok(report)
    }

    async fn generate_each(
        &self,
        schema: &SchemaSnapshot,
        corpus: &ExampleCorpus,
        hydrator: &Hydrator,
        writer: &mut PerspectiveWriter,
    ) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();
        let count = self.policy.max_perspectives;

        for idx in 0..count {
            let slot = format!("perspective {}", idx + 1);
            info!("Requesting {} of {}", slot, count);

            let prompt = build_single_prompt(schema, corpus, &self.policy, &report.names)?;
            let documents = match self.complete(&prompt).await {
                Ok(text) => extract_documents(&text),
                Err(e) => Err(e),
            };

            match documents {
                Ok(documents) if documents.is_empty() => report.fail(
                    slot,
                    BloomError::Generation("the model returned an empty array".to_string()),
                ),
                Ok(documents) => {
                    if documents.len() > 1 {
                        warn!("{} returned {} documents, keeping all", slot, documents.len());
                    }
                    for document in documents {
                        Self::finish_document(&slot, document, hydrator, writer, &mut report)?;
                    }
                }
                Err(e) => report.fail(slot, e),
            }
        }
        Ok(report)
    }

    async fn complete(&self, prompt: &PromptPayload) -> Result<String> {
        debug!(
            "Prompt sizes: system {} chars, user {} chars",
            prompt.system.len(),
            prompt.user.len()
        );
        let response = self
            .provider
            .generate_chat(&prompt.messages(), &self.generation)
            .await
            .map_err(|e| BloomError::Generation(format!("{:#}", e)))?;

        debug!(
            "Response: {} chars, {:?} tokens, finish reason {:?}",
            response.content.len(),
            response.total_tokens,
            response.finish_reason
        );
        Ok(response.content)
    }

    /// Hydrate and write one document. Per-document problems are recorded in the
    /// report; file system errors abort the run.
    fn finish_document(
        slot: &str,
        document: Value,
        hydrator: &Hydrator,
        writer: &mut PerspectiveWriter,
        report: &mut GenerationReport,
    ) -> Result<()> {
        if !document.is_object() {
            report.fail(
                slot,
                BloomError::Generation(format!("{} is not a JSON object", slot)),
            );
            return Ok(());
        }

        let perspective = match hydrator.hydrate(document) {
            Ok(perspective) => perspective,
            Err(e) => {
                report.fail(slot, e);
                return Ok(());
            }
        };

        let path = writer.write(&perspective)?;
        report.names.push(perspective.name);
        report.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bloomgen_ai::{LLMResponse, LLMResult, Message};
    use bloomgen_core::{ExampleDocument, RelationshipPattern};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate_chat(
            &self,
            messages: &[Message],
            _config: &GenerationConfig,
        ) -> LLMResult<LLMResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push(messages.last().map(|m| m.content.clone()).unwrap_or_default());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("503 Service Unavailable"))?;
            Ok(LLMResponse {
                content,
                total_tokens: None,
                prompt_tokens: None,
                completion_tokens: None,
                finish_reason: Some("stop".to_string()),
                model: "scripted".to_string(),
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn schema() -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::default();
        schema.labels.insert("Customer".to_string(), vec![]);
        schema.labels.insert("Order".to_string(), vec![]);
        schema
            .relationships
            .push(RelationshipPattern::new("Customer", "PLACED", "Order"));
        schema.relationship_types.insert("HAS_REVIEW".to_string());
        schema
    }

    fn corpus() -> ExampleCorpus {
        ExampleCorpus::from_documents(vec![ExampleDocument {
            name: "example.json".to_string(),
            content: "{\"name\": \"Example\"}".to_string(),
        }])
    }

    const ORDERS: &str = r#"{"name": "Orders", "labels": {"Customer": [], "Order": []},
        "relationshipTypes": [{"name": "PLACED", "start": "Customer", "end": "Order"}]}"#;

    #[tokio::test]
    async fn test_batch_hides_unused_schema_relationships() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PerspectiveWriter::new(dir.path());
        let provider = ScriptedProvider::new(&[&format!("[{ORDERS}]")]);

        let report = LlmPerspectiveGenerator::new(provider, GenerationStrategy::Batch)
            .generate(&schema(), &corpus(), &mut writer)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.written.len(), 1);
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&report.written[0]).unwrap()).unwrap();
        assert_eq!(written["hiddenRelationshipTypes"], serde_json::json!(["HAS_REVIEW"]));
    }

    #[tokio::test]
    async fn test_per_perspective_passes_existing_names_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PerspectiveWriter::new(dir.path());
        let provider = ScriptedProvider::new(&[ORDERS, "not json at all"]);

        let report = LlmPerspectiveGenerator::new(provider.clone(), GenerationStrategy::PerPerspective)
            .with_policy(PromptPolicy::default().exactly(3))
            .generate(&schema(), &corpus(), &mut writer)
            .await
            .unwrap();

        assert_eq!(report.names, vec!["Orders"]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0].error, BloomError::Generation(_)));
        assert_eq!(report.failures[1].slot, "perspective 3");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains("ALREADY GENERATED"));
        assert!(prompts[1].contains("- Orders"));
    }

    #[tokio::test]
    async fn test_provider_error_in_batch_is_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PerspectiveWriter::new(dir.path().join("out"));
        let provider = ScriptedProvider::new(&[]);

        let err = LlmPerspectiveGenerator::new(provider, GenerationStrategy::Batch)
            .generate(&schema(), &corpus(), &mut writer)
            .await
            .unwrap_err();

        assert!(matches!(err, BloomError::Generation(ref m) if m.contains("503")));
        assert!(!dir.path().join("out").exists());
    }
}
