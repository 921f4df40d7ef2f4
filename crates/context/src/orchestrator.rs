//! Reasoning Orchestrator - Runs the three query modes end to end
//!
//! Each mode assembles context from documents the relational store still
//! knows about, reads the history of its own channel, calls a reasoning
//! backend and records the exchange. History is appended only after the
//! backend has answered, so a failed query leaves no trace.

use crate::analysis::ParsedAnalysis;
use crate::assembler::{Breadth, ContextAssembler};
use crate::citations::cited_sources;
use crate::prompts::{self, QueryCharacter, ResearchPrompt, NO_CONTEXT_PLACEHOLDER};
use papermind_common::errors::{AppError, Result};
use papermind_common::metrics::{self, QueryMetrics};
use papermind_common::models::{AnalysisSnapshot, Channel, NewMessage, Project};
use papermind_common::{Backends, ConversationLog, ReasoningBackend, RelationalStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Prefix marking research turns in the stored history
pub const RESEARCH_TURN_PREFIX: &str = "[Deep Research]";

/// Answer to a chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    /// Context documents the answer cites
    pub sources: Vec<String>,
}

/// Deep research output
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub report: String,
}

#[derive(Clone)]
pub struct ReasoningOrchestrator {
    store: Arc<dyn RelationalStore>,
    assembler: ContextAssembler,
    conversations: ConversationLog,
    backends: Backends,
    history_limit: u64,
}

impl ReasoningOrchestrator {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        assembler: ContextAssembler,
        backends: Backends,
        history_limit: u64,
    ) -> Self {
        Self {
            conversations: ConversationLog::new(store.clone()),
            store,
            assembler,
            backends,
            history_limit,
        }
    }

    /// Answer `query` from the project's documents, optionally restricted
    /// to `document_ids`. An empty subset means every live document.
    #[instrument(skip(self, query, document_ids), fields(subset = document_ids.len()))]
    pub async fn chat(&self, project_id: i64, query: &str, document_ids: &[i64]) -> Result<ChatAnswer> {
        let tracker = QueryMetrics::start("chat");
        let result = self.run_chat(project_id, query, document_ids).await;
        tracker.finish(result.is_ok());
        result
    }

    /// Gap analysis across the project; the stored snapshot is replaced
    #[instrument(skip(self))]
    pub async fn analyze(&self, project_id: i64) -> Result<AnalysisSnapshot> {
        let tracker = QueryMetrics::start("analyze");
        let result = self.run_analyze(project_id).await;
        tracker.finish(result.is_ok());
        result
    }

    /// Structured research report, or a mentor-style reply for small talk
    #[instrument(skip(self, query))]
    pub async fn research(&self, project_id: i64, query: &str) -> Result<ResearchReport> {
        let tracker = QueryMetrics::start("research");
        let result = self.run_research(project_id, query).await;
        tracker.finish(result.is_ok());
        result
    }

    async fn run_chat(&self, project_id: i64, query: &str, document_ids: &[i64]) -> Result<ChatAnswer> {
        self.project(project_id).await?;

        let mut permitted = self.store.live_document_ids(project_id).await?;
        let breadth = if document_ids.is_empty() {
            Breadth::Narrow
        } else {
            let subset: HashSet<i64> = document_ids.iter().copied().collect();
            permitted.retain(|id| subset.contains(id));
            Breadth::Wide
        };

        let context = self
            .assembler
            .assemble(project_id, query, &permitted, breadth)
            .await;
        let history = self
            .conversations
            .history(project_id, Channel::Chat, self.history_limit)
            .await?;

        let prompt = prompts::chat_prompt(query, &context.text, &ConversationLog::render(&history));
        let answer = self.generate(&self.backends.chat, "chat", &prompt).await?;
        let sources = cited_sources(&answer, &context.sources());

        self.conversations
            .record_exchange(
                NewMessage::user(project_id, Channel::Chat, query),
                NewMessage::assistant(project_id, Channel::Chat, answer.as_str()),
            )
            .await?;

        info!(
            project_id,
            context_chunks = context.chunks.len(),
            sources = sources.len(),
            "Chat answered"
        );
        Ok(ChatAnswer { answer, sources })
    }

    async fn run_analyze(&self, project_id: i64) -> Result<AnalysisSnapshot> {
        self.project(project_id).await?;

        let permitted = self.store.live_document_ids(project_id).await?;
        let context = self.assembler.assemble_probes(project_id, &permitted).await;
        if context.is_empty() {
            return Err(AppError::InsufficientContext { project_id });
        }

        let raw = self
            .generate(
                &self.backends.research,
                "analyze",
                &prompts::analysis_prompt(&context.text),
            )
            .await?;

        let parsed = ParsedAnalysis::parse(&raw);
        if parsed.is_degraded() {
            metrics::record_analysis_degraded();
        }

        let snapshot = self
            .store
            .upsert_analysis(project_id, &parsed.into_report())
            .await?;

        info!(project_id, context_chunks = context.chunks.len(), "Analysis stored");
        Ok(snapshot)
    }

    async fn run_research(&self, project_id: i64, query: &str) -> Result<ResearchReport> {
        let project = self.project(project_id).await?;

        let permitted = self.store.live_document_ids(project_id).await?;
        let context = self
            .assembler
            .assemble_research(project_id, query, &permitted)
            .await;
        let context_text = if context.is_empty() {
            NO_CONTEXT_PLACEHOLDER
        } else {
            context.text.as_str()
        };

        let history = self
            .conversations
            .history(project_id, Channel::Research, self.history_limit)
            .await?;

        let character = QueryCharacter::classify(query);
        let prompt = ResearchPrompt {
            query,
            context: context_text,
            history: &ConversationLog::render(&history),
            project_title: &project.title,
            project_description: project.description.as_deref(),
            character,
        }
        .render();

        let report = self
            .generate(&self.backends.research, "research", &prompt)
            .await?;

        self.conversations
            .record_exchange(
                NewMessage::user(
                    project_id,
                    Channel::Research,
                    format!("{} {}", RESEARCH_TURN_PREFIX, query),
                ),
                NewMessage::assistant(project_id, Channel::Research, report.as_str()),
            )
            .await?;

        info!(
            project_id,
            context_chunks = context.chunks.len(),
            ?character,
            "Research report generated"
        );
        Ok(ResearchReport { report })
    }

    async fn project(&self, project_id: i64) -> Result<Project> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or(AppError::ProjectNotFound { id: project_id })
    }

    async fn generate(
        &self,
        backend: &Arc<dyn ReasoningBackend>,
        mode: &'static str,
        prompt: &str,
    ) -> Result<String> {
        match backend.generate(prompt).await {
            Ok(response) => Ok(response.into_text()),
            Err(e) => {
                warn!(mode, model = backend.model_name(), error = %e, "Generation failed");
                metrics::record_generation_failure(mode);
                Err(AppError::Generation {
                    mode: mode.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::REFUSAL;
    use papermind_common::config::RetrievalConfig;
    use papermind_common::embeddings::HashEmbedder;
    use papermind_common::llm::{ContentBlock, ScriptedBackend};
    use papermind_common::models::{Chunk, ConversationMessage, Role};
    use papermind_common::vector::InMemoryVectorIndex;
    use papermind_common::{MemoryStore, ModelResponse, VectorIndex, VectorIndexGateway};

    struct Fixture {
        orchestrator: ReasoningOrchestrator,
        store: Arc<MemoryStore>,
        gateway: VectorIndexGateway,
        chat: Arc<ScriptedBackend>,
        research: Arc<ScriptedBackend>,
        project_id: i64,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let project = store
                .create_project("Robust Vision".into(), Some("Distribution shift in image models".into()))
                .await
                .unwrap();

            let index = Arc::new(InMemoryVectorIndex::new());
            index.init().await.unwrap();
            let gateway = VectorIndexGateway::new(index, Arc::new(HashEmbedder::new(256)));

            let chat = Arc::new(ScriptedBackend::new(REFUSAL));
            let research = Arc::new(ScriptedBackend::new("report"));
            let backends = Backends {
                chat: chat.clone(),
                research: research.clone(),
            };

            let assembler = ContextAssembler::new(gateway.clone(), RetrievalConfig::default());
            let orchestrator = ReasoningOrchestrator::new(store.clone(), assembler, backends, 10);

            Self {
                orchestrator,
                store,
                gateway,
                chat,
                research,
                project_id: project.id,
            }
        }

        async fn add_document(&self, filename: &str, texts: &[&str]) -> i64 {
            let document = self
                .store
                .create_document(self.project_id, filename, 1024)
                .await
                .unwrap();
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, text)| Chunk {
                    text: text.to_string(),
                    page: i as u32 + 1,
                    source: filename.to_string(),
                })
                .collect();
            self.gateway
                .write(self.project_id, document.id, &chunks)
                .await
                .unwrap();
            document.id
        }
    }

    #[tokio::test]
    async fn test_chat_without_documents_refuses() {
        let f = Fixture::new().await;

        let answer = f
            .orchestrator
            .chat(f.project_id, "What datasets are used?", &[])
            .await
            .unwrap();

        assert_eq!(answer.answer, REFUSAL);
        assert!(answer.sources.is_empty());
        let prompt = f.chat.last_prompt().unwrap();
        assert!(prompt.contains("Context:\n\n\nQuestion:"));

        let history = f
            .orchestrator
            .conversations
            .history(f.project_id, Channel::Chat, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, REFUSAL);
    }

    #[tokio::test]
    async fn test_chat_cites_context_sources() {
        let f = Fixture::new().await;
        f.add_document("vit.pdf", &["vision transformers split images into patches"])
            .await;
        f.chat.push_text(
            "Images are split into patches [Source: vit.pdf, Page: 1] [Source: made-up.pdf, Page: 2].",
        );

        let answer = f
            .orchestrator
            .chat(f.project_id, "how do vision transformers handle images", &[])
            .await
            .unwrap();

        assert_eq!(answer.sources, vec!["vit.pdf"]);
        let prompt = f.chat.last_prompt().unwrap();
        assert!(prompt.contains("[Document: vit.pdf | Page: 1]\nvision transformers split images into patches"));
    }

    #[tokio::test]
    async fn test_chat_block_response_is_flattened() {
        let f = Fixture::new().await;
        f.chat.push(ModelResponse::Blocks(vec![
            ContentBlock::Text { text: "first ".into() },
            ContentBlock::Text { text: "second".into() },
        ]));

        let answer = f.orchestrator.chat(f.project_id, "q", &[]).await.unwrap();
        assert_eq!(answer.answer, "first second");
    }

    #[tokio::test]
    async fn test_chat_subset_restricts_context() {
        let f = Fixture::new().await;
        f.add_document("a.pdf", &["robustness benchmarks for image models"]).await;
        let b = f.add_document("b.pdf", &["robustness training for image models"]).await;

        f.orchestrator
            .chat(f.project_id, "robustness image models", &[b, 9999])
            .await
            .unwrap();

        let prompt = f.chat.last_prompt().unwrap();
        assert!(prompt.contains("robustness training"));
        assert!(!prompt.contains("robustness benchmarks"));
    }

    #[tokio::test]
    async fn test_deleted_document_leaves_context() {
        let f = Fixture::new().await;
        let stale = f.add_document("stale.pdf", &["contrastive pretraining objective"]).await;
        f.add_document("live.pdf", &["contrastive pretraining at scale"]).await;
        f.store.delete_document(f.project_id, stale).await.unwrap();

        f.orchestrator
            .chat(f.project_id, "contrastive pretraining", &[])
            .await
            .unwrap();

        let prompt = f.chat.last_prompt().unwrap();
        assert!(prompt.contains("live.pdf"));
        assert!(!prompt.contains("stale.pdf"));
    }

    #[tokio::test]
    async fn test_generation_failure_writes_nothing() {
        let f = Fixture::new().await;
        f.chat.push_failure("backend down");

        let err = f.orchestrator.chat(f.project_id, "q", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));

        let history = f
            .orchestrator
            .conversations
            .history(f.project_id, Channel::Chat, 10)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    /// Delegates to a memory store but cannot commit an exchange
    struct ExchangeRejectingStore(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl RelationalStore for ExchangeRejectingStore {
        async fn find_project(&self, project_id: i64) -> Result<Option<Project>> {
            self.0.find_project(project_id).await
        }

        async fn list_projects(&self, offset: u64, limit: u64) -> Result<Vec<Project>> {
            self.0.list_projects(offset, limit).await
        }

        async fn create_project(
            &self,
            title: String,
            description: Option<String>,
        ) -> Result<Project> {
            self.0.create_project(title, description).await
        }

        async fn live_document_ids(&self, project_id: i64) -> Result<HashSet<i64>> {
            self.0.live_document_ids(project_id).await
        }

        async fn create_document(
            &self,
            project_id: i64,
            filename: &str,
            file_size: i64,
        ) -> Result<papermind_common::models::Document> {
            self.0.create_document(project_id, filename, file_size).await
        }

        async fn set_document_indexed(&self, document_id: i64, indexed: bool) -> Result<()> {
            self.0.set_document_indexed(document_id, indexed).await
        }

        async fn list_documents(
            &self,
            project_id: i64,
        ) -> Result<Vec<papermind_common::models::Document>> {
            self.0.list_documents(project_id).await
        }

        async fn delete_document(&self, project_id: i64, document_id: i64) -> Result<bool> {
            self.0.delete_document(project_id, document_id).await
        }

        async fn append_message(&self, message: NewMessage) -> Result<ConversationMessage> {
            self.0.append_message(message).await
        }

        async fn append_exchange(
            &self,
            _user: NewMessage,
            _assistant: NewMessage,
        ) -> Result<(ConversationMessage, ConversationMessage)> {
            Err(AppError::Store {
                message: "insert into chat_messages failed".into(),
            })
        }

        async fn recent_messages(
            &self,
            project_id: i64,
            channel: Channel,
            limit: u64,
        ) -> Result<Vec<ConversationMessage>> {
            self.0.recent_messages(project_id, channel, limit).await
        }

        async fn upsert_analysis(
            &self,
            project_id: i64,
            report: &papermind_common::models::AnalysisReport,
        ) -> Result<AnalysisSnapshot> {
            self.0.upsert_analysis(project_id, report).await
        }

        async fn find_analysis(&self, project_id: i64) -> Result<Option<AnalysisSnapshot>> {
            self.0.find_analysis(project_id).await
        }

        async fn ping(&self) -> Result<()> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_no_orphan_turn() {
        let memory = Arc::new(MemoryStore::new());
        let project = memory.create_project("p".into(), None).await.unwrap();

        let index = Arc::new(InMemoryVectorIndex::new());
        index.init().await.unwrap();
        let gateway = VectorIndexGateway::new(index, Arc::new(HashEmbedder::new(256)));
        let backends = Backends {
            chat: Arc::new(ScriptedBackend::new("answer")),
            research: Arc::new(ScriptedBackend::new("report")),
        };
        let orchestrator = ReasoningOrchestrator::new(
            Arc::new(ExchangeRejectingStore(memory.clone())),
            ContextAssembler::new(gateway, RetrievalConfig::default()),
            backends,
            10,
        );

        let err = orchestrator.chat(project.id, "q", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Store { .. }));
        let err = orchestrator.research(project.id, "q").await.unwrap_err();
        assert!(matches!(err, AppError::Store { .. }));

        for channel in [Channel::Chat, Channel::Research] {
            let stored = memory.recent_messages(project.id, channel, 10).await.unwrap();
            assert!(stored.is_empty(), "{} kept {} messages", channel, stored.len());
        }
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let f = Fixture::new().await;
        let err = f.orchestrator.research(424242, "q").await.unwrap_err();
        assert!(matches!(err, AppError::ProjectNotFound { id: 424242 }));
        assert!(f.research.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_documents_is_insufficient() {
        let f = Fixture::new().await;

        let err = f.orchestrator.analyze(f.project_id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientContext { .. }));
        assert!(f.store.find_analysis(f.project_id).await.unwrap().is_none());
        assert!(f.research.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_stores_parsed_report() {
        let f = Fixture::new().await;
        f.add_document("p.pdf", &["limitations include small datasets", "future work covers video"])
            .await;
        f.research.push_text(
            r#"```json
{"research_gaps": ["video robustness"], "methodology_suggestions": [{"action": "evaluate on video", "reasoning": "untested", "citations": ["p.pdf"]}]}
```"#,
        );

        let snapshot = tokio_test::assert_ok!(f.orchestrator.analyze(f.project_id).await);
        assert_eq!(snapshot.report.research_gaps, vec!["video robustness"]);

        let stored = f.store.find_analysis(f.project_id).await.unwrap().unwrap();
        assert_eq!(stored.report, snapshot.report);
        assert!(f.research.last_prompt().unwrap().contains("\"methodology_suggestions\""));
    }

    #[tokio::test]
    async fn test_analyze_degrades_and_overwrites() {
        let f = Fixture::new().await;
        f.add_document("p.pdf", &["conclusion: the method generalises"]).await;

        f.research
            .push_text(r#"{"research_gaps": ["first"], "methodology_suggestions": []}"#);
        f.orchestrator.analyze(f.project_id).await.unwrap();

        f.research.push_text("Sorry, I cannot produce JSON today.");
        let snapshot = f.orchestrator.analyze(f.project_id).await.unwrap();

        assert_eq!(snapshot.report.research_gaps, vec!["Error generating gaps."]);
        assert_eq!(snapshot.report.common_approaches.len(), 1);
        let stored = f.store.find_analysis(f.project_id).await.unwrap().unwrap();
        assert_eq!(stored.report.research_gaps, vec!["Error generating gaps."]);
    }

    #[tokio::test]
    async fn test_research_without_context_uses_placeholder() {
        let f = Fixture::new().await;

        let report = f
            .orchestrator
            .research(f.project_id, "What are the open problems in test-time adaptation?")
            .await
            .unwrap();
        assert_eq!(report.report, "report");

        let prompt = f.research.last_prompt().unwrap();
        assert!(prompt.contains(NO_CONTEXT_PLACEHOLDER));
        assert!(prompt.contains("Robust Vision"));
        assert!(prompt.contains("Distribution shift in image models"));

        let history = f
            .orchestrator
            .conversations
            .history(f.project_id, Channel::Research, 10)
            .await
            .unwrap();
        assert_eq!(
            history[0].content,
            "[Deep Research] What are the open problems in test-time adaptation?"
        );
        assert_eq!(history[1].content, "report");
    }

    #[tokio::test]
    async fn test_channels_do_not_leak_into_prompts() {
        let f = Fixture::new().await;
        f.chat.push_text("chat-only answer");
        f.orchestrator
            .chat(f.project_id, "chat-only question", &[])
            .await
            .unwrap();

        f.orchestrator
            .research(f.project_id, "Survey the evaluation protocols across the project papers")
            .await
            .unwrap();
        let research_prompt = f.research.last_prompt().unwrap();
        assert!(!research_prompt.contains("chat-only"));

        f.orchestrator.chat(f.project_id, "again", &[]).await.unwrap();
        let chat_prompt = f.chat.last_prompt().unwrap();
        assert!(chat_prompt.contains("User: chat-only question"));
        assert!(!chat_prompt.contains("[Deep Research]"));
    }

    #[tokio::test]
    async fn test_research_greeting_is_conversational() {
        let f = Fixture::new().await;
        f.orchestrator.research(f.project_id, "Hello!").await.unwrap();

        let prompt = f.research.last_prompt().unwrap();
        assert!(prompt.contains("Do NOT write a report"));
    }
}
