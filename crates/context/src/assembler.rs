//! Context Assembler - Turns similarity hits into prompt-ready context
//!
//! Provides:
//! - Breadth-dependent candidate counts
//! - Multi-probe retrieval for gap analysis
//! - Re-filtering against the live document set
//! - Deduplication and provenance-tagged rendering

use futures::future::join_all;
use papermind_common::config::RetrievalConfig;
use papermind_common::models::RetrievedChunk;
use papermind_common::{metrics, VectorIndexGateway};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Probe queries whose union feeds the gap analysis
pub const ANALYSIS_PROBES: [&str; 4] = ["limitations", "future work", "conclusion", "methodology"];

/// How many candidates to request before filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breadth {
    /// A plain conversational turn
    Narrow,
    /// The caller filters down to a document subset or needs broad synthesis
    Wide,
}

/// Context selected for one query
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// Surviving chunks in selection order
    pub chunks: Vec<RetrievedChunk>,
    /// Rendered blocks, empty when nothing survived
    pub text: String,
}

impl AssembledContext {
    fn from_chunks(chunks: Vec<RetrievedChunk>) -> Self {
        let text = render(&chunks);
        Self { chunks, text }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct source filenames, in order of first appearance
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.chunks
            .iter()
            .map(|c| c.metadata.source.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }
}

/// Builds bounded, tenant-safe context strings from the vector index.
///
/// The relational store is the authority on which documents exist; the
/// index may still hold vectors of deleted documents, so every hit is
/// checked against `permitted` before it can reach a prompt.
#[derive(Clone)]
pub struct ContextAssembler {
    gateway: VectorIndexGateway,
    config: RetrievalConfig,
}

impl ContextAssembler {
    pub fn new(gateway: VectorIndexGateway, config: RetrievalConfig) -> Self {
        Self { gateway, config }
    }

    fn candidates(&self, breadth: Breadth) -> usize {
        match breadth {
            Breadth::Narrow => self.config.narrow_k,
            Breadth::Wide => self.config.wide_k,
        }
    }

    /// Context for a chat turn
    #[instrument(skip(self, query, permitted), fields(permitted = permitted.len()))]
    pub async fn assemble(
        &self,
        project_id: i64,
        query: &str,
        permitted: &HashSet<i64>,
        breadth: Breadth,
    ) -> AssembledContext {
        let hits = self
            .gateway
            .search(project_id, query, self.candidates(breadth), None)
            .await;
        select(hits, permitted, self.config.chat_max_chunks)
    }

    /// Wide context for a deep research report
    #[instrument(skip(self, query, permitted), fields(permitted = permitted.len()))]
    pub async fn assemble_research(
        &self,
        project_id: i64,
        query: &str,
        permitted: &HashSet<i64>,
    ) -> AssembledContext {
        let hits = self
            .gateway
            .search(project_id, query, self.candidates(Breadth::Wide), None)
            .await;
        select(hits, permitted, self.config.research_max_chunks)
    }

    /// Union of the [`ANALYSIS_PROBES`], issued concurrently
    #[instrument(skip(self, permitted), fields(permitted = permitted.len()))]
    pub async fn assemble_probes(&self, project_id: i64, permitted: &HashSet<i64>) -> AssembledContext {
        let searches = ANALYSIS_PROBES
            .iter()
            .map(|probe| self.gateway.search(project_id, probe, self.config.probe_k, None));

        let hits = join_all(searches).await.into_iter().flatten();
        select(hits, permitted, self.config.analysis_max_chunks)
    }
}

/// Keep permitted chunks, first occurrence of each content, up to `max`
fn select(
    hits: impl IntoIterator<Item = RetrievedChunk>,
    permitted: &HashSet<i64>,
    max: usize,
) -> AssembledContext {
    let mut seen = HashSet::new();
    let mut dropped = 0;
    let mut chunks = Vec::new();

    for hit in hits {
        if !permitted.contains(&hit.metadata.document_id) {
            dropped += 1;
            continue;
        }
        if !seen.insert(hit.content.clone()) {
            continue;
        }
        chunks.push(hit);
    }
    chunks.truncate(max);

    metrics::record_filtered("document", dropped);
    debug!(kept = chunks.len(), dropped, "Context assembled");

    AssembledContext::from_chunks(chunks)
}

/// Render chunks as `[Document: .. | Page: ..]` blocks separated by blank lines
pub fn render(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "[Document: {} | Page: {}]\n{}",
                c.metadata.source, c.metadata.page, c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use papermind_common::embeddings::HashEmbedder;
    use papermind_common::models::{Chunk, ChunkMetadata};
    use papermind_common::vector::{IndexEntry, IndexHit, InMemoryVectorIndex, VectorIndex};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Ignores filters entirely, as a misconfigured provider might
    #[derive(Default)]
    struct LeakyIndex {
        entries: RwLock<Vec<IndexEntry>>,
    }

    #[async_trait]
    impl VectorIndex for LeakyIndex {
        async fn init(&self) -> papermind_common::Result<()> {
            Ok(())
        }

        async fn upsert(&self, entries: Vec<IndexEntry>) -> papermind_common::Result<()> {
            self.entries.write().await.extend(entries);
            Ok(())
        }

        async fn search(
            &self,
            _vector: &[f32],
            k: usize,
            _filter: &Value,
        ) -> papermind_common::Result<Vec<IndexHit>> {
            Ok(self
                .entries
                .read()
                .await
                .iter()
                .take(k)
                .map(|e| IndexHit {
                    content: e.content.clone(),
                    metadata: e.metadata.clone(),
                    score: 0.5,
                })
                .collect())
        }

        async fn delete(&self, _filter: &Value) -> papermind_common::Result<u64> {
            Ok(0)
        }
    }

    fn chunk(text: &str, source: &str, page: u32) -> Chunk {
        Chunk {
            text: text.to_string(),
            page,
            source: source.to_string(),
        }
    }

    fn hit(content: &str, document_id: i64) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                project_id: 1,
                document_id,
                source: format!("doc{}.pdf", document_id),
                page: 1,
            },
            score: 1.0,
        }
    }

    async fn assembler_over(index: Arc<dyn VectorIndex>) -> (ContextAssembler, VectorIndexGateway) {
        index.init().await.unwrap();
        let gateway = VectorIndexGateway::new(index, Arc::new(HashEmbedder::new(128)));
        (
            ContextAssembler::new(gateway.clone(), RetrievalConfig::default()),
            gateway,
        )
    }

    fn permitted(ids: &[i64]) -> HashSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_render_format() {
        let rendered = render(&[hit("first", 1), hit("second", 2)]);
        assert_eq!(
            rendered,
            "[Document: doc1.pdf | Page: 1]\nfirst\n\n[Document: doc2.pdf | Page: 1]\nsecond"
        );
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_select_dedups_and_truncates() {
        let hits = vec![hit("a", 1), hit("b", 2), hit("a", 2), hit("c", 1), hit("d", 1)];
        let context = select(hits, &permitted(&[1, 2]), 3);

        let contents: Vec<&str> = context.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(context.sources(), vec!["doc1.pdf", "doc2.pdf"]);
    }

    #[test]
    fn test_select_drops_unpermitted_documents() {
        let context = select(vec![hit("gone", 7), hit("kept", 8)], &permitted(&[8]), 5);
        assert_eq!(context.chunks.len(), 1);
        assert_eq!(context.chunks[0].content, "kept");
    }

    #[tokio::test]
    async fn test_deleted_document_excluded() {
        let (assembler, gateway) = assembler_over(Arc::new(InMemoryVectorIndex::new())).await;
        gateway
            .write(1, 10, &[chunk("attention mechanisms in vision", "old.pdf", 1)])
            .await
            .unwrap();
        gateway
            .write(1, 11, &[chunk("attention mechanisms in language", "new.pdf", 3)])
            .await
            .unwrap();

        // document 10 was deleted from the store, its vectors remain
        let context = assembler
            .assemble(1, "attention mechanisms", &permitted(&[11]), Breadth::Narrow)
            .await;

        assert_eq!(context.chunks.len(), 1);
        assert_eq!(
            context.text,
            "[Document: new.pdf | Page: 3]\nattention mechanisms in language"
        );
    }

    #[tokio::test]
    async fn test_leaky_index_cannot_cross_projects() {
        let (assembler, gateway) = assembler_over(Arc::new(LeakyIndex::default())).await;
        gateway.write(2, 20, &[chunk("secret of project two", "b.pdf", 1)]).await.unwrap();
        gateway.write(1, 10, &[chunk("notes of project one", "a.pdf", 1)]).await.unwrap();

        // even a permitted set naming the other project's document is not enough
        let context = assembler
            .assemble(1, "project", &permitted(&[10, 20]), Breadth::Wide)
            .await;

        assert!(context.chunks.iter().all(|c| c.metadata.project_id == 1));
        assert!(!context.text.contains("secret"));
    }

    #[tokio::test]
    async fn test_no_documents_gives_empty_context() {
        let (assembler, _) = assembler_over(Arc::new(InMemoryVectorIndex::new())).await;
        let context = assembler
            .assemble(1, "anything", &HashSet::new(), Breadth::Narrow)
            .await;

        assert!(context.is_empty());
        assert_eq!(context.text, "");
    }

    #[tokio::test]
    async fn test_probes_union_without_duplicates() {
        let (assembler, gateway) = assembler_over(Arc::new(InMemoryVectorIndex::new())).await;
        gateway
            .write(
                1,
                10,
                &[
                    chunk("limitations of the approach", "p.pdf", 5),
                    chunk("future work includes scaling", "p.pdf", 6),
                    chunk("in conclusion we find", "p.pdf", 7),
                    chunk("our methodology uses ablations", "p.pdf", 2),
                ],
            )
            .await
            .unwrap();

        let context = assembler.assemble_probes(1, &permitted(&[10])).await;

        assert_eq!(context.chunks.len(), 4);
        let unique: HashSet<&str> = context.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(unique.len(), 4);
    }

    #[tokio::test]
    async fn test_chat_context_bounded() {
        let (assembler, gateway) = assembler_over(Arc::new(InMemoryVectorIndex::new())).await;
        let chunks: Vec<Chunk> = (0..30)
            .map(|i| chunk(&format!("graph result number {}", i), "g.pdf", 1))
            .collect();
        gateway.write(1, 10, &chunks).await.unwrap();

        let chat = assembler
            .assemble(1, "graph result", &permitted(&[10]), Breadth::Wide)
            .await;
        assert_eq!(chat.chunks.len(), 5);

        let research = assembler.assemble_research(1, "graph result", &permitted(&[10])).await;
        assert_eq!(research.chunks.len(), 20);
    }
}
