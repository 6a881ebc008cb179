//! # RAG agent
//!
//! Orchestration for the whole engine: batch document ingestion and the
//! two-stage (retrieve → generate) conversation pipeline.
//!
//! One [`RagAgent`] owns one vector index and one session history; the host
//! service is expected to serialize access per agent instance. Each `ask`
//! call runs the two stages strictly in sequence:
//!
//! 1. **Retrieve** — embed the question and pull the most similar chunks.
//!    Embedding failures degrade to an empty context; the turn continues.
//! 2. **Generate** — assemble a single prompt from context, bounded history
//!    and the question, then invoke the chat capability. A model failure is
//!    substituted with a fixed apologetic answer; either way the turn
//!    appends exactly one human/assistant pair to history.
//!
//! There are no retries anywhere in the pipeline: failure handling is local
//! substitution, never re-invocation.
//!
//! ## Quick example
//! ```no_run
//! use std::sync::Arc;
//! use tome::agent::RagAgent;
//! use tome::api::{OpenAiChat, OpenAiEmbedder};
//! use tome::config::TomeConfig;
//! use tome::loader::PdfLoader;
//! use tome::vector_store::VectorStore;
//!
//! # async fn demo(config: TomeConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let store = VectorStore::new(Arc::new(OpenAiEmbedder::new(&config)));
//! let mut agent = RagAgent::new(Arc::new(OpenAiChat::new(&config)), store);
//! agent.ingest(&PdfLoader, &["manual.pdf".into()]).await?;
//! let answer = agent.ask("What does chapter one cover?").await?;
//! println!("{answer}");
//! # Ok(()) }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::ChatModel;
use crate::chunker::{Chunk, Chunker};
use crate::error::{IngestionError, ValidationError};
use crate::history::{ChatMessage, SessionHistory, TurnPair};
use crate::loader::DocumentLoader;
use crate::session_store::SessionStore;
use crate::vector_store::VectorStore;

/// How many chunks the retrieve stage feeds into the prompt.
pub const RETRIEVAL_TOP_K: usize = 4;

/// Per-chunk character cap inside the prompt; longer chunks are truncated
/// with an ellipsis marker.
pub const SNIPPET_MAX_CHARS: usize = 800;

/// Answer substituted when the chat capability fails mid-turn.
pub const FALLBACK_ANSWER: &str =
    "I apologize, but I encountered an error while generating a response. Please try again.";

/// Transient per-invocation record of one conversation turn. Created fresh
/// for each `ask` call and discarded once the answer and history delta are
/// extracted.
struct ConversationTurn {
    question: String,
    context: Vec<Chunk>,
    prompt: String,
    answer: String,
}

/// Retrieval-augmented chat agent: vector index + bounded history + chat
/// capability, with optional durable session persistence.
pub struct RagAgent {
    chat: Arc<dyn ChatModel>,
    store: VectorStore,
    history: SessionHistory,
    chunker: Chunker,
    session: Option<SessionStore>,
}

impl RagAgent {
    /// Create an agent with empty history over the given index and chat
    /// capability.
    pub fn new(chat: Arc<dyn ChatModel>, store: VectorStore) -> Self {
        Self {
            chat,
            store,
            history: SessionHistory::default(),
            chunker: Chunker::default(),
            session: None,
        }
    }

    /// Attach a durable session store, replacing the in-memory history with
    /// whatever the store has persisted for this session.
    pub fn attach_session(
        &mut self,
        mut session: SessionStore,
    ) -> Result<(), diesel::result::Error> {
        let persisted = session.load(self.history.max_messages())?;
        info!(
            "restored {} messages for session {:?}",
            persisted.len(),
            session.session_name()
        );
        self.history.restore(persisted);
        self.session = Some(session);
        Ok(())
    }

    /// Load, chunk, embed, and index a batch of documents.
    ///
    /// Documents are processed independently: one that fails to load is
    /// recorded and skipped. The call fails only when *every* document in a
    /// non-empty batch is unusable, or when embedding the surviving chunks
    /// fails. Re-ingesting a document adds a second, independent set of
    /// chunks; callers wanting a clean re-index should [`reset`](Self::reset)
    /// first.
    ///
    /// # Returns
    /// The number of chunks added to the index. An empty batch is a no-op
    /// returning 0.
    pub async fn ingest(
        &mut self,
        loader: &dyn DocumentLoader,
        paths: &[PathBuf],
    ) -> Result<usize, IngestionError> {
        if paths.is_empty() {
            warn!("no document paths provided for ingestion");
            return Ok(0);
        }

        let mut chunks = Vec::new();
        let mut failures = Vec::new();
        let mut loaded = 0usize;

        for path in paths {
            match loader.load(path) {
                Ok(pages) => {
                    let document = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    let document_chunks = self.chunker.split_document(&document, &pages);
                    info!(
                        "loaded {} pages from {}, producing {} chunks",
                        pages.len(),
                        path.display(),
                        document_chunks.len()
                    );
                    chunks.extend(document_chunks);
                    loaded += 1;
                }
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    failures.push(format!("{}: {err}", path.display()));
                }
            }
        }

        if loaded == 0 {
            return Err(IngestionError::AllDocumentsFailed {
                reasons: failures.join("; "),
            });
        }

        let added = self.store.insert(chunks).await?;
        info!("added {added} chunks to the vector index");
        Ok(added)
    }

    /// Answer a question using retrieved context and conversation history.
    ///
    /// Always produces *some* answer for a structurally valid question: a
    /// retrieval failure degrades to an empty context, and a model failure
    /// substitutes [`FALLBACK_ANSWER`]. In both cases the turn still appends
    /// one human/assistant pair to history.
    ///
    /// # Errors
    /// [`ValidationError::EmptyQuestion`] if the question is empty or
    /// whitespace-only; this is checked before any capability is invoked.
    pub async fn ask(&mut self, question: &str) -> Result<String, ValidationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        let mut turn = ConversationTurn {
            question: question.to_string(),
            context: Vec::new(),
            prompt: String::new(),
            answer: String::new(),
        };

        turn.context = retrieve(&self.store, &turn.question, RETRIEVAL_TOP_K).await;
        turn.prompt = build_prompt(&turn.context, self.history.messages(), &turn.question);

        let pair = generate(self.chat.as_ref(), &turn.prompt, &turn.question).await;
        turn.answer = pair.answer.clone();

        self.history.append(pair.clone());
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.append(&pair) {
                warn!("failed to persist turn: {err}");
            }
        }

        Ok(turn.answer)
    }

    /// Clear the vector index and the session history (including persisted
    /// rows when a session store is attached).
    pub fn reset(&mut self) {
        self.store.reset();
        self.history.reset();
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.clear() {
                warn!("failed to clear persisted session: {err}");
            }
        }
        info!("agent state has been reset");
    }

    /// Number of chunks currently held by the vector index.
    pub fn document_count(&self) -> usize {
        self.store.chunk_count()
    }

    /// The retained conversation history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        self.history.messages()
    }
}

/// Retrieve stage: up to `k` chunks similar to the question. Failures of
/// the embedding capability degrade to an empty context so the turn can
/// still proceed to generation.
async fn retrieve(store: &VectorStore, question: &str, k: usize) -> Vec<Chunk> {
    if question.is_empty() {
        return Vec::new();
    }
    match store.search(question, k).await {
        Ok(chunks) => {
            info!("retrieved {} chunks for the question", chunks.len());
            chunks
        }
        Err(err) => {
            error!("retrieval failed, continuing without context: {err}");
            Vec::new()
        }
    }
}

/// Generate stage: invoke the chat capability once with the assembled
/// prompt. A failure substitutes the fixed fallback answer; the returned
/// pair is appended to history either way.
async fn generate(chat: &dyn ChatModel, prompt: &str, question: &str) -> TurnPair {
    match chat.complete(prompt).await {
        Ok(answer) => TurnPair::new(question, answer),
        Err(err) => {
            error!("generation failed, substituting the fallback answer: {err}");
            TurnPair::new(question, FALLBACK_ANSWER)
        }
    }
}

/// Assemble the single prompt sent to the chat capability: retrieved
/// snippets labeled `Document N`, the bounded history as `Role: content`
/// lines (most recent last), the current question, and fixed instructions.
/// The context and history sections are omitted entirely when empty.
fn build_prompt(context: &[Chunk], history: &[ChatMessage], question: &str) -> String {
    let context_section = if context.is_empty() {
        String::new()
    } else {
        let docs_content = context
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let snippet = truncate_chars(&chunk.text, SNIPPET_MAX_CHARS);
                if snippet.len() < chunk.text.len() {
                    format!("Document {}:\n{}...", i + 1, snippet)
                } else {
                    format!("Document {}:\n{}", i + 1, snippet)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("Relevant Information:\n{docs_content}\n\n")
    };

    let history_section = if history.is_empty() {
        String::new()
    } else {
        let history_text = history
            .iter()
            .map(|message| format!("{}: {}", message.speaker.label(), message.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Recent Conversation:\n{history_text}\n\n")
    };

    format!(
        "You are a helpful AI assistant that answers questions based on provided documents and conversation context.\n\n\
         {context_section}{history_section}Current Question: {question}\n\n\
         Instructions:\n\
         - Answer the question clearly and helpfully\n\
         - Use information from the provided documents when relevant\n\
         - If the documents don't contain relevant information, say so clearly\n\
         - Be concise but comprehensive\n\
         - Maintain conversation context when appropriate\n\n\
         Answer:"
    )
}

/// Cut `text` to at most `max_chars` characters, on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Embedder;
    use crate::error::{EmbeddingError, LoadError, ModelError};
    use crate::history::Speaker;
    use crate::loader::Page;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: folds bytes into a small fixed-dimension
    /// vector so any text embeds without a network.
    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut vector = vec![0.0f32; 4];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % 4] += byte as f32;
            }
            Ok(vector)
        }
    }

    /// Embedder that always fails, to exercise degraded retrieval.
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::EmptyResponse)
        }
    }

    /// Chat capability that records invocations and returns a canned answer.
    struct StubChat {
        answer: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubChat {
        fn ok(answer: &'static str) -> Self {
            Self {
                answer,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                answer: "",
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for StubChat {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ModelError::EmptyResponse)
            } else {
                Ok(self.answer.to_string())
            }
        }
    }

    /// Loader serving canned pages for "good" paths and errors otherwise.
    struct StubLoader;

    impl DocumentLoader for StubLoader {
        fn load(&self, path: &Path) -> Result<Vec<Page>, LoadError> {
            let name = path.to_string_lossy();
            if name.contains("corrupt") {
                return Err(LoadError::Empty(path.to_path_buf()));
            }
            if name.contains("missing") {
                return Err(LoadError::NotFound(path.to_path_buf()));
            }
            Ok(vec![
                Page {
                    text: "Tome answers questions about PDF documents.".to_string(),
                    number: 1,
                },
                Page {
                    text: "Retrieval uses cosine similarity over chunk embeddings.".to_string(),
                    number: 2,
                },
            ])
        }
    }

    fn agent_with(chat: Arc<dyn ChatModel>) -> RagAgent {
        RagAgent::new(chat, VectorStore::new(Arc::new(HashEmbedder)))
    }

    #[tokio::test]
    async fn ingesting_an_empty_batch_is_a_no_op() {
        let mut agent = agent_with(Arc::new(StubChat::ok("fine")));
        assert_eq!(agent.ingest(&StubLoader, &[]).await.unwrap(), 0);
        assert_eq!(agent.document_count(), 0);
    }

    #[tokio::test]
    async fn ingestion_skips_unusable_documents() {
        let mut agent = agent_with(Arc::new(StubChat::ok("fine")));
        let added = agent
            .ingest(
                &StubLoader,
                &[PathBuf::from("valid.pdf"), PathBuf::from("corrupt.pdf")],
            )
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(agent.document_count(), 2);
    }

    #[tokio::test]
    async fn ingestion_fails_when_every_document_is_unusable() {
        let mut agent = agent_with(Arc::new(StubChat::ok("fine")));
        let err = agent
            .ingest(
                &StubLoader,
                &[PathBuf::from("corrupt1.pdf"), PathBuf::from("missing.pdf")],
            )
            .await
            .unwrap_err();
        match err {
            IngestionError::AllDocumentsFailed { reasons } => {
                assert!(reasons.contains("corrupt1.pdf"));
                assert!(reasons.contains("missing.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ingestion_propagates_embedding_failures() {
        let store = VectorStore::new(Arc::new(FailingEmbedder));
        let mut agent = RagAgent::new(Arc::new(StubChat::ok("fine")), store);
        let err = agent
            .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Embedding(_)));
    }

    #[tokio::test]
    async fn an_empty_question_is_rejected_before_any_capability_runs() {
        let chat = Arc::new(StubChat::ok("should not run"));
        let mut agent = agent_with(chat.clone());
        assert!(matches!(
            agent.ask("   ").await,
            Err(ValidationError::EmptyQuestion)
        ));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn a_successful_turn_returns_the_answer_and_appends_one_pair() {
        let mut agent = agent_with(Arc::new(StubChat::ok("It covers ingestion.")));
        agent
            .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
            .await
            .unwrap();

        let answer = agent.ask("What does Tome do?").await.unwrap();
        assert_eq!(answer, "It covers ingestion.");
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[0].speaker, Speaker::Human);
        assert_eq!(agent.history()[0].content, "What does Tome do?");
        assert_eq!(agent.history()[1].content, "It covers ingestion.");
    }

    #[tokio::test]
    async fn eleven_turns_keep_exactly_twenty_messages() {
        let mut agent = agent_with(Arc::new(StubChat::ok("answered")));
        for i in 0..11 {
            agent.ask(&format!("question {i}")).await.unwrap();
        }
        assert_eq!(agent.history().len(), 20);
        assert_eq!(agent.history()[0].content, "question 1");
    }

    #[tokio::test]
    async fn a_model_failure_substitutes_the_fallback_and_still_records_the_turn() {
        let mut agent = agent_with(Arc::new(StubChat::failing()));
        let answer = agent.ask("Will this fail?").await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[1].content, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn a_retrieval_failure_degrades_to_an_empty_context() {
        let store = VectorStore::new(Arc::new(FailingEmbedder));
        let mut agent = RagAgent::new(Arc::new(StubChat::ok("no context needed")), store);
        // Force entries into the store so search actually embeds the query.
        agent
            .store
            .add_vector(
                vec![1.0, 0.0],
                Chunk {
                    text: "seeded".into(),
                    document: "seed.pdf".into(),
                    page: 1,
                    index: 0,
                },
            )
            .unwrap();

        let answer = agent.ask("Does this still answer?").await.unwrap();
        assert_eq!(answer, "no context needed");
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_the_index_and_the_history() {
        let mut agent = agent_with(Arc::new(StubChat::ok("answered")));
        agent
            .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
            .await
            .unwrap();
        agent.ask("anything").await.unwrap();

        agent.reset();
        assert_eq!(agent.document_count(), 0);
        assert!(agent.history().is_empty());
    }

    mod round_trip {
        use super::*;
        use crate::api::{OpenAiChat, OpenAiEmbedder};
        use crate::config::TomeConfig;
        use httpmock::prelude::*;
        use serde_json::json;

        fn mock_config(api_base: String) -> TomeConfig {
            TomeConfig {
                api_key: "mock_api_key".to_string(),
                api_base,
                model: "mock_model".to_string(),
                embedding_model: "mock_embedding_model".to_string(),
                max_response_tokens: 512,
                stop_words: vec![],
                session_db_url: "tome_test.db".to_string(),
                session_name: None,
                should_stream: None,
            }
        }

        fn mock_embeddings(server: &MockServer) {
            server.mock(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [{
                        "object": "embedding",
                        "index": 0,
                        "embedding": [0.1, 0.2, 0.3]
                    }],
                    "model": "mock_embedding_model",
                    "usage": {"prompt_tokens": 3, "total_tokens": 3}
                }));
            });
        }

        fn agent_against(server: &MockServer) -> RagAgent {
            let config = mock_config(format!("{}/v1", server.base_url()));
            let store = VectorStore::new(Arc::new(OpenAiEmbedder::new(&config)));
            RagAgent::new(Arc::new(OpenAiChat::new(&config)), store)
        }

        #[tokio::test]
        async fn ingest_then_ask_returns_the_mocked_completion() {
            let server = MockServer::start();
            mock_embeddings(&server);
            let chat_mock = server.mock(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-123",
                    "object": "chat.completion",
                    "created": 1700000000,
                    "model": "mock_model",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": "Tome answers questions about PDFs."
                        },
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
                }));
            });

            let mut agent = agent_against(&server);
            let added = agent
                .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
                .await
                .unwrap();
            assert_eq!(added, 2);

            let answer = agent.ask("What does Tome do?").await.unwrap();
            chat_mock.assert();
            assert_eq!(answer, "Tome answers questions about PDFs.");
            assert_eq!(agent.history().len(), 2);
        }

        #[tokio::test]
        async fn a_failing_streaming_backend_still_yields_the_fallback_answer() {
            let server = MockServer::start();
            mock_embeddings(&server);
            server.mock(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("model overloaded");
            });

            let mut config = mock_config(format!("{}/v1", server.base_url()));
            config.should_stream = Some(true);
            let store = VectorStore::new(Arc::new(OpenAiEmbedder::new(&config)));
            let mut agent = RagAgent::new(Arc::new(OpenAiChat::new(&config)), store);
            agent
                .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
                .await
                .unwrap();

            // Nothing was streamed; the turn still produces the fallback.
            let answer = agent.ask("Will this stream?").await.unwrap();
            assert_eq!(answer, FALLBACK_ANSWER);
            assert_eq!(agent.history().len(), 2);
        }

        #[tokio::test]
        async fn a_failing_chat_endpoint_yields_the_fallback_answer() {
            let server = MockServer::start();
            mock_embeddings(&server);
            server.mock(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("model overloaded");
            });

            let mut agent = agent_against(&server);
            agent
                .ingest(&StubLoader, &[PathBuf::from("valid.pdf")])
                .await
                .unwrap();

            let answer = agent.ask("Will this fail?").await.unwrap();
            assert_eq!(answer, FALLBACK_ANSWER);
            assert_eq!(agent.history().len(), 2);
        }
    }

    #[test]
    fn prompt_contains_labeled_documents_and_the_question() {
        let context = vec![
            Chunk {
                text: "alpha content".into(),
                document: "a.pdf".into(),
                page: 1,
                index: 0,
            },
            Chunk {
                text: "beta content".into(),
                document: "b.pdf".into(),
                page: 2,
                index: 1,
            },
        ];
        let prompt = build_prompt(&context, &[], "What is alpha?");
        assert!(prompt.contains("Relevant Information:"));
        assert!(prompt.contains("Document 1:\nalpha content"));
        assert!(prompt.contains("Document 2:\nbeta content"));
        assert!(prompt.contains("Current Question: What is alpha?"));
        assert!(prompt.ends_with("Answer:"));
        assert!(!prompt.contains("Recent Conversation:"));
    }

    #[test]
    fn prompt_omits_the_context_section_without_retrieved_chunks() {
        let history = vec![
            ChatMessage::human("hi"),
            ChatMessage::assistant("hello there"),
        ];
        let prompt = build_prompt(&[], &history, "next question");
        assert!(!prompt.contains("Relevant Information:"));
        assert!(prompt.contains("Recent Conversation:\nHuman: hi\nAssistant: hello there"));
    }

    #[test]
    fn long_snippets_are_truncated_with_an_ellipsis_marker() {
        let context = vec![Chunk {
            text: "x".repeat(900),
            document: "long.pdf".into(),
            page: 1,
            index: 0,
        }];
        let prompt = build_prompt(&context, &[], "q");
        let expected = format!("Document 1:\n{}...", "x".repeat(SNIPPET_MAX_CHARS));
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&"x".repeat(801)));
    }
}
