use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sage::config::Config;
use sage::crisis;
use sage::db;
use sage::embedding::{embed_query, EmbeddingProvider};
use sage::error::{EmbeddingError, IndexError, LlmError, SpeechInputError, SpeechOutputError};
use sage::index::{self, VectorIndex};
use sage::llm::LanguageModel;
use sage::models::Branch;
use sage::responder::{Responder, RESPONSE_FALLBACK};
use sage::retrieval::RetrievalService;
use sage::session::{Session, Shutdown, State};
use sage::speech::{ConsoleInput, SpeechInput, SpeechOutput};

// ============ Test doubles ============

/// Bag-of-words embedder: each word bumps one hashed dimension.
struct HashEmbedder {
    model: String,
    dims: usize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self::named("hash-test", 256)
    }

    fn named(model: &str, dims: usize) -> Self {
        Self {
            model: model.to_string(),
            dims,
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Provider {
            provider: "failing".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Language model that records prompts and returns a canned reply.
struct ScriptedModel {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or_else(|| LlmError::Unavailable {
            backend: "scripted".to_string(),
            message: "model offline".to_string(),
        })
    }
}

/// Speech input fed from a script; `Ok(None)` entries are listen timeouts.
struct ScriptedInput {
    script: VecDeque<Result<Option<String>, SpeechInputError>>,
}

impl ScriptedInput {
    fn new(script: &[Option<&str>]) -> Self {
        Self::from_results(script.iter().map(|s| Ok(s.map(str::to_string))).collect())
    }

    fn from_results(script: Vec<Result<Option<String>, SpeechInputError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl SpeechInput for ScriptedInput {
    type Audio = String;

    async fn listen(
        &mut self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, SpeechInputError> {
        self.script.pop_front().unwrap_or(Err(SpeechInputError::Closed))
    }

    async fn transcribe(&mut self, audio: String) -> String {
        audio
    }
}

/// Hands back one phrase after `delay`, as a slow speaker would.
struct DelayedInput {
    delay: Duration,
    phrase: Option<String>,
}

#[async_trait]
impl SpeechInput for DelayedInput {
    type Audio = String;

    async fn listen(
        &mut self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, SpeechInputError> {
        tokio::time::sleep(self.delay).await;
        self.phrase.take().map(Some).ok_or(SpeechInputError::Closed)
    }

    async fn transcribe(&mut self, audio: String) -> String {
        audio
    }
}

/// Never hears anything and never gives up.
struct SilentInput;

#[async_trait]
impl SpeechInput for SilentInput {
    type Audio = String;

    async fn listen(
        &mut self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, SpeechInputError> {
        std::future::pending().await
    }

    async fn transcribe(&mut self, audio: String) -> String {
        audio
    }
}

/// A terminal that is open but never types anything.
struct IdleTerminal;

impl std::io::Read for IdleTerminal {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(Duration::from_secs(3600));
        Ok(0)
    }
}

#[derive(Clone, Default)]
struct RecordingOutput {
    spoken: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    broken: Arc<AtomicBool>,
}

impl RecordingOutput {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechOutput for RecordingOutput {
    async fn synthesize(&self, text: &str) -> Result<(), SpeechOutputError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SpeechOutputError::Synthesis("closed".to_string()));
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(SpeechOutputError::Synthesis("speaker unplugged".to_string()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ============ Fixtures ============

fn write_corpus(root: &Path) {
    fs::create_dir_all(root.join("coping")).unwrap();
    fs::write(
        root.join("grounding.md"),
        "# Grounding\n\nThe grounding technique asks you to name five things you see, \
         four you can touch, three you hear, two you smell and one you taste.\n\n\
         Grounding brings attention back to the present moment during panic.",
    )
    .unwrap();
    fs::write(
        root.join("sleep.txt"),
        "Sleep hygiene means keeping a regular bedtime, limiting screens before bed \
         and avoiding caffeine late in the day.",
    )
    .unwrap();
    fs::write(
        root.join("coping/breathing.md"),
        "Box breathing: inhale for four counts, hold for four, exhale for four, hold for four.",
    )
    .unwrap();
}

fn test_config(tmp: &TempDir) -> Config {
    let mut cfg = Config::minimal();
    cfg.corpus.root = tmp.path().join("docs");
    cfg.index.persist_dir = tmp.path().join("storage");
    cfg.embedding.provider = "disabled".to_string();
    cfg.llm.provider = "disabled".to_string();
    cfg.retrieval.similarity_threshold = 0.1;
    cfg
}

async fn built_index(tmp: &TempDir) -> (Config, Arc<VectorIndex>, Arc<HashEmbedder>) {
    let cfg = test_config(tmp);
    write_corpus(&cfg.corpus.root);
    let embedder = Arc::new(HashEmbedder::new());
    let index = index::ensure_index(&cfg, embedder.as_ref()).await.unwrap();
    (cfg, Arc::new(index), embedder)
}

async fn session_with(
    script: &[Option<&str>],
    model: Arc<ScriptedModel>,
) -> (TempDir, Session<ScriptedInput>, RecordingOutput, Shutdown) {
    build_session(ScriptedInput::new(script), model, |_| {}).await
}

async fn build_session<I: SpeechInput>(
    input: I,
    model: Arc<ScriptedModel>,
    configure: impl FnOnce(&mut Config),
) -> (TempDir, Session<I>, RecordingOutput, Shutdown) {
    let tmp = TempDir::new().unwrap();
    let (mut cfg, index, embedder) = built_index(&tmp).await;
    configure(&mut cfg);

    let retrieval = Arc::new(RetrievalService::new(
        index,
        embedder,
        model.clone(),
        &cfg.retrieval,
    ));
    let responder = Responder::new(model, &cfg.responder, &cfg.session.assistant_name);
    let output = RecordingOutput::default();
    let shutdown = Shutdown::new();

    let session = Session::new(
        input,
        Box::new(output.clone()),
        retrieval,
        responder,
        cfg.session.clone(),
        shutdown.clone(),
    );
    (tmp, session, output, shutdown)
}

// ============ Index store ============

#[tokio::test]
async fn test_index_build_persist_load_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let (cfg, built, embedder) = built_index(&tmp).await;

    assert!(db::index_file(&cfg.index.persist_dir).is_file());
    assert_eq!(built.document_count(), 3);
    assert!(built.chunk_count() >= 3);

    let loaded = Arc::new(index::ensure_index(&cfg, embedder.as_ref()).await.unwrap());
    assert_eq!(loaded.manifest(), built.manifest());

    let model = ScriptedModel::replying("Name five things you can see around you.");
    let question = "What is the grounding technique?";
    let from_built = RetrievalService::new(built.clone(), embedder.clone(), model.clone(), &cfg.retrieval);
    let from_loaded = RetrievalService::new(loaded.clone(), embedder.clone(), model, &cfg.retrieval);

    let a = from_built.try_query(question).await.unwrap();
    let b = from_loaded.try_query(question).await.unwrap();
    assert!(!a.is_fallback() && !b.is_fallback());
    assert!(!a.text.is_empty());

    let ids = |answer: &sage::retrieval::Answer| {
        answer.sources.iter().map(|s| s.chunk_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.sources[0].source_id, "grounding.md");

    let query_vec = embed_query(embedder.as_ref(), question).await.unwrap();
    let scores = |index: &VectorIndex| {
        index
            .nearest(&query_vec, 10, -1.0)
            .into_iter()
            .map(|h| (h.chunk_id, h.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(scores(&built), scores(&loaded));
}

#[tokio::test]
async fn test_index_load_does_not_touch_corpus() {
    let tmp = TempDir::new().unwrap();
    let (cfg, built, embedder) = built_index(&tmp).await;

    fs::remove_dir_all(&cfg.corpus.root).unwrap();
    let loaded = index::ensure_index(&cfg, embedder.as_ref()).await.unwrap();
    assert_eq!(loaded.chunk_count(), built.chunk_count());
}

#[tokio::test]
async fn test_index_load_rejects_other_embedding_model() {
    let tmp = TempDir::new().unwrap();
    let (cfg, _built, _embedder) = built_index(&tmp).await;

    let other_model = HashEmbedder::named("other-model", 256);
    let err = index::ensure_index(&cfg, &other_model).await.unwrap_err();
    assert!(matches!(err, IndexError::Load { .. }), "{err}");

    let other_dims = HashEmbedder::named("hash-test", 32);
    let err = index::ensure_index(&cfg, &other_dims).await.unwrap_err();
    assert!(matches!(err, IndexError::Load { .. }), "{err}");
}

#[tokio::test]
async fn test_index_load_rejects_corrupt_database() {
    let tmp = TempDir::new().unwrap();
    let (cfg, _built, embedder) = built_index(&tmp).await;

    fs::write(db::index_file(&cfg.index.persist_dir), b"this is not a sqlite file").unwrap();
    let err = index::ensure_index(&cfg, embedder.as_ref()).await.unwrap_err();
    assert!(matches!(err, IndexError::Load { .. }), "{err}");
}

#[tokio::test]
async fn test_index_load_rejects_missing_database() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    fs::create_dir_all(&cfg.index.persist_dir).unwrap();

    let err = index::ensure_index(&cfg, &HashEmbedder::new()).await.unwrap_err();
    assert!(matches!(err, IndexError::Load { .. }), "{err}");
}

#[tokio::test]
async fn test_empty_corpus_fails_without_leaving_index() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    fs::create_dir_all(&cfg.corpus.root).unwrap();
    fs::write(cfg.corpus.root.join("blank.md"), "   \n\n").unwrap();

    let err = index::ensure_index(&cfg, &HashEmbedder::new()).await.unwrap_err();
    assert!(matches!(err, IndexError::Build { .. }), "{err}");
    assert!(!cfg.index.persist_dir.exists());
}

#[tokio::test]
async fn test_missing_corpus_is_build_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);

    let err = index::ensure_index(&cfg, &HashEmbedder::new()).await.unwrap_err();
    assert!(matches!(err, IndexError::Build { .. }), "{err}");
}

#[tokio::test]
async fn test_embedding_failure_leaves_no_index() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    write_corpus(&cfg.corpus.root);

    let err = index::ensure_index(&cfg, &FailingEmbedder).await.unwrap_err();
    assert!(matches!(err, IndexError::Build { .. }), "{err}");
    assert!(!cfg.index.persist_dir.exists());
    assert!(!tmp.path().join("storage.partial").exists());
}

#[tokio::test]
async fn test_rebuild_replaces_persisted_index() {
    let tmp = TempDir::new().unwrap();
    let (cfg, built, embedder) = built_index(&tmp).await;

    fs::write(
        cfg.corpus.root.join("journaling.md"),
        "Journaling helps untangle thoughts by writing them down.",
    )
    .unwrap();
    let rebuilt = index::rebuild_index(&cfg, embedder.as_ref()).await.unwrap();
    assert_eq!(rebuilt.document_count(), built.document_count() + 1);
}

// ============ Retrieval ============

#[tokio::test]
async fn test_retrieval_falls_back_when_model_fails() {
    let tmp = TempDir::new().unwrap();
    let (cfg, index, embedder) = built_index(&tmp).await;
    let service = RetrievalService::new(index, embedder, ScriptedModel::failing(), &cfg.retrieval);

    let answer = service.query("What is box breathing?").await;
    assert!(answer.is_fallback());
    assert!(service.try_query("What is box breathing?").await.is_err());
}

#[tokio::test]
async fn test_retrieval_requires_relevant_passages() {
    let tmp = TempDir::new().unwrap();
    let (cfg, index, embedder) = built_index(&tmp).await;
    let model = ScriptedModel::replying("should not be asked");
    let service = RetrievalService::new(index, embedder, model.clone(), &cfg.retrieval);

    // every word is too short to embed, so nothing clears the threshold
    let answer = service.query("is it ok?").await;
    assert!(answer.is_fallback());
    assert!(model.prompts().is_empty());
}

// ============ Session ============

#[tokio::test]
async fn test_scripted_session_outputs() {
    let model = ScriptedModel::replying("That sounds really hard. I'm here with you.");
    let (_tmp, mut session, output, _shutdown) = session_with(
        &[
            Some("I just want to end it all"),
            Some("I had a rough day at work"),
            None,
        ],
        model,
    )
    .await;

    assert_eq!(session.step().await, &State::Listening);

    assert!(matches!(session.step().await, State::Evaluating(_)));
    assert!(matches!(session.step().await, State::Responding(_)));
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(session.last_turn().unwrap().branch, Branch::Crisis);

    assert!(matches!(session.step().await, State::Evaluating(_)));
    assert!(matches!(session.step().await, State::Responding(_)));
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(session.last_turn().unwrap().branch, Branch::Supportive);

    // timeout
    assert_eq!(session.step().await, &State::Listening);

    let spoken = output.spoken();
    assert_eq!(spoken.len(), 3);
    assert!(spoken[0].starts_with("Hello, I'm Sage."));
    assert_eq!(spoken[1], crisis::resources());
    assert_eq!(spoken[2], "That sounds really hard. I'm here with you.");

    let stats = session.stats();
    assert_eq!(stats.turns, 2);
    assert_eq!(stats.crisis_turns, 1);
    assert_eq!(stats.timeouts, 1);
}

#[tokio::test]
async fn test_crisis_preempts_question_shaped_input() {
    let model = ScriptedModel::replying("generated");
    let (_tmp, mut session, output, _shutdown) =
        session_with(&[Some("How do I stop thinking about suicide?")], model.clone()).await;

    for _ in 0..4 {
        session.step().await;
    }
    assert_eq!(session.state(), &State::Listening);
    assert_eq!(output.spoken()[1], crisis::resources());
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn test_model_failure_still_completes_turn() {
    let (_tmp, mut session, output, _shutdown) =
        session_with(&[Some("I feel lonely tonight")], ScriptedModel::failing()).await;

    session.step().await;
    session.step().await;
    assert!(matches!(session.step().await, State::Responding(_)));
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(output.spoken()[1], RESPONSE_FALLBACK);
}

#[tokio::test]
async fn test_informational_input_uses_retrieved_reference() {
    let model = ScriptedModel::replying("Try box breathing together with me.");
    let (_tmp, mut session, _output, _shutdown) =
        session_with(&[Some("What is box breathing?")], model.clone()).await;

    for _ in 0..4 {
        session.step().await;
    }
    assert_eq!(session.last_turn().unwrap().branch, Branch::Informational);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Query: What is box breathing?"));
    assert!(prompts[1].contains("[Reference information]"));
    assert!(prompts[1].contains("Try box breathing together with me."));
}

#[tokio::test]
async fn test_coping_category_adds_strategies() {
    let model = ScriptedModel::replying("ok");
    let (_tmp, mut session, _output, _shutdown) =
        session_with(&[Some("I feel so anxious today")], model.clone()).await;

    for _ in 0..4 {
        session.step().await;
    }
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Here are some strategies that might help with anxiety:"));
}

#[tokio::test]
async fn test_shutdown_terminates_with_farewell() {
    let (_tmp, mut session, output, shutdown) =
        session_with(&[Some("hello")], ScriptedModel::replying("hi")).await;

    session.step().await;
    shutdown.trigger();
    assert_eq!(session.step().await, &State::Terminated);
    assert_eq!(session.step().await, &State::Terminated);

    let spoken = output.spoken();
    assert_eq!(spoken.last().unwrap(), "Goodbye! Take care of yourself.");
    assert!(output.closed.load(Ordering::SeqCst));
    assert_eq!(output.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_closed_input_ends_session() {
    let (_tmp, mut session, output, _shutdown) =
        session_with(&[None, Some("thanks")], ScriptedModel::replying("You're welcome.")).await;

    let stats = session.run().await;
    assert_eq!(session.state(), &State::Terminated);
    assert_eq!(stats.turns, 1);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(
        output.spoken(),
        vec![
            "Hello, I'm Sage. I'm here to listen and support you. How are you feeling today?".to_string(),
            "You're welcome.".to_string(),
            "Goodbye! Take care of yourself.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_speech_failure_still_returns_to_listening() {
    let (_tmp, mut session, output, _shutdown) =
        session_with(&[Some("I had a rough day")], ScriptedModel::replying("I'm sorry.")).await;

    session.step().await;
    output.broken.store(true, Ordering::SeqCst);

    assert!(matches!(session.step().await, State::Evaluating(_)));
    assert!(matches!(session.step().await, State::Responding(_)));
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(session.stats().turns, 1);
    assert_eq!(session.last_turn().unwrap().output, "I'm sorry.");
    assert_eq!(output.spoken().len(), 1);
}

#[tokio::test]
async fn test_input_device_error_counts_as_no_input() {
    let input = ScriptedInput::from_results(vec![
        Err(SpeechInputError::Device("microphone unplugged".to_string())),
        Ok(Some("hello again".to_string())),
    ]);
    let (_tmp, mut session, _output, _shutdown) =
        build_session(input, ScriptedModel::replying("Hi."), |_| {}).await;

    session.step().await;
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(session.stats().timeouts, 0);
    assert_eq!(
        session.step().await,
        &State::Evaluating("hello again".to_string())
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_pending_listen() {
    let (_tmp, mut session, output, shutdown) =
        build_session(SilentInput, ScriptedModel::replying("hi"), |_| {}).await;

    session.step().await;
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();
    });

    let state = tokio::time::timeout(Duration::from_secs(2), session.step())
        .await
        .expect("listen should end on shutdown")
        .clone();
    assert_eq!(state, State::Terminated);
    assert_eq!(
        output.spoken().last().unwrap(),
        "Goodbye! Take care of yourself."
    );
}

#[tokio::test]
async fn test_phrase_ending_after_listen_timeout_is_heard() {
    let input = DelayedInput {
        delay: Duration::from_millis(1500),
        phrase: Some("I couldn't sleep last night".to_string()),
    };
    let (_tmp, mut session, _output, _shutdown) =
        build_session(input, ScriptedModel::replying("ok"), |cfg| {
            cfg.session.listen_timeout_secs = 1;
            cfg.session.phrase_limit_secs = 10;
        })
        .await;

    session.step().await;
    assert_eq!(
        session.step().await,
        &State::Evaluating("I couldn't sleep last night".to_string())
    );
    assert_eq!(session.stats().timeouts, 0);
}

#[tokio::test]
async fn test_listen_past_phrase_limit_is_a_timeout() {
    let input = DelayedInput {
        delay: Duration::from_secs(30),
        phrase: Some("too late".to_string()),
    };
    let (_tmp, mut session, _output, _shutdown) =
        build_session(input, ScriptedModel::replying("ok"), |cfg| {
            cfg.session.listen_timeout_secs = 1;
            cfg.session.phrase_limit_secs = 1;
        })
        .await;

    session.step().await;
    assert_eq!(session.step().await, &State::Listening);
    assert_eq!(session.stats().timeouts, 1);
}

#[test]
fn test_runtime_shuts_down_while_console_is_idle() {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let state = rt.block_on(async {
            let input = ConsoleInput::from_reader(std::io::BufReader::new(IdleTerminal));
            let (_tmp, mut session, _output, shutdown) =
                build_session(input, ScriptedModel::replying("hi"), |_| {}).await;

            session.step().await;
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.trigger();
            });
            session.run().await;
            session.state().clone()
        });
        drop(rt);
        done_tx.send(state).unwrap();
    });

    let state = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("runtime did not shut down with the console still open");
    assert_eq!(state, State::Terminated);
}
