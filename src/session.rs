//! Conversation orchestrator.
//!
//! A single sequential state machine:
//!
//! ```text
//! Greeting ─▶ Listening ─▶ Evaluating(text) ─▶ Responding(turn) ─┐
//!                 ▲  │ timeout / silence                          │
//!                 │  └───────────┘                                │
//!                 └───────────────────────────────────────────────┘
//!
//! shutdown (any step) ─▶ Terminated
//! ```
//!
//! Crisis language always takes the crisis branch, whatever else the input
//! looks like. Other input gets a generated reply, informed by a retrieved
//! answer when it reads as a question and by coping strategies when it
//! names a feeling the strategy table knows.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::coping;
use crate::crisis::{self, CrisisCheck};
use crate::error::SpeechInputError;
use crate::models::{Branch, Turn};
use crate::responder::{Responder, ResponseContext};
use crate::retrieval::RetrievalService;
use crate::speech::{SpeechInput, SpeechOutput};

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Greeting,
    Listening,
    Evaluating(String),
    Responding(Turn),
    Terminated,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Greeting => "greeting",
            State::Listening => "listening",
            State::Evaluating(_) => "evaluating",
            State::Responding(_) => "responding",
            State::Terminated => "terminated",
        }
    }
}

/// Counters logged when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub turns: usize,
    pub crisis_turns: usize,
    pub timeouts: usize,
}

/// Cloneable shutdown flag shared between the signal handler and the
/// session.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger on the first Ctrl-C.
    pub fn listen_for_ctrl_c(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, ending session");
                    shutdown.trigger();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Session<I: SpeechInput> {
    input: I,
    output: Box<dyn SpeechOutput>,
    retrieval: Arc<RetrievalService>,
    responder: Responder,
    config: SessionConfig,
    shutdown: Shutdown,
    state: State,
    stats: SessionStats,
    last_turn: Option<Turn>,
}

impl<I: SpeechInput> Session<I> {
    pub fn new(
        input: I,
        output: Box<dyn SpeechOutput>,
        retrieval: Arc<RetrievalService>,
        responder: Responder,
        config: SessionConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            input,
            output,
            retrieval,
            responder,
            config,
            shutdown,
            state: State::Greeting,
            stats: SessionStats::default(),
            last_turn: None,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The most recently completed turn.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.last_turn.as_ref()
    }

    /// Step until terminated.
    pub async fn run(&mut self) -> SessionStats {
        while self.state != State::Terminated {
            self.step().await;
        }
        self.stats
    }

    /// Perform one transition.
    pub async fn step(&mut self) -> &State {
        if self.state == State::Terminated {
            return &self.state;
        }
        if self.shutdown.is_triggered() {
            self.terminate().await;
            return &self.state;
        }

        let current = std::mem::replace(&mut self.state, State::Listening);
        debug!(state = current.name(), "step");

        self.state = match current {
            State::Greeting => {
                let greeting = self.config.greeting.clone();
                self.speak(&greeting).await;
                State::Listening
            }
            State::Listening => match self.listen().await {
                Heard::Text(text) => State::Evaluating(text),
                Heard::Nothing => State::Listening,
                Heard::Stop => {
                    self.terminate().await;
                    return &self.state;
                }
            },
            State::Evaluating(text) => State::Responding(self.evaluate(text).await),
            State::Responding(turn) => {
                self.speak(&turn.output).await;
                self.record(turn);
                State::Listening
            }
            State::Terminated => State::Terminated,
        };
        &self.state
    }

    async fn listen(&mut self) -> Heard {
        let timeout = self.config.listen_timeout();
        let phrase_limit = self.config.phrase_limit();
        let mut stop = self.shutdown.subscribe();

        // A phrase may start just before `timeout` and run for `phrase_limit`.
        let guard = timeout + phrase_limit;
        let heard = tokio::select! {
            _ = signalled(&mut stop) => return Heard::Stop,
            heard = tokio::time::timeout(guard, self.input.listen(timeout, phrase_limit)) => heard,
        };

        match heard {
            Err(_) | Ok(Ok(None)) => {
                self.stats.timeouts += 1;
                debug!("no speech before timeout");
                Heard::Nothing
            }
            Ok(Ok(Some(audio))) => {
                let text = self.input.transcribe(audio).await;
                let text = text.trim();
                if text.is_empty() {
                    debug!("nothing recognized");
                    Heard::Nothing
                } else {
                    Heard::Text(text.to_string())
                }
            }
            Ok(Err(SpeechInputError::Closed)) => {
                info!("speech input closed");
                Heard::Stop
            }
            Ok(Err(e)) => {
                warn!(error = %e, "listening failed");
                Heard::Nothing
            }
        }
    }

    async fn evaluate(&self, input: String) -> Turn {
        if let CrisisCheck::Crisis { resources, keyword } = crisis::check(&input) {
            warn!(keyword, "crisis language detected, sharing resources");
            return Turn {
                input,
                branch: Branch::Crisis,
                output: resources,
            };
        }

        let mut context = ResponseContext::default();
        let branch = if is_informational(&input) {
            let answer = self.retrieval.query(&input).await;
            if !answer.is_fallback() {
                context.reference = Some(answer.text);
            }
            Branch::Informational
        } else {
            Branch::Supportive
        };

        if let Some(category) = coping::category_for(&input) {
            debug!(category = category.key, "coping category matched");
            context.strategies = Some(coping::strategies_for(category.key));
        }

        let output = self.responder.respond_with(&input, &context).await;
        Turn {
            input,
            branch,
            output,
        }
    }

    async fn speak(&self, text: &str) {
        if let Err(e) = self.output.synthesize(text).await {
            warn!(error = %e, "speech output failed");
        }
    }

    fn record(&mut self, turn: Turn) {
        self.stats.turns += 1;
        if turn.branch == Branch::Crisis {
            self.stats.crisis_turns += 1;
        }
        info!(
            turn = self.stats.turns,
            branch = turn.branch.as_str(),
            input_chars = turn.input.chars().count(),
            output_chars = turn.output.chars().count(),
            "turn complete"
        );
        self.last_turn = Some(turn);
    }

    async fn terminate(&mut self) {
        self.state = State::Terminated;
        let farewell = self.config.farewell.clone();
        self.speak(&farewell).await;
        self.output.close().await;
        self.input.close().await;
        info!(
            turns = self.stats.turns,
            crisis_turns = self.stats.crisis_turns,
            timeouts = self.stats.timeouts,
            "session ended"
        );
    }
}

enum Heard {
    Text(String),
    Nothing,
    Stop,
}

async fn signalled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

const QUESTION_OPENERS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "should", "is", "are",
    "do", "does", "tell me", "explain",
];

/// Whether `text` reads as a request for information rather than sharing.
pub fn is_informational(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.contains('?') {
        return true;
    }
    QUESTION_OPENERS.iter().any(|opener| {
        lower
            .strip_prefix(opener)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(|c: char| !c.is_alphanumeric()))
    })
}
