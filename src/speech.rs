//! Speech input and output boundaries.
//!
//! Sage never talks to audio hardware directly. A [`SpeechInput`] yields
//! captured audio and turns it into text; a [`SpeechOutput`] speaks a
//! complete reply. Adapters shipped here:
//!
//! | Adapter | Boundary | Behavior |
//! |---------|----------|----------|
//! | [`ConsoleInput`] | input | typed lines stand in for transcribed speech |
//! | [`ConsoleOutput`] | output | prints `Sage: …` to stdout |
//! | [`CommandSpeaker`] | output | runs a TTS program (`say`, `espeak`, …) with the text as its last argument |

use std::io::BufRead;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SpeechConfig;
use crate::error::{SpeechInputError, SpeechOutputError};

/// Source of user utterances.
#[async_trait]
pub trait SpeechInput: Send {
    /// Captured audio for one phrase.
    type Audio: Send;

    /// Wait up to `timeout` for speech to start and capture at most
    /// `phrase_limit` of it. `Ok(None)` means nothing was heard.
    async fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Option<Self::Audio>, SpeechInputError>;

    /// Recognize `audio`. Returns an empty string when nothing could be
    /// recognized.
    async fn transcribe(&mut self, audio: Self::Audio) -> String;

    /// Release the input device.
    async fn close(&mut self) {}
}

/// Sink for spoken replies.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text` and return once playback has finished.
    async fn synthesize(&self, text: &str) -> Result<(), SpeechOutputError>;

    /// Release the output device. Later calls to `synthesize` fail.
    async fn close(&self);
}

// ============ Console input ============

/// Reads one line per utterance.
///
/// Lines are read on a dedicated thread and handed over through a channel.
/// A blocked read never holds up runtime shutdown: the reader thread is
/// detached and dies with the process.
///
/// The phrase limit does not apply to typed input.
pub struct ConsoleInput {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let spawned = std::thread::Builder::new()
            .name("sage-console-input".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "cannot start console reader, input is closed");
        }
        Self { lines: rx }
    }
}

#[async_trait]
impl SpeechInput for ConsoleInput {
    type Audio = String;

    async fn listen(
        &mut self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, SpeechInputError> {
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(Ok(line))) => Ok(Some(line)),
            Ok(None) => Err(SpeechInputError::Closed),
            Ok(Some(Err(e))) => Err(SpeechInputError::Device(e.to_string())),
        }
    }

    async fn transcribe(&mut self, audio: String) -> String {
        audio.trim().to_string()
    }

    async fn close(&mut self) {
        self.lines.close();
    }
}

// ============ Console output ============

pub struct ConsoleOutput {
    speaker: String,
    closed: AtomicBool,
}

impl ConsoleOutput {
    pub fn new(speaker: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SpeechOutput for ConsoleOutput {
    async fn synthesize(&self, text: &str) -> Result<(), SpeechOutputError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SpeechOutputError::Synthesis("output is closed".to_string()));
        }
        if text.trim().is_empty() {
            return Err(SpeechOutputError::EmptyText);
        }
        println!("{}: {}", self.speaker, text);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============ Command output ============

/// Speaks through an external TTS program on a blocking worker.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    closed: AtomicBool,
}

impl CommandSpeaker {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SpeechOutput for CommandSpeaker {
    async fn synthesize(&self, text: &str) -> Result<(), SpeechOutputError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SpeechOutputError::Synthesis("output is closed".to_string()));
        }
        if text.trim().is_empty() {
            return Err(SpeechOutputError::EmptyText);
        }

        let program = self.program.clone();
        let args = self.args.clone();
        let text = text.to_string();
        debug!(program = %program, chars = text.chars().count(), "speaking");

        let output = tokio::task::spawn_blocking(move || {
            Command::new(&program).args(&args).arg(&text).output()
        })
        .await
        .map_err(|e| SpeechOutputError::Worker(e.to_string()))?
        .map_err(|e| SpeechOutputError::Synthesis(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(SpeechOutputError::Synthesis(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Create the output adapter named by `config.output`.
pub fn create_output(
    config: &SpeechConfig,
    speaker: &str,
) -> Result<Box<dyn SpeechOutput>, SpeechOutputError> {
    match config.output.as_str() {
        "console" => Ok(Box::new(ConsoleOutput::new(speaker))),
        "command" => {
            let program = config.command.as_deref().ok_or_else(|| {
                SpeechOutputError::Synthesis("speech.command is not set".to_string())
            })?;
            Ok(Box::new(CommandSpeaker::new(program, &config.args)))
        }
        other => Err(SpeechOutputError::Synthesis(format!(
            "unknown speech output '{}'",
            other
        ))),
    }
}
