//! Voice adapter that shells out to external TTS / STT programs.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::config::VoiceConfig;

use super::{CaptureError, CaptureEvent, VoiceIo};

// ---------------------------------------------------------------------------
// CommandVoice
// ---------------------------------------------------------------------------

/// [`VoiceIo`] backed by command-line programs such as `espeak-ng`.
///
/// Both methods spawn onto the current Tokio runtime and must be called from
/// within one.
pub struct CommandVoice {
    config: VoiceConfig,
    /// Dropping the sender cancels the utterance that owns the receiver.
    playing: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandVoice {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            config,
            playing: Mutex::new(None),
        }
    }

    /// Whether a TTS program is configured.
    pub fn can_speak(&self) -> bool {
        self.config.tts_program.is_some()
    }

    /// Whether an STT program is configured.
    pub fn can_capture(&self) -> bool {
        self.config.stt_program.is_some()
    }

    /// Full argument list for one playback attempt.
    pub(crate) fn tts_argv(&self, text: &str, with_language: bool) -> Vec<String> {
        let mut argv = Vec::new();
        if with_language {
            argv.extend(substitute(&self.config.tts_language_args, &self.config.language));
        }
        argv.extend(self.config.tts_args.iter().cloned());
        argv.push(text.to_string());
        argv
    }

    pub(crate) fn stt_argv(&self) -> Vec<String> {
        substitute(&self.config.stt_args, &self.config.language)
    }
}

impl VoiceIo for CommandVoice {
    fn speak(&self, text: &str) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        // Replacing the sender cancels the previous utterance.
        *self.playing.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel_tx);

        let Some(program) = self.config.tts_program.clone() else {
            return;
        };
        let attempts = vec![self.tts_argv(text, true), self.tts_argv(text, false)];
        tokio::spawn(play(program, attempts, cancel_rx));
    }

    fn start_capture(&self, events: UnboundedSender<CaptureEvent>) {
        let Some(program) = self.config.stt_program.clone() else {
            let _ = events.send(CaptureEvent::Error(CaptureError::Unavailable));
            let _ = events.send(CaptureEvent::End);
            return;
        };
        let args = self.stt_argv();
        tokio::spawn(async move {
            let event = capture_once(&program, &args).await;
            let _ = events.send(event);
            let _ = events.send(CaptureEvent::End);
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn substitute(args: &[String], language: &str) -> Vec<String> {
    args.iter().map(|a| a.replace("{lang}", language)).collect()
}

/// Run each argument list in turn until one exits successfully.
///
/// Stops early (killing the child) once `cancel` resolves, which happens when
/// the owning sender is replaced by a newer utterance.
async fn play(program: String, attempts: Vec<Vec<String>>, mut cancel: oneshot::Receiver<()>) {
    for (n, argv) in attempts.iter().enumerate() {
        let mut child = match Command::new(&program)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::warn!("voice: cannot start TTS program {program:?}: {e}");
                return;
            }
        };

        tokio::select! {
            status = child.wait() => match status {
                Ok(s) if s.success() => return,
                Ok(s) => log::debug!("voice: TTS attempt {} exited with {s}", n + 1),
                Err(e) => {
                    log::warn!("voice: waiting for TTS program failed: {e}");
                    return;
                }
            },
            _ = &mut cancel => {
                let _ = child.start_kill();
                log::debug!("voice: utterance cancelled");
                return;
            }
        }
    }
    log::warn!("voice: TTS program {program:?} failed with and without a language voice");
}

/// Run the STT program once and classify its outcome.
async fn capture_once(program: &str, args: &[String]) -> CaptureEvent {
    log::debug!("voice: starting capture with {program:?}");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(o) => o,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("voice: STT program {program:?} not found");
            return CaptureEvent::Error(CaptureError::Unavailable);
        }
        Err(e) => {
            log::warn!("voice: cannot start STT program {program:?}: {e}");
            return CaptureEvent::Error(CaptureError::InitFailed);
        }
    };

    if !output.status.success() {
        let code = String::from_utf8_lossy(&output.stderr);
        return CaptureEvent::Error(CaptureError::from_code(code.trim()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        CaptureEvent::Error(CaptureError::NoSpeech)
    } else {
        CaptureEvent::Result(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
