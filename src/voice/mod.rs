//! Voice I/O adapter — speech capture and playback behind one trait.
//!
//! # Overview
//!
//! A capture session is single-shot: the adapter sends exactly one
//! [`CaptureEvent::Result`] or [`CaptureEvent::Error`], always followed by
//! [`CaptureEvent::End`].  When capture is unavailable on the host, the error
//! and the end are sent immediately and no session starts.
//!
//! Playback is fire-and-forget: [`VoiceIo::speak`] returns at once and a new
//! utterance cancels the one still playing.
//!
//! Two adapters ship with the crate:
//!
//! * [`NullVoice`] — no capability at all; every capture fails with
//!   [`CaptureError::Unavailable`] and playback is silent.
//! * [`CommandVoice`] — drives external TTS / STT programs configured in
//!   [`VoiceConfig`](crate::config::VoiceConfig).

pub mod capture;
pub mod command;

pub use capture::{CaptureError, CaptureEvent};
pub use command::CommandVoice;

use tokio::sync::mpsc::UnboundedSender;

// ---------------------------------------------------------------------------
// VoiceIo trait
// ---------------------------------------------------------------------------

/// Host speech capability.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn VoiceIo>`.
pub trait VoiceIo: Send + Sync {
    /// Start speaking `text`, cancelling any utterance in progress.
    fn speak(&self, text: &str);

    /// Begin one capture session, reporting its lifecycle on `events`.
    fn start_capture(&self, events: UnboundedSender<CaptureEvent>);
}

// ---------------------------------------------------------------------------
// NullVoice
// ---------------------------------------------------------------------------

/// Adapter for hosts without any speech capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVoice;

impl VoiceIo for NullVoice {
    fn speak(&self, _text: &str) {}

    fn start_capture(&self, events: UnboundedSender<CaptureEvent>) {
        log::debug!("voice: capture requested but no speech engine is configured");
        let _ = events.send(CaptureEvent::Error(CaptureError::Unavailable));
        let _ = events.send(CaptureEvent::End);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn null_voice_reports_unavailable_then_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        NullVoice.start_capture(tx);

        assert_eq!(
            rx.try_recv().unwrap(),
            CaptureEvent::Error(CaptureError::Unavailable)
        );
        assert_eq!(rx.try_recv().unwrap(), CaptureEvent::End);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn null_voice_survives_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        NullVoice.start_capture(tx);
        NullVoice.speak("hello");
    }
}
