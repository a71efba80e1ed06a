//! Capture session events and failure classification.

use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

/// One step of a capture session's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The recognised transcript.
    Result(String),
    /// The session failed.
    Error(CaptureError),
    /// The session is over.  May arrive more than once.
    End,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Why a capture session produced no transcript.
///
/// The display string is what lands in the transcript, so every class carries
/// its own code and a Bangla explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No speech recognition engine on this host.
    #[error("SPEECH_ENGINE_NOT_FOUND: এই সিস্টেমে স্পিচ রিকগনিশন সাপোর্ট করে না।")]
    Unavailable,

    /// The engine exists but could not be started.
    #[error("RECOGNITION_INIT_FAILED: সিস্টেম রিস্টার্ট করুন।")]
    InitFailed,

    #[error("NO_INPUT_DETECTED: কোন শব্দ শোনা যাচ্ছে না।")]
    NoSpeech,

    #[error("ACCESS_DENIED: মাইক্রোফোন ব্যবহারের অনুমতি নেই।")]
    PermissionDenied,

    /// Recognition needs the network and the network failed.
    #[error("UPLINK_FAILURE: ইন্টারনেট সংযোগে সমস্যা। ভয়েস সার্ভার ডিসকানেক্টেড।")]
    Network,

    #[error("VOICE_FAULT: aborted")]
    Aborted,

    /// Any reason code not classified above.
    #[error("VOICE_FAULT: {0}")]
    Other(String),
}

impl CaptureError {
    /// Classify a host reason code such as `"no-speech"` or `"not-allowed"`.
    ///
    /// ```
    /// use shohayok::voice::CaptureError;
    ///
    /// assert_eq!(CaptureError::from_code("no-speech"), CaptureError::NoSpeech);
    /// assert_eq!(CaptureError::from_code("network"), CaptureError::Network);
    /// assert_eq!(
    ///     CaptureError::from_code("bad-grammar"),
    ///     CaptureError::Other("bad-grammar".into())
    /// );
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "no-speech" => Self::NoSpeech,
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            "" => Self::Other("unknown".into()),
            other => Self::Other(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
