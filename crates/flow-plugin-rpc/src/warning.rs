//! Warning types for frames dropped during decoding.
//!
//! The decoder follows a best-effort policy: a frame whose body cannot be
//! turned into a [`Message`](crate::Message) is dropped and decoding carries
//! on with the next frame. Each drop is described by a [`Warning`] so the
//! reader can log it, and a [`WarningCollector`] keeps them for inspection.
//!
//! # Examples
//!
//! ```
//! use flow_plugin_rpc::warning::{Warning, WarningCollector};
//!
//! let collector = WarningCollector::new();
//!
//! collector.add(Warning::MalformedJson {
//!     frame_number: 5,
//!     error: "unexpected end of input".to_string(),
//! });
//!
//! let warnings = collector.into_warnings();
//! assert_eq!(warnings.len(), 1);
//! assert_eq!(warnings[0].kind(), "malformed_json");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A non-fatal problem with a single frame.
///
/// Every variant carries the 1-based number of the frame within the stream,
/// counting every header the decoder accepted (dropped frames included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The body was not valid JSON.
    MalformedJson {
        /// The 1-based frame number.
        frame_number: usize,
        /// A description of the JSON parsing error.
        error: String,
    },

    /// The body was valid JSON but neither a request nor a response.
    InvalidMessage {
        /// The 1-based frame number.
        frame_number: usize,
        /// Why the message was rejected.
        reason: String,
    },

    /// The declared body length exceeded the decoder's limit; the body was
    /// skipped without being buffered.
    OversizedFrame {
        /// The 1-based frame number.
        frame_number: usize,
        /// Declared `Content-Length`.
        length: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl Warning {
    /// Returns the frame number associated with this warning.
    #[must_use]
    pub fn frame_number(&self) -> usize {
        match self {
            Self::MalformedJson { frame_number, .. }
            | Self::InvalidMessage { frame_number, .. }
            | Self::OversizedFrame { frame_number, .. } => *frame_number,
        }
    }

    /// Returns a human-readable description of the warning.
    ///
    /// # Examples
    ///
    /// ```
    /// use flow_plugin_rpc::warning::Warning;
    ///
    /// let warning = Warning::OversizedFrame {
    ///     frame_number: 2,
    ///     length: 4096,
    ///     limit: 1024,
    /// };
    /// assert!(warning.description().contains("frame 2"));
    /// assert!(warning.description().contains("4096"));
    /// ```
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::MalformedJson {
                frame_number,
                error,
            } => {
                format!("frame {frame_number}: malformed JSON: {error}")
            }
            Self::InvalidMessage {
                frame_number,
                reason,
            } => {
                format!("frame {frame_number}: invalid message: {reason}")
            }
            Self::OversizedFrame {
                frame_number,
                length,
                limit,
            } => {
                format!("frame {frame_number}: body of {length} bytes exceeds limit of {limit}")
            }
        }
    }

    /// Returns a static string identifying the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::InvalidMessage { .. } => "invalid_message",
            Self::OversizedFrame { .. } => "oversized_frame",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Warning {}

/// A shareable collector for warnings produced while reading a stream.
///
/// Cloning the collector shares the underlying storage, so a clone handed to
/// a reader task observes the same warnings as the original. A bounded
/// collector keeps only the most recent warnings but still counts every one
/// in [`total`](Self::total).
///
/// # Mutex Poisoning
///
/// All methods panic if the internal mutex is poisoned, which only happens if
/// another thread panicked while holding the lock.
#[derive(Debug, Clone, Default)]
pub struct WarningCollector {
    inner: Arc<Mutex<Retained>>,
}

#[derive(Debug, Default)]
struct Retained {
    recent: VecDeque<Warning>,
    total: usize,
    limit: Option<usize>,
}

impl WarningCollector {
    /// Creates a new empty `WarningCollector` that keeps every warning.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector that keeps at most `limit` of the latest warnings.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Retained {
                limit: Some(limit),
                ..Retained::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Retained> {
        self.inner
            .lock()
            .expect("warning collector mutex should not be poisoned")
    }

    /// Adds a warning to the collector, evicting the oldest one if the
    /// collector is full.
    pub fn add(&self, warning: Warning) {
        let mut retained = self.lock();
        retained.total += 1;
        if retained.limit == Some(0) {
            return;
        }
        if retained.limit.is_some_and(|limit| retained.recent.len() >= limit) {
            retained.recent.pop_front();
        }
        retained.recent.push_back(warning);
    }

    /// Returns the number of warnings currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().recent.len()
    }

    /// Returns `true` if no warnings are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of warnings ever added, evicted ones included.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lock().total
    }

    /// Returns a copy of the retained warnings, oldest first.
    #[must_use]
    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().recent.iter().cloned().collect()
    }

    /// Removes all retained warnings and resets the total.
    pub fn clear(&self) {
        let mut retained = self.lock();
        retained.recent.clear();
        retained.total = 0;
    }

    /// Consumes the collector and returns the retained warnings.
    ///
    /// If other clones are still alive the warnings are copied out instead.
    #[must_use]
    pub fn into_warnings(self) -> Vec<Warning> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex
                .into_inner()
                .expect("warning collector mutex should not be poisoned")
                .recent
                .into(),
            Err(shared) => shared
                .lock()
                .expect("warning collector mutex should not be poisoned")
                .recent
                .iter()
                .cloned()
                .collect(),
        }
    }
}
