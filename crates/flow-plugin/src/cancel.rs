//! Query generations and cooperative cancellation.
//!
//! Every inbound query begins a new [`Generation`]. Beginning one cancels
//! the token of the generation before it, so work still running for an
//! older query can notice it has been superseded and its results can be
//! discarded.

use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One query's place in the sequence of queries, plus its cancellation token.
#[derive(Debug, Clone)]
pub struct Generation {
    number: u64,
    token: CancellationToken,
}

impl Generation {
    fn first() -> Self {
        Self {
            number: 0,
            token: CancellationToken::new(),
        }
    }

    /// Position of this generation; the first query is generation 1.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns `true` once a newer generation has begun.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when a newer generation begins.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns a signal that handlers can poll or await.
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            token: self.token.clone(),
        }
    }

    /// Waits out a debounce delay.
    ///
    /// Returns `true` if the generation is still current afterwards. Without
    /// a delay this only checks for cancellation.
    pub async fn debounce(&self, delay: Option<Duration>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let Some(delay) = delay else {
            return true;
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => !self.is_cancelled(),
            () = self.token.cancelled() => false,
        }
    }
}

/// Read-only view of a generation's cancellation state, handed to search
/// handlers.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    /// Returns `true` once the query this signal belongs to is superseded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the query this signal belongs to is superseded.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Hands out generations, cancelling each one when the next begins.
///
/// # Mutex Poisoning
///
/// Methods panic if the internal mutex is poisoned.
#[derive(Debug)]
pub struct GenerationController {
    current: Mutex<Generation>,
}

impl Default for GenerationController {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationController {
    /// Creates a controller before any query has arrived.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Generation::first()),
        }
    }

    /// Cancels the current generation and starts the next one.
    pub fn begin(&self) -> Generation {
        let mut current = self
            .current
            .lock()
            .expect("generation mutex should not be poisoned");
        current.token.cancel();
        let next = Generation {
            number: current.number + 1,
            token: CancellationToken::new(),
        };
        *current = next.clone();
        next
    }

    /// Returns the number of the latest generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
            .lock()
            .expect("generation mutex should not be poisoned")
            .number
    }

    /// Returns `true` if `generation` is the latest one.
    #[must_use]
    pub fn is_current(&self, generation: &Generation) -> bool {
        self.current() == generation.number
    }
}
