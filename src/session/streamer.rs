//! Incremental reveal of a fully received reply
//!
//! The reply is split into whitespace and non-whitespace runs; one run is
//! appended per tick and the accumulated text is written to a sink. Pacing is
//! a [`DelayPolicy`] so tests can run without timers.

use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Decides how long to wait between two ticks
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly distributed delay within an inclusive range
#[derive(Debug, Clone, Copy)]
pub struct RandomDelay {
    min_ms: u64,
    max_ms: u64,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (a, b) = (min.as_millis() as u64, max.as_millis() as u64);
        Self {
            min_ms: a.min(b),
            max_ms: a.max(b),
        }
    }
}

impl Default for RandomDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(30), Duration::from_millis(80))
    }
}

impl DelayPolicy for RandomDelay {
    fn next_delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

/// The same delay on every tick
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn zero() -> Self {
        Self(Duration::ZERO)
    }
}

impl DelayPolicy for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

/// Receives the accumulated text after every tick
pub trait StreamSink: Send + Sync {
    fn write(&self, text: &str);
}

impl<F> StreamSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, text: &str) {
        self(text)
    }
}

/// Split into alternating runs of whitespace and non-whitespace.
///
/// Concatenating the result yields the input exactly.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(current) if current != space => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// How a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// All tokens were written; carries the final text
    Completed(String),
    /// Superseded by another stream or cancelled explicitly
    Cancelled,
}

/// A running stream; await [`StreamTask::finished`] for its completion
pub struct StreamTask {
    handle: JoinHandle<String>,
}

impl StreamTask {
    pub async fn finished(self) -> StreamOutcome {
        match self.handle.await {
            Ok(text) => StreamOutcome::Completed(text),
            Err(e) if e.is_cancelled() => StreamOutcome::Cancelled,
            Err(e) => {
                warn!("Stream task failed: {}", e);
                StreamOutcome::Cancelled
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Drives at most one stream at a time
pub struct ResponseStreamer {
    delay: Arc<dyn DelayPolicy>,
    active: Mutex<Option<AbortHandle>>,
}

impl ResponseStreamer {
    pub fn new(delay: Arc<dyn DelayPolicy>) -> Self {
        Self {
            delay,
            active: Mutex::new(None),
        }
    }

    /// A streamer that never sleeps between ticks
    pub fn instant() -> Self {
        Self::new(Arc::new(FixedDelay::zero()))
    }

    /// Start revealing `full_text` into `sink`, cancelling any prior stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(&self, full_text: impl Into<String>, sink: Arc<dyn StreamSink>) -> StreamTask {
        let full_text = full_text.into();
        let delay = Arc::clone(&self.delay);

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!("Cancelling superseded stream");
            previous.abort();
        }

        let handle = tokio::spawn(async move {
            let tokens: Vec<String> = tokenize(&full_text).into_iter().map(String::from).collect();
            let mut accumulated = String::with_capacity(full_text.len());

            for (i, token) in tokens.iter().enumerate() {
                accumulated.push_str(token);
                sink.write(&accumulated);

                if i + 1 < tokens.len() {
                    let pause = delay.next_delay();
                    if pause.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(pause).await;
                    }
                }
            }

            accumulated
        });

        *active = Some(handle.abort_handle());
        StreamTask { handle }
    }

    /// Abort the active stream, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.active.lock().take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Default for ResponseStreamer {
    fn default() -> Self {
        Self::new(Arc::new(RandomDelay::default()))
    }
}

impl Drop for ResponseStreamer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_sink() -> (Arc<Mutex<Vec<String>>>, Arc<dyn StreamSink>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&writes);
        let sink: Arc<dyn StreamSink> = Arc::new(move |text: &str| {
            captured.lock().push(text.to_string());
        });
        (writes, sink)
    }

    #[test]
    fn test_tokenize_keeps_whitespace_runs() {
        assert_eq!(
            tokenize("Hello  there\nfriend "),
            vec!["Hello", "  ", "there", "\n", "friend", " "]
        );
    }

    #[test]
    fn test_tokenize_is_lossless() {
        let samples = ["", " ", "one", "  lead and trail  ", "tabs\tand\r\nnewlines", "naïve café ✨ ok"];
        for sample in samples {
            assert_eq!(tokenize(sample).concat(), sample);
        }
    }

    #[test]
    fn test_random_delay_stays_in_range() {
        let policy = RandomDelay::new(Duration::from_millis(80), Duration::from_millis(30));
        for _ in 0..200 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_millis(30) && d <= Duration::from_millis(80));
        }
    }

    #[tokio::test]
    async fn test_stream_reconstructs_text() {
        let streamer = ResponseStreamer::instant();
        let (writes, sink) = recording_sink();
        let text = "Streaming  keeps\n\tevery   gap ";

        let outcome = streamer.stream(text, sink).finished().await;

        assert_eq!(outcome, StreamOutcome::Completed(text.to_string()));
        let writes = writes.lock();
        assert_eq!(writes.last().map(String::as_str), Some(text));
        assert_eq!(writes.len(), tokenize(text).len());
        // Every write extends the previous one
        for pair in writes.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[tokio::test]
    async fn test_empty_text_completes_immediately() {
        let streamer = ResponseStreamer::instant();
        let (writes, sink) = recording_sink();

        let outcome = streamer.stream("", sink).finished().await;

        assert_eq!(outcome, StreamOutcome::Completed(String::new()));
        assert!(writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_new_stream_cancels_previous() {
        let streamer = ResponseStreamer::new(Arc::new(FixedDelay(Duration::from_millis(20))));
        let (first_writes, first_sink) = recording_sink();
        let (_, second_sink) = recording_sink();

        let first = streamer.stream("a b c d e f g h", first_sink);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = streamer.stream("done", second_sink);

        assert_eq!(first.finished().await, StreamOutcome::Cancelled);
        assert_eq!(second.finished().await, StreamOutcome::Completed("done".to_string()));
        assert!(first_writes.lock().len() < tokenize("a b c d e f g h").len());
    }

    #[tokio::test]
    async fn test_cancel_stops_active_stream() {
        let streamer = ResponseStreamer::new(Arc::new(FixedDelay(Duration::from_millis(20))));
        let (_, sink) = recording_sink();

        let task = streamer.stream("one two three", sink);
        assert!(streamer.is_active());
        streamer.cancel();

        assert_eq!(task.finished().await, StreamOutcome::Cancelled);
        assert!(!streamer.is_active());
    }
}
