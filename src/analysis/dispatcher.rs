use super::{AnalysisRequest, AnalysisResult, TextGenerator};
use crate::sink::{StatusEvent, StatusSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fire-and-forget analysis on a dedicated worker pool.
///
/// Requests are independent: no ordering, no deduplication, no caching.
/// Results land in the status sink as [`StatusEvent::Analysis`].
pub struct Dispatcher {
    generator: Arc<dyn TextGenerator>,
    pool: rayon::ThreadPool,
    sink: StatusSink,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// `threads == 0` lets rayon pick the pool size
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sink: StatusSink,
        threads: usize,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("analysis-{}", i))
            .build()?;

        Ok(Self {
            generator,
            pool,
            sink,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn generator(&self) -> Arc<dyn TextGenerator> {
        Arc::clone(&self.generator)
    }

    /// Queue a request and return immediately
    pub fn submit(&self, request: AnalysisRequest) {
        let generator = Arc::clone(&self.generator);
        let sink = self.sink.clone();
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path = %request.file_path.display(), "analysis queued");

        self.pool.spawn(move || {
            let outcome = generator.generate(&request.prompt);
            if let Err(e) = &outcome {
                tracing::warn!(path = %request.file_path.display(), error = %e, "analysis failed");
            }
            sink.append(StatusEvent::Analysis(AnalysisResult {
                file_path: request.file_path,
                outcome,
            }));
            // Decrement after the append so `in_flight() == 0` means every
            // result is already in the sink.
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Requests submitted but not yet reported
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Poll until nothing is in flight or `timeout` elapses; true when idle
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}
