//! Background execution of fetch and generate jobs.
//!
//! Each job runs on its own thread and reports back over a channel. At most
//! one job of each kind is in flight; a second request is rejected with
//! [`TriageError::Busy`] rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TriageError};
use crate::model::mail::NormalizedEmail;
use crate::pipeline::normalize_batch;
use crate::reply::ReplyGenerator;
use crate::source::MessageSource;

/// A mailbox shared between the caller and the fetch thread.
pub type SharedSource = Arc<Mutex<Box<dyn MessageSource>>>;

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Fetch,
    Generate,
}

impl JobKind {
    fn label(self) -> &'static str {
        match self {
            JobKind::Fetch => "fetch",
            JobKind::Generate => "generate",
        }
    }
}

/// Completion reports from background jobs.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A fetch cycle finished; on success the batch is already normalized.
    Fetched(Result<Vec<NormalizedEmail>>),
    /// A reply was generated for `identifier`. Generation never fails.
    Generated { identifier: String, reply: String },
}

/// Clears the in-flight flag when the job ends, even by panic.
///
/// Jobs drop it only after their report is sent, so an idle kind never has
/// a report still pending delivery.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>, kind: JobKind) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TriageError::Busy(kind.label()))?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs jobs off the calling thread.
pub struct Worker {
    generator: Arc<ReplyGenerator>,
    fetch_busy: Arc<AtomicBool>,
    generate_busy: Arc<AtomicBool>,
    tx: mpsc::Sender<WorkerEvent>,
    rx: mpsc::Receiver<WorkerEvent>,
}

impl Worker {
    pub fn new(generator: ReplyGenerator) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generator: Arc::new(generator),
            fetch_busy: Arc::new(AtomicBool::new(false)),
            generate_busy: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Whether a job of `kind` is running.
    pub fn is_busy(&self, kind: JobKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Start a fetch cycle. The result arrives as [`WorkerEvent::Fetched`].
    pub fn spawn_fetch(&self, source: SharedSource, limit: usize, body_cap: usize) -> Result<()> {
        let guard = InFlight::acquire(&self.fetch_busy, JobKind::Fetch)?;
        let tx = self.tx.clone();

        thread::spawn(move || {
            let result = match source.lock() {
                Ok(mut source) => {
                    debug!(source = %source.describe(), limit, "Fetch started");
                    source
                        .fetch_unread(limit)
                        .map(|raws| normalize_batch(&raws, body_cap))
                }
                Err(_) => Err(TriageError::Fetch("mailbox lock poisoned".to_string())),
            };
            match &result {
                Ok(batch) => info!(count = batch.len(), "Fetch finished"),
                Err(e) => info!(error = %e, "Fetch failed"),
            }
            let _ = tx.send(WorkerEvent::Fetched(result));
            drop(guard);
        });
        Ok(())
    }

    /// Start generating a reply for `email`. The result arrives as
    /// [`WorkerEvent::Generated`].
    pub fn spawn_generate(&self, email: &NormalizedEmail) -> Result<()> {
        let guard = InFlight::acquire(&self.generate_busy, JobKind::Generate)?;
        let tx = self.tx.clone();
        let generator = Arc::clone(&self.generator);
        let identifier = email.identifier.clone();
        let (name, subject, body) = (
            email.sender_name.clone(),
            email.subject.clone(),
            email.body_text.clone(),
        );

        thread::spawn(move || {
            debug!(identifier = %identifier, "Generation started");
            let reply = generator.generate(&name, &subject, &body);
            let _ = tx.send(WorkerEvent::Generated { identifier, reply });
            drop(guard);
        });
        Ok(())
    }

    /// Next completion report, if one is ready.
    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next completion report.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    fn flag(&self, kind: JobKind) -> &Arc<AtomicBool> {
        match kind {
            JobKind::Fetch => &self.fetch_busy,
            JobKind::Generate => &self.generate_busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{Receiver, SyncSender};
    use std::time::Instant;

    use super::*;
    use crate::error::GenerationError;
    use crate::model::mail::{MessageBody, Payload, RawMessage};
    use crate::reply::{ReplySettings, TextGenerator};

    const WAIT: Duration = Duration::from_secs(5);

    fn wait_idle(worker: &Worker, kind: JobKind) {
        let deadline = Instant::now() + WAIT;
        while worker.is_busy(kind) {
            assert!(Instant::now() < deadline, "{kind:?} job never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Source that blocks until the test releases it.
    struct GatedSource {
        gate: Mutex<Receiver<()>>,
    }

    impl MessageSource for GatedSource {
        fn fetch_unread(&mut self, _limit: usize) -> Result<Vec<RawMessage>> {
            let _ = self.gate.lock().expect("lock").recv();
            Ok(vec![RawMessage {
                identifier: "0".to_string(),
                headers: vec![("subject".to_string(), "urgent".to_string())],
                body: MessageBody::Single(Payload::new("text/plain", None, "hi")),
            }])
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    fn gated() -> (SharedSource, SyncSender<()>) {
        let (tx, rx) = mpsc::sync_channel(1);
        let source: Box<dyn MessageSource> = Box::new(GatedSource { gate: Mutex::new(rx) });
        (Arc::new(Mutex::new(source)), tx)
    }

    struct GatedGenerator {
        gate: Mutex<Receiver<()>>,
    }

    impl TextGenerator for GatedGenerator {
        fn available(&self) -> bool {
            true
        }

        fn attempt_generate(&self, _: &str, _: usize) -> std::result::Result<String, GenerationError> {
            let _ = self.gate.lock().expect("lock").recv();
            Ok("Reply: That works for me, see you then.".to_string())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    #[test]
    fn test_fetch_reports_batch() {
        let worker = Worker::new(ReplyGenerator::template_only());
        let (source, release) = gated();
        worker.spawn_fetch(source, 10, 100).expect("spawn");
        release.send(()).expect("release");

        // Once the flag clears the report must already be waiting
        wait_idle(&worker, JobKind::Fetch);
        match worker.try_recv() {
            Some(WorkerEvent::Fetched(Ok(batch))) => {
                assert_eq!(batch.len(), 1);
                assert_eq!(batch[0].subject, "urgent");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_second_fetch_rejected_while_busy() {
        let worker = Worker::new(ReplyGenerator::template_only());
        let (source, release) = gated();
        worker.spawn_fetch(Arc::clone(&source), 10, 100).expect("spawn");
        assert!(worker.is_busy(JobKind::Fetch));
        assert!(matches!(
            worker.spawn_fetch(source, 10, 100),
            Err(TriageError::Busy("fetch"))
        ));
        // Other kinds are unaffected
        assert!(!worker.is_busy(JobKind::Generate));

        release.send(()).expect("release");
        assert!(worker.recv_timeout(WAIT).is_some());
    }

    #[test]
    fn test_generate_reports_reply() {
        let (release, gate) = mpsc::sync_channel(1);
        let generator = ReplyGenerator::new(
            Box::new(GatedGenerator { gate: Mutex::new(gate) }),
            ReplySettings::default(),
        );
        let worker = Worker::new(generator);
        let email = NormalizedEmail::new("42", "a@x", "Ann", "Lunch", "Tuesday?", "");

        worker.spawn_generate(&email).expect("spawn");
        assert!(matches!(
            worker.spawn_generate(&email),
            Err(TriageError::Busy("generate"))
        ));
        release.send(()).expect("release");

        wait_idle(&worker, JobKind::Generate);
        match worker.try_recv() {
            Some(WorkerEvent::Generated { identifier, reply }) => {
                assert_eq!(identifier, "42");
                assert!(reply.starts_with("That works for me"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
