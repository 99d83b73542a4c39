//! Delivery loop
//!
//! Pulls events from an [`EventSource`], serialises and dispatches them, paces
//! itself and tallies completions. Completions are awaited in spawned tasks
//! that report over a channel to a single counter task.

use std::fmt;
use std::future::Future;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace, warn};

use crate::delivery::{Destination, MessageId, Transport, TransportError};
use crate::simulation::{
    DeliveryReport, DeliveryTally, EventSource, SimulationError, SimulationResult,
};
use crate::tally_event;

/// Lifecycle of a [`DeliveryPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Generating and dispatching events
    Running,
    /// No new events; waiting for in-flight completions
    Stopping,
    /// Terminal
    Stopped,
}

/// Completion of one dispatched event
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The transport acknowledged the payload
    Published(MessageId),
    /// The transport rejected the payload
    Failed(TransportError),
}

/// Sink for the periodic progress lines, stderr unless replaced
pub type ProgressWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Sequential generation loop with asynchronous completion tracking
pub struct DeliveryPipeline {
    transport: Arc<dyn Transport>,
    destination: Destination,
    tally: Arc<DeliveryTally>,
    progress_interval: u64,
    progress: ProgressWriter,
    state: PipelineState,
}

impl DeliveryPipeline {
    /// Create a pipeline; a `progress_interval` of 0 disables progress lines
    pub fn new(
        transport: Arc<dyn Transport>,
        destination: Destination,
        progress_interval: u64,
    ) -> Self {
        Self {
            transport,
            destination,
            tally: Arc::new(DeliveryTally::new()),
            progress_interval,
            progress: Arc::new(Mutex::new(Box::new(io::stderr()))),
            state: PipelineState::Running,
        }
    }

    /// Send progress lines to `writer` instead of stderr
    pub fn with_progress_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.progress = Arc::new(Mutex::new(writer));
        self
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Shared delivery counters
    pub fn tally(&self) -> Arc<DeliveryTally> {
        Arc::clone(&self.tally)
    }

    /// Run until `shutdown` resolves or the source fails
    ///
    /// The stop signal is checked before every iteration, so the loop exits
    /// after the iteration in progress. In-flight completions are always
    /// awaited and the transport flushed before returning.
    #[instrument(skip_all, fields(destination = %self.destination))]
    pub async fn run<S, F>(
        &mut self,
        source: &mut S,
        shutdown: F,
    ) -> SimulationResult<DeliveryReport>
    where
        S: EventSource + ?Sized,
        F: Future<Output = ()>,
    {
        if self.state == PipelineState::Stopped {
            return Err(SimulationError::configuration_error("delivery pipeline already stopped"));
        }

        let started = Instant::now();
        self.state = PipelineState::Running;
        info!("Delivery pipeline running");

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let counter = tokio::spawn(count_outcomes(
            outcome_rx,
            Arc::clone(&self.tally),
            self.progress_interval,
            Arc::clone(&self.progress),
            started,
        ));
        let mut in_flight = JoinSet::new();

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stop requested");
                    break Ok(());
                }
                step = self.step(source, &outcome_tx, &mut in_flight) => {
                    if let Err(e) = step {
                        break Err(e);
                    }
                }
            }
            // reap finished completion tasks
            while in_flight.try_join_next().is_some() {}
        };

        self.state = PipelineState::Stopping;
        debug!("Draining {} in-flight completions", in_flight.len());
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!("Completion task failed: {}", e);
            }
        }
        drop(outcome_tx);
        if let Err(e) = counter.await {
            warn!("Counter task failed: {}", e);
        }
        if let Err(e) = self.transport.flush().await {
            warn!("Transport flush failed: {}", e);
        }
        self.state = PipelineState::Stopped;

        match result {
            Ok(()) => {
                tally_event!(info, self.tally, "Delivery pipeline stopped");
                let elapsed = started.elapsed();
                Ok(DeliveryReport::from_tally(&self.tally, elapsed, source.resume_state()))
            }
            Err(e) => {
                tally_event!(error, self.tally, format!("Delivery loop aborted: {}", e));
                Err(e)
            }
        }
    }

    /// One iteration: obtain, serialise, dispatch, pace
    async fn step<S>(
        &self,
        source: &mut S,
        outcomes: &UnboundedSender<DeliveryOutcome>,
        in_flight: &mut JoinSet<()>,
    ) -> SimulationResult<()>
    where
        S: EventSource + ?Sized,
    {
        let Some(event) = source.next_event()? else {
            return Ok(());
        };
        let payload = event.to_payload()?;

        let handle = self.transport.publish(&self.destination, payload);
        self.tally.record_dispatched();

        let outcomes = outcomes.clone();
        in_flight.spawn(async move {
            let outcome = match handle.await {
                Ok(id) => DeliveryOutcome::Published(id),
                Err(e) => DeliveryOutcome::Failed(e),
            };
            if outcomes.send(outcome).is_err() {
                warn!("Completion dropped: counter task is gone");
            }
        });

        let delay = source.next_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

async fn count_outcomes(
    mut outcomes: UnboundedReceiver<DeliveryOutcome>,
    tally: Arc<DeliveryTally>,
    progress_interval: u64,
    progress: ProgressWriter,
    started: Instant,
) {
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            DeliveryOutcome::Published(id) => {
                let published = tally.record_published();
                trace!("Published message {}", id);
                if progress_interval > 0 && published % progress_interval == 0 {
                    let line = format!(
                        "Published {} events ({} failed) in {:.1}s",
                        published,
                        tally.failed(),
                        started.elapsed().as_secs_f64()
                    );
                    write_progress(&progress, &line);
                    tally_event!(info, tally, "Progress");
                }
            }
            DeliveryOutcome::Failed(error) => {
                tally.record_failed();
                SimulationError::DispatchFailure(error).log();
            }
        }
    }
}

fn write_progress(progress: &ProgressWriter, line: &str) {
    match progress.lock() {
        Ok(mut writer) => {
            if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                warn!("Failed to write progress line: {}", e);
            }
        }
        Err(_) => warn!("Progress writer lock poisoned"),
    }
}

impl fmt::Debug for DeliveryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryPipeline")
            .field("transport", &self.transport)
            .field("destination", &self.destination)
            .field("tally", &self.tally)
            .field("progress_interval", &self.progress_interval)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::PublishHandle;
    use crate::events::{Assignment, EventFactory, EventRecord, EventTimestamp, FakerProvider};
    use crate::types::{Distribution, ResumeState, UserId};
    use async_trait::async_trait;
    use futures::FutureExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct RecordingTransport {
        payloads: Mutex<Vec<Vec<u8>>>,
        fail_every: u64,
        calls: AtomicU64,
        flushed: AtomicU64,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn publish(&self, _destination: &Destination, payload: Vec<u8>) -> PublishHandle {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.payloads.lock().unwrap().push(payload);
            let fail = self.fail_every > 0 && call % self.fail_every == 0;
            async move {
                tokio::task::yield_now().await;
                if fail {
                    Err(TransportError::Rejected("nope".to_string()))
                } else {
                    Ok(MessageId(call.to_string()))
                }
            }
            .boxed()
        }

        async fn flush(&self) -> Result<(), TransportError> {
            self.flushed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    enum Step {
        Event,
        Nothing,
        Fail,
    }

    struct ScriptedSource {
        steps: VecDeque<Step>,
        factory: EventFactory,
        rng: StdRng,
        done: Arc<Notify>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, done: Arc<Notify>) -> Self {
            let factory = EventFactory::new(
                Distribution::new().with("app_open", 1.0),
                Distribution::new().with("smartphone", 1.0),
                Arc::new(FakerProvider),
            )
            .unwrap();
            Self { steps: steps.into(), factory, rng: StdRng::seed_from_u64(1), done }
        }

        fn event(&mut self) -> EventRecord {
            self.factory
                .create(
                    &mut self.rng,
                    Assignment::new("US", UserId::new()),
                    EventTimestamp::Micros(0),
                )
                .unwrap()
        }
    }

    impl EventSource for ScriptedSource {
        fn next_event(&mut self) -> SimulationResult<Option<EventRecord>> {
            match self.steps.pop_front() {
                Some(Step::Event) => Ok(Some(self.event())),
                Some(Step::Nothing) => Ok(None),
                Some(Step::Fail) => Err(SimulationError::EmptyDistribution),
                None => {
                    self.done.notify_one();
                    Ok(None)
                }
            }
        }

        fn next_delay(&mut self) -> Duration {
            Duration::from_millis(1)
        }

        fn resume_state(&self) -> Option<ResumeState> {
            Some(ResumeState { virtual_timestamp_micros: 5, virtual_hour: Some(1.0) })
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pipeline(transport: Arc<RecordingTransport>) -> DeliveryPipeline {
        DeliveryPipeline::new(transport, Destination::new("p", "t"), 2)
    }

    #[tokio::test]
    async fn test_publishes_until_stopped() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new(
            vec![Step::Event, Step::Nothing, Step::Event, Step::Event],
            Arc::clone(&done),
        );
        let mut pipeline = pipeline(Arc::clone(&transport));
        assert_eq!(pipeline.state(), PipelineState::Running);

        let report = pipeline.run(&mut source, done.notified()).await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(report.dispatched, 3);
        assert_eq!(report.published, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.resume_state.unwrap().virtual_timestamp_micros, 5);
        assert_eq!(transport.payloads.lock().unwrap().len(), 3);
        assert_eq!(transport.flushed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_line_every_interval() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new((0..5).map(|_| Step::Event).collect(), done.clone());
        let buffer = SharedBuffer::default();
        let mut pipeline = pipeline(transport).with_progress_writer(Box::new(buffer.clone()));

        let report = pipeline.run(&mut source, done.notified()).await.unwrap();
        assert_eq!(report.published, 5);

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2, "progress lines: {:?}", lines);
        assert!(lines[0].starts_with("Published 2 events (0 failed)"));
        assert!(lines[1].starts_with("Published 4 events (0 failed)"));
    }

    #[tokio::test]
    async fn test_progress_disabled_with_zero_interval() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new((0..4).map(|_| Step::Event).collect(), done.clone());
        let buffer = SharedBuffer::default();
        let mut pipeline = DeliveryPipeline::new(transport, Destination::new("p", "t"), 0)
            .with_progress_writer(Box::new(buffer.clone()));

        pipeline.run(&mut source, done.notified()).await.unwrap();
        assert!(buffer.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let transport = Arc::new(RecordingTransport { fail_every: 2, ..Default::default() });
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new((0..6).map(|_| Step::Event).collect(), done.clone());
        let mut pipeline = pipeline(transport);

        let report = pipeline.run(&mut source, done.notified()).await.unwrap();
        assert_eq!(report.published, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(pipeline.tally().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fatal_source_error_stops_pipeline() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let steps = vec![Step::Event, Step::Event, Step::Fail, Step::Event];
        let mut source = ScriptedSource::new(steps, done.clone());
        let mut pipeline = pipeline(Arc::clone(&transport));

        let result = pipeline.run(&mut source, done.notified()).await;
        assert!(matches!(result, Err(SimulationError::EmptyDistribution)));
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        // in-flight completions were drained before returning
        let tally = pipeline.tally();
        assert_eq!(tally.published(), 2);
        assert_eq!(tally.dispatched(), 2);
    }

    #[tokio::test]
    async fn test_stop_before_first_event() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new(vec![Step::Event], done.clone());
        let mut pipeline = pipeline(Arc::clone(&transport));

        let report = pipeline.run(&mut source, futures::future::ready(())).await.unwrap();
        assert_eq!(report.dispatched, 0);
        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_pipeline_cannot_restart() {
        let transport = Arc::new(RecordingTransport::default());
        let done = Arc::new(Notify::new());
        let mut source = ScriptedSource::new(vec![], done.clone());
        let mut pipeline = pipeline(transport);

        pipeline.run(&mut source, futures::future::ready(())).await.unwrap();
        let again = pipeline.run(&mut source, futures::future::ready(())).await;
        assert!(matches!(again, Err(SimulationError::ConfigurationError(_))));
    }
}
