//! End-to-end tests: simulation context through the delivery pipeline

use appstore_traffic_simulator::delivery::{
    DeliveryPipeline, Destination, HttpTransport, PipelineState, StdoutTransport,
};
use appstore_traffic_simulator::events::{EventRecord, EventTimestamp};
use appstore_traffic_simulator::simulation::{EventSource, SimulationContext, SimulationResult};
use appstore_traffic_simulator::types::{PublisherConfig, ResumeState};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;

const CONFIG: &str = r#"{
    "gcp_project_id": "demo-project",
    "pubsub_topic_name": "app-events",
    "event_type": {"distribution": {"app_open": 0.5, "search": 0.3, "review_submit": 0.2}},
    "device_type": {"distribution": {"phone": 0.9, "tablet": 0.1}},
    "country_infos": {
        "distribution": {"US": 331000000, "JP": 125000000},
        "timezone": {"US": -5, "JP": 9}
    },
    "generation_rate": {"poisson_min_interval_seconds": 0},
    "resume": {"virtual_timestamp_micros": 1760854441420750},
    "seed": 5
}"#;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Stops the run once `limit` events have been produced
struct Limited<S> {
    inner: S,
    produced: usize,
    limit: usize,
    done: Arc<Notify>,
}

impl<S: EventSource> Limited<S> {
    fn new(inner: S, limit: usize) -> Self {
        Self { inner, produced: 0, limit, done: Arc::new(Notify::new()) }
    }
}

impl<S: EventSource> EventSource for Limited<S> {
    fn next_event(&mut self) -> SimulationResult<Option<EventRecord>> {
        if self.produced >= self.limit {
            return Ok(None);
        }
        let event = self.inner.next_event()?;
        if event.is_some() {
            self.produced += 1;
            if self.produced == self.limit {
                self.done.notify_one();
            }
        }
        Ok(event)
    }

    fn next_delay(&mut self) -> Duration {
        self.inner.next_delay()
    }

    fn resume_state(&self) -> Option<ResumeState> {
        self.inner.resume_state()
    }
}

fn config() -> PublisherConfig {
    let config = PublisherConfig::from_json(CONFIG).unwrap();
    config.validate().unwrap();
    config
}

fn stdout_pipeline(config: &PublisherConfig, buffer: &SharedBuffer) -> DeliveryPipeline {
    let transport = StdoutTransport::with_writer(buffer.clone());
    DeliveryPipeline::new(Arc::new(transport), Destination::from_config(config), 0)
}

#[tokio::test]
async fn test_poisson_run_publishes_ndjson() {
    let config = config();
    let buffer = SharedBuffer::default();
    let mut pipeline = stdout_pipeline(&config, &buffer);

    let mut source = Limited::new(SimulationContext::from_config(&config).unwrap(), 250);
    let done = Arc::clone(&source.done);
    let report = pipeline.run(&mut source, async move { done.notified().await }).await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(report.dispatched, 250);
    assert_eq!(report.published, 250);
    assert_eq!(report.failed, 0);

    let lines = buffer.lines();
    assert_eq!(lines.len(), 250);
    let mut last_stamp = 0;
    for line in &lines {
        let event = EventRecord::from_payload(line.as_bytes()).unwrap();
        assert!(event.country_code == "US" || event.country_code == "JP");
        match event.event_timestamp {
            EventTimestamp::Micros(micros) => {
                assert!(micros >= last_stamp);
                last_stamp = micros;
            }
            other => panic!("unexpected timestamp {:?}", other),
        }
    }

    // the next run resumes where this one stopped
    let resume = report.resume_state.unwrap();
    assert_eq!(resume.virtual_timestamp_micros, last_stamp);
    assert!(resume.virtual_hour.is_some());
}

#[tokio::test]
async fn test_paced_run_has_no_resume_state() {
    let mut config = config();
    config.generation_rate.events_per_second = 2_000.0;
    let buffer = SharedBuffer::default();
    let mut pipeline = stdout_pipeline(&config, &buffer);

    let mut source = Limited::new(SimulationContext::from_config(&config).unwrap(), 40);
    let done = Arc::clone(&source.done);
    let report = pipeline.run(&mut source, async move { done.notified().await }).await.unwrap();

    assert_eq!(report.published, 40);
    assert!(report.resume_state.is_none());
    for line in buffer.lines() {
        let event = EventRecord::from_payload(line.as_bytes()).unwrap();
        assert!(matches!(event.event_timestamp, EventTimestamp::Iso(_)));
    }
}

#[tokio::test]
async fn test_transport_failures_do_not_stop_the_loop() {
    let config = config();
    // nothing listens on the discard port, every request is refused
    let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
    let mut pipeline =
        DeliveryPipeline::new(Arc::new(transport), Destination::from_config(&config), 0);

    let mut source = Limited::new(SimulationContext::from_config(&config).unwrap(), 5);
    let done = Arc::clone(&source.done);
    let report = pipeline.run(&mut source, async move { done.notified().await }).await.unwrap();

    assert_eq!(report.dispatched, 5);
    assert_eq!(report.failed, 5);
    assert_eq!(report.published, 0);
    assert_eq!(pipeline.tally().in_flight(), 0);
}

#[tokio::test]
async fn test_stopped_pipeline_cannot_rerun() {
    let config = config();
    let buffer = SharedBuffer::default();
    let mut pipeline = stdout_pipeline(&config, &buffer);
    let mut source = SimulationContext::from_config(&config).unwrap();

    pipeline.run(&mut source, async {}).await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(pipeline.run(&mut source, async {}).await.is_err());
}
