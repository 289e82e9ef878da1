#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lumen::clock::{Clock, ManualClock};
use lumen::error::Outcome;
use lumen::image::Image;
use lumen::pipeline::{Pipeline, PipelineConfig};
use lumen::provider::{Signals, VisionProvider};
use lumen::store::{ImageStore, ImageToken, MemoryImageStore};
use lumen::telemetry::{TelemetryRecord, TelemetrySink};

pub fn png() -> Image {
    Image::new(b"\x89PNG\r\n\x1a\n-fake-pixels-".to_vec(), "image/png")
}

/// Scripted provider that counts calls and can advance a manual clock to
/// simulate backend latency.
pub struct FakeProvider {
    signals: Outcome<Signals>,
    generated: Outcome<String>,
    pub inspect_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
    latency: Option<(Arc<ManualClock>, u64)>,
    hang_on_generate: bool,
}

impl FakeProvider {
    pub fn answering(text: &str) -> Self {
        Self {
            signals: Ok(Signals {
                has_text: false,
                hazards: vec!["curb".into()],
                people_count: 1,
                confidence: 0.8,
                ..Signals::default()
            }),
            generated: Ok(text.to_string()),
            inspect_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            latency: None,
            hang_on_generate: false,
        }
    }

    pub fn failing_inspect(failure: lumen::Failure) -> Self {
        Self {
            signals: Err(failure),
            ..Self::answering("unused")
        }
    }

    pub fn failing_generate(failure: lumen::Failure) -> Self {
        Self {
            generated: Err(failure),
            ..Self::answering("unused")
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang_on_generate: true,
            ..Self::answering("unused")
        }
    }

    pub fn with_latency(mut self, clock: Arc<ManualClock>, step_ms: u64) -> Self {
        self.latency = Some((clock, step_ms));
        self
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.inspect_calls.load(Ordering::SeqCst),
            self.generate_calls.load(Ordering::SeqCst),
        )
    }

    fn tick(&self) {
        if let Some((clock, step)) = &self.latency {
            clock.advance(*step);
        }
    }
}

#[async_trait]
impl VisionProvider for FakeProvider {
    async fn inspect_image(&self, _image: &Image) -> Outcome<Signals> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        self.tick();
        self.signals.clone()
    }

    async fn generate_response(&self, _image: &Image, prompt: &str) -> Outcome<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        if self.hang_on_generate {
            std::future::pending::<()>().await;
        }
        self.tick();
        self.generated.clone()
    }
}

/// Wraps a store and counts traffic through it.
pub struct CountingStore {
    inner: Arc<dyn ImageStore>,
    pub gets: AtomicUsize,
    pub saves: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn ImageStore>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for CountingStore {
    async fn save(&self, image: Image, ttl: Duration) -> Outcome<ImageToken> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(image, ttl).await
    }

    async fn get(&self, token: &str) -> Outcome<Option<Image>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(token).await
    }

    async fn sweep(&self) -> Outcome<usize> {
        self.inner.sweep().await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn log(&self, record: TelemetryRecord) {
        self.records.lock().unwrap().push(record);
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub provider: Arc<FakeProvider>,
    pub store: Arc<CountingStore>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(provider: FakeProvider) -> Harness {
    harness_with(provider, Arc::new(ManualClock::new(1_000)), PipelineConfig::default())
}

pub fn harness_with(
    provider: FakeProvider,
    clock: Arc<ManualClock>,
    config: PipelineConfig,
) -> Harness {
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(CountingStore::new(Arc::new(MemoryImageStore::new(
        clock_dyn.clone(),
    ))));
    let provider = Arc::new(provider);
    let sink = Arc::new(RecordingSink::default());
    let pipeline = Pipeline::new(
        store.clone(),
        provider.clone(),
        sink.clone(),
        clock_dyn,
        config,
    );
    Harness {
        pipeline,
        provider,
        store,
        sink,
        clock,
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
