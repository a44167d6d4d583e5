//! In-memory doubles and fixtures shared by the pipeline integration
//! tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use storyloom_comfyui::{GenerationError, GenerationRequest};
use storyloom_core::error::CoreError;
use storyloom_core::state::{self, JobEvent, JobState};
use storyloom_core::types::{DbId, PageNum};
use storyloom_db::models::{ArtifactRow, JobRow, NewArtifact, NewJob, NewTask, TaskRow};
use storyloom_pipeline::analyze::StubAnalyzer;
use storyloom_pipeline::compose::PassthroughCompositor;
use storyloom_pipeline::mask::NoFaceDetector;
use storyloom_pipeline::{ImageGenerator, JobStore, PipelineContext, StageError};
use storyloom_store::{images, MemoryStore, ObjectStore, TemplateStore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const BOOK_SLUG: &str = "starlight";
pub const PHOTO_KEY: &str = "uploads/photo.png";

// ---------------------------------------------------------------------------
// In-memory job store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_id: DbId,
    jobs: HashMap<DbId, JobRow>,
    artifacts: Vec<ArtifactRow>,
    tasks: VecDeque<TaskRow>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next pending task, marking it claimed.
    pub fn pop_task(&self) -> Option<TaskRow> {
        let mut inner = self.inner.lock().unwrap();
        let mut task = inner.tasks.pop_front()?;
        task.attempts += 1;
        task.status = "running".to_string();
        Some(task)
    }

    pub fn job(&self, job_id: DbId) -> JobRow {
        self.inner.lock().unwrap().jobs[&job_id].clone()
    }

    pub fn state_of(&self, job_id: DbId) -> JobState {
        self.job(job_id).state().unwrap()
    }

    fn with_job<T>(
        &self,
        job_id: DbId,
        f: impl FnOnce(&mut JobRow) -> Result<T, StageError>,
    ) -> Result<T, StageError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StageError::Fatal(format!("no job {job_id}")))?;
        f(job)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: &NewJob) -> Result<JobRow, StageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let now = Utc::now();
        let job = JobRow {
            id: inner.next_id,
            public_id: Uuid::new_v4(),
            book_slug: input.book_slug.clone(),
            child_name: input.child_name.clone(),
            child_age: input.child_age,
            child_gender: input.child_gender.clone(),
            photo_key: input.photo_key.clone(),
            prompt: None,
            analysis_json: None,
            status: JobState::PendingAnalysis.as_str().to_string(),
            regen_used: 0,
            regen_limit: 3,
            randomize_seed: false,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn load(&self, job_id: DbId) -> Result<JobRow, StageError> {
        self.with_job(job_id, |job| Ok(job.clone()))
    }

    async fn apply_event(&self, job_id: DbId, event: JobEvent) -> Result<JobState, StageError> {
        self.with_job(job_id, |job| {
            let next = state::apply(job.state()?, event)?;
            job.status = next.as_str().to_string();
            Ok(next)
        })
    }

    async fn set_details(
        &self,
        job_id: DbId,
        child_name: &str,
        child_age: Option<i32>,
        child_gender: Option<&str>,
    ) -> Result<(), StageError> {
        self.with_job(job_id, |job| {
            job.child_name = child_name.to_string();
            job.child_age = child_age;
            job.child_gender = child_gender.map(str::to_string);
            Ok(())
        })
    }

    async fn record_analysis(
        &self,
        job_id: DbId,
        prompt: &str,
        attributes: &serde_json::Value,
    ) -> Result<(), StageError> {
        self.with_job(job_id, |job| {
            job.prompt = Some(prompt.to_string());
            job.analysis_json = Some(attributes.clone());
            Ok(())
        })
    }

    async fn set_error(&self, job_id: DbId, message: &str) -> Result<(), StageError> {
        self.with_job(job_id, |job| {
            job.error_message = Some(message.to_string());
            Ok(())
        })
    }

    async fn consume_regen(&self, job_id: DbId) -> Result<i32, StageError> {
        self.with_job(job_id, |job| {
            if job.regen_used >= job.regen_limit {
                return Err(StageError::Domain(CoreError::RetryLimitExceeded {
                    used: job.regen_used,
                    limit: job.regen_limit,
                }));
            }
            job.regen_used += 1;
            job.randomize_seed = true;
            Ok(job.regen_used)
        })
    }

    async fn take_randomize_seed(&self, job_id: DbId) -> Result<bool, StageError> {
        self.with_job(job_id, |job| {
            let armed = job.randomize_seed;
            job.randomize_seed = false;
            Ok(armed)
        })
    }

    async fn record_artifact(&self, input: &NewArtifact) -> Result<(), StageError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner.artifacts.iter_mut().find(|a| {
            a.job_id == input.job_id && a.kind == input.kind && a.page_num == input.page_num
        }) {
            existing.object_key = input.object_key.clone();
            existing.checksum = input.checksum.clone();
            existing.updated_at = now;
            return Ok(());
        }
        let id = inner.artifacts.len() as DbId + 1;
        inner.artifacts.push(ArtifactRow {
            id,
            job_id: input.job_id,
            kind: input.kind.clone(),
            page_num: input.page_num,
            object_key: input.object_key.clone(),
            checksum: input.checksum.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn artifact(
        &self,
        job_id: DbId,
        kind: &str,
        page_num: PageNum,
    ) -> Result<Option<ArtifactRow>, StageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .artifacts
            .iter()
            .find(|a| a.job_id == job_id && a.kind == kind && a.page_num == page_num)
            .cloned())
    }

    async fn artifacts_by_kind(
        &self,
        job_id: DbId,
        kind: &str,
    ) -> Result<Vec<ArtifactRow>, StageError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<_> = inner
            .artifacts
            .iter()
            .filter(|a| a.job_id == job_id && a.kind == kind)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.page_num);
        Ok(rows)
    }

    async fn enqueue(&self, task: &NewTask) -> Result<(), StageError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let id = inner.tasks.len() as DbId + 1;
        inner.tasks.push_back(TaskRow {
            id,
            queue: task.kind.queue().as_str().to_string(),
            kind: task.kind.as_str().to_string(),
            job_id: task.job_id,
            payload: task.payload.clone(),
            status: "pending".to_string(),
            attempts: 0,
            max_attempts: 3,
            claimed_by: None,
            claimed_at: None,
            scheduled_at: now,
            completed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Returns a valid PNG.
    Up,
    /// Fails with a service error.
    Down,
    /// Fails with a template defect.
    BadTemplate,
}

pub struct ScriptedGenerator {
    mode: Mutex<GeneratorMode>,
    calls: Mutex<u32>,
}

impl ScriptedGenerator {
    pub fn new(mode: GeneratorMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: Mutex::new(0),
        }
    }

    pub fn set_mode(&self, mode: GeneratorMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _workflow: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerationError> {
        *self.calls.lock().unwrap() += 1;
        match *self.mode.lock().unwrap() {
            GeneratorMode::Up => Ok(png(48, 48, 90)),
            GeneratorMode::Down => Err(GenerationError::Service("connection refused".to_string())),
            GeneratorMode::BadTemplate => Err(GenerationError::Template(
                storyloom_comfyui::WorkflowError::TemplateUnusable(
                    "no dialect accepted the document".to_string(),
                ),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
    images::encode_png(&image::DynamicImage::ImageRgb8(img)).unwrap()
}

/// Three pages: 0 (swap, teaser), 1 (hidden), 2 (teaser). Small output
/// size keeps the resize work trivial.
fn manifest_json() -> String {
    serde_json::json!({
        "slug": BOOK_SLUG,
        "typography": { "font_uri": "fonts/body.ttf" },
        "output": { "page_size_px": 64 },
        "pages": [
            {
                "page_num": 0,
                "base_uri": format!("templates/{BOOK_SLUG}/pages/page_00_base.png"),
                "needs_face_swap": true,
                "text_layers": [
                    { "text_template": "{child_name}!", "position": "bottom-center" }
                ]
            },
            {
                "page_num": 1,
                "base_uri": format!("templates/{BOOK_SLUG}/pages/page_01_base.png"),
                "needs_face_swap": true
            },
            {
                "page_num": 2,
                "base_uri": format!("templates/{BOOK_SLUG}/pages/page_02_base.png")
            }
        ]
    })
    .to_string()
}

pub struct Harness {
    pub ctx: PipelineContext,
    pub jobs: Arc<MemoryJobStore>,
    pub objects: Arc<MemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn harness(mode: GeneratorMode) -> Harness {
    let mut store = MemoryStore::new();
    store.seed(
        &format!("templates/{BOOK_SLUG}/manifest.json"),
        manifest_json().into_bytes(),
    );
    store.seed(
        &format!("templates/{BOOK_SLUG}/workflow.json"),
        b"{}".to_vec(),
    );
    for page in 0..3 {
        store.seed(
            &format!("templates/{BOOK_SLUG}/pages/page_{page:02}_base.png"),
            png(32, 32, 10 + page as u8),
        );
    }
    store.seed(PHOTO_KEY, png(24, 24, 200));

    let objects = Arc::new(store);
    let jobs = Arc::new(MemoryJobStore::new());
    let generator = Arc::new(ScriptedGenerator::new(mode));
    let ctx = PipelineContext {
        jobs: jobs.clone() as Arc<dyn JobStore>,
        objects: objects.clone() as Arc<dyn ObjectStore>,
        templates: Arc::new(TemplateStore::new(objects.clone() as Arc<dyn ObjectStore>)),
        generator: generator.clone() as Arc<dyn ImageGenerator>,
        detector: Arc::new(NoFaceDetector),
        analyzer: Arc::new(StubAnalyzer),
        compositor: Arc::new(PassthroughCompositor),
        cancel: CancellationToken::new(),
    };
    Harness {
        ctx,
        jobs,
        objects,
        generator,
    }
}

/// Run queued tasks until the queue drains, returning the outcomes in
/// execution order.
pub async fn drain_tasks(h: &Harness) -> Vec<storyloom_pipeline::TaskOutcome> {
    let mut outcomes = Vec::new();
    while let Some(task) = h.jobs.pop_task() {
        outcomes.push(storyloom_pipeline::run_task(&h.ctx, &task).await);
    }
    outcomes
}
