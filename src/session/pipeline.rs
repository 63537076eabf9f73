//! End-to-end processing of one recorded session.
//!
//! Chunks the session, emits one seed per window, writes the manifest, then
//! runs the whole-session scoring pass. Any decode or I/O failure aborts the
//! run; seeds already appended stay valid on their own.

use crate::config::Config;
use crate::core::dynamics::{compute_audio_rms, compute_optical_flow, FlowEstimator, LucasKanadeFlow};
use crate::core::health::{capture_health_metrics, capture_sync_metrics};
use crate::core::scoring::{BatchEventScorer, ScoreSummary};
use crate::core::seed::{MonotonicClock, ProcessClock, SeedEmitter, SeedInput, SeedLog};
use crate::core::windowing::{window_actions, Chunk, Chunker, ValenceLabel};
use crate::error::{PerceptionError, Result};
use crate::input::loader::load_action_log;
use crate::input::semantics::ActionMapper;
use crate::media::MediaBackend;
use crate::memory::{Embedder, ValencePredictor};
use crate::session::manifest::{
    write_events, write_json, SessionManifest, CHUNKS_FILE, EVENTS_FILE, MANIFEST_FILE,
};
use crate::transparency::RunLog;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the seed log inside a session directory.
pub const SEEDS_FILE: &str = "seeds.jsonl";

/// File name of the run counters inside a session directory.
pub const RUN_STATS_FILE: &str = "run_stats.json";

/// Codec reported when a clip does not name one.
const DEFAULT_CODEC: &str = "h264";

/// Resolved input files for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInputs {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub actions: PathBuf,
    pub manifest: Option<PathBuf>,
}

impl SessionInputs {
    /// Resolve inputs from an optional folder plus explicit overrides.
    ///
    /// From a folder: the first `.mp4`, the first `.wav`, a file ending in
    /// `actions.jsonl`, and `session.json` if present, by file name order.
    pub fn resolve(
        folder: Option<&Path>,
        video: Option<PathBuf>,
        audio: Option<PathBuf>,
        actions: Option<PathBuf>,
    ) -> Result<Self> {
        let mut found = FolderScan::default();
        if let Some(folder) = folder {
            found = FolderScan::scan(folder)?;
        }

        let base = folder.unwrap_or_else(|| Path::new("."));
        let video = video
            .or(found.video)
            .ok_or_else(|| PerceptionError::InputNotFound(base.join("*.mp4")))?;
        let audio = audio
            .or(found.audio)
            .ok_or_else(|| PerceptionError::InputNotFound(base.join("*.wav")))?;
        let actions = actions
            .or(found.actions)
            .ok_or_else(|| PerceptionError::InputNotFound(base.join("*actions.jsonl")))?;

        for path in [&video, &audio, &actions] {
            if !path.is_file() {
                return Err(PerceptionError::InputNotFound(path.clone()));
            }
        }

        Ok(Self {
            video,
            audio,
            actions,
            manifest: found.manifest,
        })
    }
}

#[derive(Default)]
struct FolderScan {
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    actions: Option<PathBuf>,
    manifest: Option<PathBuf>,
}

impl FolderScan {
    fn scan(folder: &Path) -> Result<Self> {
        if !folder.is_dir() {
            return Err(PerceptionError::InputNotFound(folder.to_path_buf()));
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let has_ext = |p: &Path, ext: &str| {
            p.extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        };
        let name = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        Ok(Self {
            video: files.iter().find(|p| has_ext(p, "mp4")).cloned(),
            audio: files.iter().find(|p| has_ext(p, "wav")).cloned(),
            actions: files
                .iter()
                .find(|p| name(p).ends_with("actions.jsonl"))
                .cloned(),
            manifest: files.iter().find(|p| name(p) == MANIFEST_FILE).cloned(),
        })
    }
}

/// Per-run options that are not part of the persistent configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Epoch seconds of the first video frame; wins over the manifest
    pub stream_start: Option<f64>,
    /// Output folder name; defaults to `session_YYYYMMDD_HHMMSS`
    pub session_id: Option<String>,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub output_dir: PathBuf,
    pub seeds_path: PathBuf,
    pub chunks: Vec<Chunk>,
    pub summary: ScoreSummary,
    pub run_id: String,
}

/// Drives the pipeline for one session.
pub struct SessionRunner<'a> {
    config: Config,
    backend: &'a dyn MediaBackend,
    estimator: Box<dyn FlowEstimator>,
    clock: Arc<dyn MonotonicClock>,
    judge: Option<ValenceJudge>,
}

/// Embeds each chunk's media and predicts its valence.
struct ValenceJudge {
    embedder: Box<dyn Embedder>,
    predictor: Box<dyn ValencePredictor>,
}

impl ValenceJudge {
    fn judge(&self, chunk: &Chunk) -> Result<ValenceLabel> {
        let embedding = self.embedder.embed(&chunk.video_path, &chunk.audio_path)?;
        if embedding.len() != self.embedder.dimension() {
            return Err(PerceptionError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: embedding.len(),
            });
        }
        Ok(ValenceLabel::Judged(self.predictor.predict(&embedding)))
    }
}

impl<'a> SessionRunner<'a> {
    pub fn new(config: Config, backend: &'a dyn MediaBackend) -> Self {
        let estimator = Box::new(LucasKanadeFlow::new(config.flow));
        Self {
            config,
            backend,
            estimator,
            clock: Arc::new(ProcessClock),
            judge: None,
        }
    }

    pub fn with_estimator(mut self, estimator: impl FlowEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Replace the clock used for seed timing.
    pub fn with_clock(mut self, clock: impl MonotonicClock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Judge every chunk's valence as it is cut.
    pub fn with_valence(
        mut self,
        embedder: impl Embedder + 'static,
        predictor: impl ValencePredictor + 'static,
    ) -> Self {
        self.judge = Some(ValenceJudge {
            embedder: Box::new(embedder),
            predictor: Box::new(predictor),
        });
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run chunking, seed emission and scoring for one session.
    pub fn run(&self, inputs: &SessionInputs, options: &RunOptions) -> Result<SessionReport> {
        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| Local::now().format("session_%Y%m%d_%H%M%S").to_string());
        let out_dir = self.config.output_dir.join(&session_id);
        std::fs::create_dir_all(&out_dir)?;
        tracing::info!(session_id = %session_id, out_dir = %out_dir.display(), "Starting session");

        // Work from copies so the output folder is self-contained
        let video = copy_into(&inputs.video, &out_dir)?;
        let audio = copy_into(&inputs.audio, &out_dir)?;
        let actions_path = copy_into(&inputs.actions, &out_dir)?;
        let input_manifest = match &inputs.manifest {
            Some(path) => {
                copy_into(path, &out_dir)?;
                Some(SessionManifest::load(path)?)
            }
            None => None,
        };

        let origin = match options.stream_start {
            Some(start) => Some(start),
            None => match &input_manifest {
                Some(manifest) => manifest.stream_start(&self.config.clock)?,
                None => None,
            },
        };
        tracing::info!(origin = ?origin, "Session time origin");

        let run_log = RunLog::new();
        let actions = load_action_log(&actions_path, origin)?;
        run_log.record_actions_loaded(actions.len() as u64);

        let info = self.backend.probe(&video)?;
        let chunker = Chunker::new(self.backend, self.config.chunk_duration);
        let windows = chunker.plan(origin, &info);

        let seeds_path = out_dir.join(SEEDS_FILE);
        let seed_log = SeedLog::create(&seeds_path)?;
        let emitter = SeedEmitter::new(session_id.clone(), self.config.emitter.clone())
            .with_clock(Arc::clone(&self.clock));

        let mut chunks = Vec::with_capacity(windows.len());
        for window in &windows {
            let (video_out, audio_out) =
                chunker.materialize(window, origin, &video, &audio, &out_dir)?;

            let events = window_actions(&actions, origin, window);
            run_log.record_actions_kept(events.len() as u64);

            let sampled = self
                .backend
                .sample_frames(&video_out, self.config.max_sampled_frames)?;
            let resolution = if sampled.info.width > 0 && sampled.info.height > 0 {
                (sampled.info.width, sampled.info.height)
            } else {
                self.config.fallback_resolution
            };
            let fps = if sampled.info.fps > 0.0 {
                sampled.info.fps
            } else {
                self.config.fallback_fps
            };
            let codec = if sampled.info.codec.is_empty() {
                DEFAULT_CODEC
            } else {
                sampled.info.codec.as_str()
            };

            let mapper = ActionMapper::new(self.config.vocabulary.clone(), resolution);
            let semantic = mapper.map_all(&events);

            let first_frame = sampled.indices.first().copied().unwrap_or(0);
            let video_dyn = compute_optical_flow(&sampled.frames, first_frame, self.estimator.as_ref())?;
            let waveform = self.backend.read_waveform(&audio_out)?;
            let audio_dyn = compute_audio_rms(&waveform, &self.config.audio);

            let seed = emitter.emit(SeedInput {
                video_path: video_out.clone(),
                audio_path: audio_out.clone(),
                actions: semantic.clone(),
                sync: capture_sync_metrics(),
                video_dyn,
                audio_dyn,
                system: capture_health_metrics(fps, 0, true, resolution, codec, None),
                decision_trace: None,
            })?;
            seed_log.append(&seed)?;
            run_log.record_seed_emitted();
            tracing::debug!(event_uid = %seed.event_uid, "Emitted seed");

            let mut chunk = Chunk::new(window, video_out, audio_out, semantic);
            if let Some(judge) = &self.judge {
                chunk.valence = Some(judge.judge(&chunk)?);
            }
            chunks.push(chunk);
            run_log.record_window_chunked();
        }
        tracing::info!(windows = chunks.len(), "Chunking complete");

        write_json(&out_dir.join(CHUNKS_FILE), &chunks)?;

        let mut manifest = input_manifest.unwrap_or_default();
        if manifest.session_id.is_empty() {
            manifest.session_id = session_id.clone();
        }
        manifest.chunks = chunks;
        manifest.seeds_path = Some(seeds_path.clone());
        manifest.run_id = Some(run_log.run_id().to_string());
        let manifest_path = out_dir.join(MANIFEST_FILE);
        manifest.save(&manifest_path)?;

        let summary = self.scorer().score(&mut manifest.chunks)?;
        run_log.record_events_detected(summary.events as u64);
        write_events(&out_dir.join(EVENTS_FILE), &manifest.chunks)?;
        manifest.save(&manifest_path)?;

        run_log.save(&out_dir.join(RUN_STATS_FILE))?;
        tracing::info!("{}", run_log.summary());

        Ok(SessionReport {
            session_id,
            output_dir: out_dir,
            seeds_path,
            chunks: manifest.chunks,
            summary,
            run_id: run_log.run_id().to_string(),
        })
    }

    /// Re-score an existing session directory in place.
    ///
    /// Chunk media is looked up by file name inside `session_dir`, so a moved
    /// session folder still scores.
    pub fn score_session(&self, session_dir: &Path) -> Result<Vec<Chunk>> {
        let manifest_path = session_dir.join(MANIFEST_FILE);
        let mut manifest = SessionManifest::load(&manifest_path)?;

        for chunk in manifest.chunks.iter_mut() {
            chunk.video_path = relocate(&chunk.video_path, session_dir);
            chunk.audio_path = relocate(&chunk.audio_path, session_dir);
        }

        let summary = self.scorer().score(&mut manifest.chunks)?;
        write_events(&session_dir.join(EVENTS_FILE), &manifest.chunks)?;
        manifest.save(&manifest_path)?;

        tracing::info!(
            session_id = %manifest.session_id,
            events = summary.events,
            "Re-scored session"
        );
        Ok(manifest.chunks)
    }

    fn scorer(&self) -> BatchEventScorer<'_> {
        BatchEventScorer::new(self.backend, self.estimator.as_ref(), self.config.scoring)
            .with_max_frames(self.config.max_sampled_frames)
            .with_workers(self.config.workers)
    }
}

/// Copy `src` into `dir` under its own file name, returning the new path.
fn copy_into(src: &Path, dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| PerceptionError::InputNotFound(src.to_path_buf()))?;
    let dest = dir.join(name);
    if dest != src {
        std::fs::copy(src, &dest)?;
    }
    Ok(dest)
}

fn relocate(path: &Path, dir: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => path.to_path_buf(),
    }
}
