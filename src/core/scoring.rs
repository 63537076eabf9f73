//! Whole-session event scoring.
//!
//! Runs after every chunk of a session exists. Raw motion and energy are
//! measured per chunk (optionally on worker threads), then min-max normalized
//! across the session and blended into a single event score.

use crate::core::dynamics::{compute_optical_flow, waveform_energy, FlowEstimator};
use crate::core::windowing::Chunk;
use crate::error::Result;
use crate::media::MediaBackend;
use crossbeam_channel::{bounded, unbounded};
use serde::{Deserialize, Serialize};

/// Weights and threshold for the event decision. Fixed policy, not learned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub motion_weight: f64,
    pub energy_weight: f64,
    /// A chunk is an event when its score is strictly above this
    pub threshold: f64,
    /// Added to the range so a flat session does not divide by zero
    pub epsilon: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            motion_weight: 0.6,
            energy_weight: 0.4,
            threshold: 0.3,
            epsilon: 1e-8,
        }
    }
}

impl ScoringPolicy {
    pub fn score(&self, norm_motion: f64, norm_energy: f64) -> f64 {
        self.motion_weight * norm_motion + self.energy_weight * norm_energy
    }

    pub fn is_event(&self, score: f64) -> bool {
        score > self.threshold
    }
}

/// Raw per-chunk measurements before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    pub motion: f64,
    pub energy: f64,
}

/// Summary of one scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub chunks: usize,
    pub events: usize,
}

/// `(raw - min) / (max - min + epsilon)` over the whole slice.
pub fn min_max_normalize(values: &[f64], epsilon: f64) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|v| (v - min) / (max - min + epsilon))
        .collect()
}

/// Write normalized scores into chunks from their raw fields.
///
/// Chunks missing a raw value count as 0 for it.
pub fn apply_scores(chunks: &mut [Chunk], policy: &ScoringPolicy) -> ScoreSummary {
    if chunks.is_empty() {
        return ScoreSummary::default();
    }

    let motion: Vec<f64> = chunks.iter().map(|c| c.raw_motion.unwrap_or(0.0)).collect();
    let energy: Vec<f64> = chunks.iter().map(|c| c.raw_energy.unwrap_or(0.0)).collect();
    let norm_motion = min_max_normalize(&motion, policy.epsilon);
    let norm_energy = min_max_normalize(&energy, policy.epsilon);

    let mut events = 0;
    for (i, chunk) in chunks.iter_mut().enumerate() {
        let score = policy.score(norm_motion[i], norm_energy[i]);
        chunk.event_score = Some(score);
        chunk.is_event = policy.is_event(score);
        if chunk.is_event {
            events += 1;
        }
    }

    ScoreSummary {
        chunks: chunks.len(),
        events,
    }
}

/// Measures and scores every chunk of a session.
pub struct BatchEventScorer<'a> {
    backend: &'a dyn MediaBackend,
    estimator: &'a dyn FlowEstimator,
    policy: ScoringPolicy,
    max_frames: usize,
    workers: usize,
}

impl<'a> BatchEventScorer<'a> {
    pub fn new(
        backend: &'a dyn MediaBackend,
        estimator: &'a dyn FlowEstimator,
        policy: ScoringPolicy,
    ) -> Self {
        Self {
            backend,
            estimator,
            policy,
            max_frames: 12,
            workers: 1,
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Number of measurement threads; 1 measures inline.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Motion and energy for one chunk's materialized media.
    pub fn measure(&self, chunk: &Chunk) -> Result<RawMeasurement> {
        let sampled = self.backend.sample_frames(&chunk.video_path, self.max_frames)?;
        let first = sampled.indices.first().copied().unwrap_or(0);
        let video = compute_optical_flow(&sampled.frames, first, self.estimator)?;
        let waveform = self.backend.read_waveform(&chunk.audio_path)?;

        Ok(RawMeasurement {
            motion: video.flow_mean,
            energy: waveform_energy(&waveform),
        })
    }

    /// Measure every chunk, then normalize across the session.
    ///
    /// The first measurement error aborts the pass and leaves the chunks
    /// unmodified.
    pub fn score(&self, chunks: &mut [Chunk]) -> Result<ScoreSummary> {
        let measurements = if self.workers > 1 && chunks.len() > 1 {
            self.measure_parallel(chunks)?
        } else {
            chunks
                .iter()
                .map(|c| self.measure(c))
                .collect::<Result<Vec<_>>>()?
        };

        for (chunk, m) in chunks.iter_mut().zip(&measurements) {
            chunk.raw_motion = Some(m.motion);
            chunk.raw_energy = Some(m.energy);
        }

        let summary = apply_scores(chunks, &self.policy);
        tracing::info!(
            chunks = summary.chunks,
            events = summary.events,
            "Scored session"
        );
        Ok(summary)
    }

    fn measure_parallel(&self, chunks: &[Chunk]) -> Result<Vec<RawMeasurement>> {
        let workers = self.workers.min(chunks.len());
        let (job_tx, job_rx) = bounded::<(usize, &Chunk)>(workers * 2);
        let (result_tx, result_rx) = unbounded::<(usize, Result<RawMeasurement>)>();

        let mut results: Vec<Option<Result<RawMeasurement>>> = Vec::new();
        results.resize_with(chunks.len(), || None);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, chunk) in job_rx {
                        if result_tx.send((index, self.measure(chunk))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            for job in chunks.iter().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);

            // Barrier: every worker has hung up once this loop ends
            for (index, result) in result_rx.iter() {
                results[index] = Some(result);
            }
        });

        tracing::debug!(workers, chunks = chunks.len(), "Parallel measurement done");

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(crate::error::PerceptionError::MediaDecodeFailure(
                        "measurement worker exited early".into(),
                    ))
                })
            })
            .collect()
    }
}
