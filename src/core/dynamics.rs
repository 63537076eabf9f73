//! Motion and loudness statistics for a window.
//!
//! Motion comes from a dense displacement field between consecutive sampled
//! frames; loudness from framed RMS over the decoded waveform. Sparse frame
//! sampling misses motion between unsampled frames, which is accepted.

use crate::error::{PerceptionError, Result};
use crate::media::Waveform;
use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Motion summary for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoDynamics {
    /// Mean of the per-pair mean flow magnitudes (pixels per sampled step)
    pub flow_mean: f64,
    /// Population standard deviation of the per-pair means
    pub flow_std: f64,
    /// Reserved for shot-cut detection, always 0
    pub cut_prob: f64,
    pub frame_idx_start: u64,
    /// Inclusive; equals `frame_idx_start` when fewer than two frames
    pub frame_idx_end: u64,
}

/// Loudness envelope for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioDynamics {
    pub rms_frames: Vec<f64>,
    pub sr: u32,
}

/// RMS framing parameters, in samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsConfig {
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for RmsConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 1024,
        }
    }
}

/// Dense optical-flow parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Half-width of the least-squares window
    pub window_radius: u32,
    /// Pixels whose structure tensor has a smaller eigenvalue get zero flow
    pub min_eigen: f64,
    /// Frames wider than this are downscaled before estimation
    pub max_width: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_radius: 7,
            min_eigen: 1e-4,
            max_width: 320,
        }
    }
}

/// Per-pixel displacement between two frames.
#[derive(Debug, Clone)]
pub struct FlowField {
    pub width: u32,
    pub height: u32,
    pub dx: Vec<f32>,
    pub dy: Vec<f32>,
}

impl FlowField {
    pub fn zeros(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            dx: vec![0.0; n],
            dy: vec![0.0; n],
        }
    }

    /// Mean displacement magnitude over all pixels.
    pub fn mean_magnitude(&self) -> f64 {
        if self.dx.is_empty() {
            return 0.0;
        }
        self.dx
            .iter()
            .zip(&self.dy)
            .map(|(&u, &v)| (u as f64).hypot(v as f64))
            .mean()
    }
}

/// Produces a dense displacement field between two equally sized frames.
pub trait FlowEstimator: Send + Sync {
    fn flow(&self, prev: &GrayImage, next: &GrayImage) -> Result<FlowField>;
}

/// Windowed least-squares (Lucas-Kanade) flow evaluated at every pixel.
#[derive(Debug, Clone, Default)]
pub struct LucasKanadeFlow {
    config: FlowConfig,
}

impl LucasKanadeFlow {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    fn prepare(&self, frame: &GrayImage) -> (GrayImage, f64) {
        let (w, h) = frame.dimensions();
        if self.config.max_width == 0 || w <= self.config.max_width {
            return (frame.clone(), 1.0);
        }
        let scale = w as f64 / self.config.max_width as f64;
        let new_h = ((h as f64 / scale).round() as u32).max(1);
        let resized = imageops::resize(frame, self.config.max_width, new_h, FilterType::Triangle);
        (resized, scale)
    }
}

impl FlowEstimator for LucasKanadeFlow {
    fn flow(&self, prev: &GrayImage, next: &GrayImage) -> Result<FlowField> {
        if prev.dimensions() != next.dimensions() {
            return Err(PerceptionError::MediaDecodeFailure(format!(
                "frame size changed mid-clip: {:?} vs {:?}",
                prev.dimensions(),
                next.dimensions()
            )));
        }

        let (a, scale) = self.prepare(prev);
        let (b, _) = self.prepare(next);
        let (w, h) = a.dimensions();
        if w < 3 || h < 3 {
            return Ok(FlowField::zeros(w, h));
        }

        let (wu, hu) = (w as usize, h as usize);
        let px = |img: &GrayImage, x: usize, y: usize| img.as_raw()[y * wu + x] as f64 / 255.0;

        // Structure tensor terms, accumulated into integral images
        let mut terms = [
            Integral::new(wu, hu),
            Integral::new(wu, hu),
            Integral::new(wu, hu),
            Integral::new(wu, hu),
            Integral::new(wu, hu),
        ];
        for y in 0..hu {
            let (y0, y1) = (y.saturating_sub(1), (y + 1).min(hu - 1));
            for x in 0..wu {
                let (x0, x1) = (x.saturating_sub(1), (x + 1).min(wu - 1));
                let avg = |x: usize, y: usize| (px(&a, x, y) + px(&b, x, y)) / 2.0;
                let ix = (avg(x1, y) - avg(x0, y)) / (x1 - x0) as f64;
                let iy = (avg(x, y1) - avg(x, y0)) / (y1 - y0) as f64;
                let it = px(&b, x, y) - px(&a, x, y);
                terms[0].set(x, y, ix * ix);
                terms[1].set(x, y, iy * iy);
                terms[2].set(x, y, ix * iy);
                terms[3].set(x, y, ix * it);
                terms[4].set(x, y, iy * it);
            }
        }
        for term in terms.iter_mut() {
            term.accumulate();
        }

        let r = self.config.window_radius as usize;
        let mut field = FlowField::zeros(w, h);
        for y in 0..hu {
            let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(hu));
            for x in 0..wu {
                let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(wu));
                let [sxx, syy, sxy, sxt, syt] = [0, 1, 2, 3, 4].map(|i| terms[i].sum(x0, y0, x1, y1));

                let trace = sxx + syy;
                let det = sxx * syy - sxy * sxy;
                let min_eigen = (trace - (trace * trace - 4.0 * det).max(0.0).sqrt()) / 2.0;
                if min_eigen < self.config.min_eigen || det.abs() < f64::EPSILON {
                    continue;
                }

                let u = (-syy * sxt + sxy * syt) / det;
                let v = (sxy * sxt - sxx * syt) / det;
                let idx = y * wu + x;
                field.dx[idx] = (u * scale) as f32;
                field.dy[idx] = (v * scale) as f32;
            }
        }

        Ok(field)
    }
}

/// Summed-area table over one scalar term.
struct Integral {
    width: usize,
    table: Vec<f64>,
}

impl Integral {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            table: vec![0.0; (width + 1) * (height + 1)],
        }
    }

    fn set(&mut self, x: usize, y: usize, value: f64) {
        self.table[(y + 1) * (self.width + 1) + x + 1] = value;
    }

    fn accumulate(&mut self) {
        let stride = self.width + 1;
        let rows = self.table.len() / stride;
        for y in 1..rows {
            for x in 1..stride {
                let i = y * stride + x;
                self.table[i] += self.table[i - 1] + self.table[i - stride] - self.table[i - stride - 1];
            }
        }
    }

    /// Sum over `[x0, x1) × [y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let stride = self.width + 1;
        self.table[y1 * stride + x1] - self.table[y0 * stride + x1] - self.table[y1 * stride + x0]
            + self.table[y0 * stride + x0]
    }
}

/// Motion statistics over an ordered sequence of sampled frames.
pub fn compute_optical_flow(
    frames: &[GrayImage],
    frame_idx_start: u64,
    estimator: &dyn FlowEstimator,
) -> Result<VideoDynamics> {
    if frames.len() < 2 {
        return Ok(VideoDynamics {
            frame_idx_start,
            frame_idx_end: frame_idx_start,
            ..Default::default()
        });
    }

    let mut magnitudes = Vec::with_capacity(frames.len() - 1);
    for pair in frames.windows(2) {
        magnitudes.push(estimator.flow(&pair[0], &pair[1])?.mean_magnitude());
    }

    Ok(VideoDynamics {
        flow_mean: magnitudes.iter().mean(),
        flow_std: magnitudes.iter().population_std_dev(),
        cut_prob: 0.0,
        frame_idx_start,
        frame_idx_end: frame_idx_start + frames.len() as u64 - 1,
    })
}

/// Framed RMS energy with centred frames.
///
/// Frame `k` is centred on sample `k * hop`, zero padded by half a frame at
/// both ends, giving `1 + n / hop` frames.
pub fn compute_audio_rms(waveform: &Waveform, config: &RmsConfig) -> AudioDynamics {
    let frame_len = config.frame_length.max(1);
    let hop = config.hop_length.max(1);
    let pad = frame_len / 2;
    let n = waveform.samples.len();

    // Prefix sums of squared samples
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &s in &waveform.samples {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + (s as f64) * (s as f64));
    }

    let n_frames = 1 + n / hop;
    let rms_frames = (0..n_frames)
        .map(|k| {
            let lo = (k * hop).saturating_sub(pad).min(n);
            let hi = (k * hop + frame_len).saturating_sub(pad).min(n);
            ((prefix[hi] - prefix[lo]) / frame_len as f64).sqrt()
        })
        .collect();

    AudioDynamics {
        rms_frames,
        sr: waveform.sample_rate,
    }
}

/// Root-mean-square of the whole waveform; 0 for an empty one.
pub fn waveform_energy(waveform: &Waveform) -> f64 {
    if waveform.samples.is_empty() {
        return 0.0;
    }
    waveform
        .samples
        .iter()
        .map(|&s| (s as f64) * (s as f64))
        .mean()
        .sqrt()
}
