//! `ffprobe`/`ffmpeg` subprocess backend.

use crate::error::{PerceptionError, Result};
use crate::media::{even_frame_indices, MediaBackend, MediaInfo, SampledFrames, Waveform};
use image::GrayImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Media backend driving the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_read_packets: Option<String>,
    sample_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegBackend {
    /// Use explicit tool paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn run_probe(&self, path: &Path, stream: &str, entries: &str) -> Result<ProbeOutput> {
        ensure_exists(path)?;
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-select_streams", stream]);
        if stream.starts_with('v') {
            cmd.arg("-count_packets");
        }
        cmd.args(["-show_entries", entries, "-of", "json"]).arg(path);

        let output = run(&mut cmd, "ffprobe")?;
        serde_json::from_slice(&output.stdout).map_err(|e| {
            PerceptionError::MediaDecodeFailure(format!(
                "unreadable ffprobe output for {}: {e}",
                path.display()
            ))
        })
    }

    fn cut(&self, src: &Path, start: f64, end: f64, out: &Path, codec: &[&str]) -> Result<()> {
        ensure_exists(src)?;
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-v", "error", "-i"])
            .arg(src)
            .arg("-ss")
            .arg(format!("{start:.6}"))
            .arg("-to")
            .arg(format!("{end:.6}"))
            .args(codec)
            .arg(out);
        run(&mut cmd, "ffmpeg cut")?;
        Ok(())
    }
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, video: &Path) -> Result<MediaInfo> {
        let probe = self.run_probe(
            video,
            "v:0",
            "stream=codec_name,width,height,r_frame_rate,nb_read_packets:format=duration",
        )?;
        let stream = probe.streams.first().ok_or_else(|| {
            PerceptionError::MediaDecodeFailure(format!(
                "no video stream in {}",
                video.display()
            ))
        })?;

        let duration_s = probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(MediaInfo {
            duration_s,
            frame_count: stream
                .nb_read_packets
                .as_deref()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            fps: stream
                .r_frame_rate
                .as_deref()
                .and_then(parse_rate)
                .unwrap_or(0.0),
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            codec: stream.codec_name.clone().unwrap_or_default(),
        })
    }

    fn cut_video(&self, src: &Path, start: f64, end: f64, out: &Path) -> Result<()> {
        self.cut(src, start, end, out, &["-an", "-c:v", "libx264"])
    }

    fn cut_audio(&self, src: &Path, start: f64, end: f64, out: &Path) -> Result<()> {
        self.cut(src, start, end, out, &["-vn", "-c:a", "pcm_s16le"])
    }

    fn sample_frames(&self, video: &Path, max_frames: usize) -> Result<SampledFrames> {
        let info = self.probe(video)?;
        let mut indices = even_frame_indices(info.frame_count, max_frames);
        if indices.is_empty() || info.width == 0 || info.height == 0 {
            return Ok(SampledFrames {
                frames: Vec::new(),
                indices: Vec::new(),
                info,
            });
        }

        let select = indices
            .iter()
            .map(|i| format!("eq(n\\,{i})"))
            .collect::<Vec<_>>()
            .join("+");

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(format!("select={select}"))
            .args(["-vsync", "0"])
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "pipe:1"]);
        let output = run(&mut cmd, "ffmpeg frame decode")?;

        let frame_len = info.width as usize * info.height as usize;
        let frames: Vec<GrayImage> = output
            .stdout
            .chunks_exact(frame_len)
            .filter_map(|raw| GrayImage::from_raw(info.width, info.height, raw.to_vec()))
            .collect();

        // Frames that failed to decode are dropped, not padded
        indices.truncate(frames.len());

        Ok(SampledFrames {
            frames,
            indices,
            info,
        })
    }

    fn read_waveform(&self, audio: &Path) -> Result<Waveform> {
        let probe = self.run_probe(audio, "a:0", "stream=sample_rate")?;
        let sample_rate = probe
            .streams
            .first()
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse::<u32>().ok())
            .ok_or_else(|| {
                PerceptionError::MediaDecodeFailure(format!(
                    "no audio stream in {}",
                    audio.display()
                ))
            })?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-i"])
            .arg(audio)
            .args(["-ac", "1", "-f", "f32le", "pipe:1"]);
        let output = run(&mut cmd, "ffmpeg audio decode")?;

        let samples = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Waveform {
            samples,
            sample_rate,
        })
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PerceptionError::MediaDecodeFailure(format!(
            "cannot open {}",
            path.display()
        )))
    }
}

fn run(cmd: &mut Command, what: &str) -> Result<Output> {
    tracing::trace!(?cmd, "Running {what}");
    let output = cmd
        .output()
        .map_err(|e| PerceptionError::MediaDecodeFailure(format!("{what} failed to start: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PerceptionError::MediaDecodeFailure(format!(
            "{what} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

/// Parse an ffprobe rational such as "30000/1001".
fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}
