//! Analysis Pipeline
//!
//! open video -> sample frames -> bin and fit -> render plots. One run is
//! sequential and blocking; the HTTP layer moves it off the async runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use attention_engine::{analyze, Analysis, AnalysisConfig, AnalysisError};
use eye_tracker::{AnnotationWriter, EyeTracker, FrameObserver, FrameSampler, TrackerError};
use frame_capture::{open_video, transcode_to_mp4, CaptureConfig, CaptureError, FrameSource};
use plot_render::{PlotRenderer, RenderError};

use crate::config::{AnnotateConfig, AppConfig};

/// Pipeline stage failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video decoding and re-encoding
pub trait VideoBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn transcode(&self, input: &Path, output: &Path) -> Result<(), CaptureError>;
}

/// Backend driven by the configured ffmpeg tooling
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    config: CaptureConfig,
}

impl FfmpegBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl VideoBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
        open_video(path, &self.config)
    }

    fn transcode(&self, input: &Path, output: &Path) -> Result<(), CaptureError> {
        transcode_to_mp4(&self.config.ffmpeg_path, input, output)
    }
}

/// Where rendered images go
#[derive(Debug, Clone)]
pub struct RenderTargets {
    pub plot: PathBuf,
    pub pie: Option<PathBuf>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub source: PathBuf,
    pub frames: usize,
    pub frames_with_face: usize,
    pub frames_with_eyes: usize,
    pub elapsed_seconds: f64,
    pub analysis: Analysis,
    pub plot_path: PathBuf,
    pub pie_path: Option<PathBuf>,
}

pub struct AnalysisPipeline {
    backend: Arc<dyn VideoBackend>,
    sampler: FrameSampler,
    analysis: AnalysisConfig,
    renderer: PlotRenderer,
    annotate: AnnotateConfig,
}

impl AnalysisPipeline {
    pub fn new(
        backend: Arc<dyn VideoBackend>,
        sampler: FrameSampler,
        analysis: AnalysisConfig,
        renderer: PlotRenderer,
    ) -> Self {
        Self {
            backend,
            sampler,
            analysis,
            renderer,
            annotate: AnnotateConfig::default(),
        }
    }

    pub fn with_annotation(mut self, annotate: AnnotateConfig) -> Self {
        self.annotate = annotate;
        self
    }

    /// Assemble the ffmpeg-backed pipeline from service configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let tracker = EyeTracker::from_config(&config.detector)?;
        let sampler = FrameSampler::new(tracker, config.detector.time_base);
        let renderer = PlotRenderer::new(config.render.clone())?;
        let backend = Arc::new(FfmpegBackend::new(config.capture.clone()));
        Ok(Self::new(backend, sampler, config.analysis.clone(), renderer)
            .with_annotation(config.annotate.clone()))
    }

    pub fn transcode(&self, input: &Path, output: &Path) -> Result<(), CaptureError> {
        self.backend.transcode(input, output)
    }

    /// Run the full analysis on `video`
    pub fn run(
        &self,
        video: &Path,
        targets: &RenderTargets,
    ) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        let result = self.run_stages(video, targets);

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("attention_analyses_total", "outcome" => outcome).increment(1);
        metrics::histogram!("attention_analysis_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    fn run_stages(
        &self,
        video: &Path,
        targets: &RenderTargets,
    ) -> Result<PipelineReport, PipelineError> {
        info!("Starting video analysis of {}", video.display());
        let mut source = self.backend.open(video)?;

        let mut writer = match &self.annotate.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let writer = AnnotationWriter::new(dir, self.annotate.every);
                Some(match self.annotate.max_frames {
                    Some(limit) => writer.with_frame_limit(limit),
                    None => writer,
                })
            }
            None => None,
        };
        let observer = writer.as_mut().map(|w| w as &mut dyn FrameObserver);

        let capture = self.sampler.sample(&mut *source, observer)?;
        metrics::counter!("attention_frames_total").increment(capture.sample.len() as u64);
        if let Some(w) = &writer {
            info!("Wrote {} annotated frames", w.written());
        }

        let elapsed_seconds = capture.elapsed.as_secs_f64();
        let analysis = analyze(capture.sample.as_slice(), elapsed_seconds, &self.analysis)?;

        let plot_path = self.renderer.render_trend(
            &analysis.series,
            &analysis.trend,
            &analysis.moving_average,
            &targets.plot,
        )?;
        let pie_path = match &targets.pie {
            Some(path) => match self.renderer.render_attention_pie(&analysis.attention, path) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Pie chart rendering failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(PipelineReport {
            source: video.to_path_buf(),
            frames: capture.sample.len(),
            frames_with_face: capture.frames_with_face,
            frames_with_eyes: capture.sample.positives(),
            elapsed_seconds,
            analysis,
            plot_path,
            pie_path,
        })
    }
}
