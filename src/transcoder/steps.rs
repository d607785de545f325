//! # Pipeline Steps
//!
//! Step concreti per `Pipeline`.
//!
//! ## Responsabilità:
//! - `TranscodeStep` / `FilterStep`: trasformano l'artefatto in un nuovo file nella scratch dir
//! - `ThumbnailStep` / `ExtractAudioStep` / `AnalyzeStep`: producono output ausiliari
//!   e restituiscono il percorso di input invariato, senza deviare la catena
//!
//! Ogni step porta con sé i propri parametri; nuovi tipi di step si aggiungono
//! implementando `PipelineStep`, senza modificare `Pipeline`.

use crate::error::Result;
use crate::file_manager::FileManager;
use crate::filters::FilterChain;
use crate::job::TranscodeConfig;
use crate::transcoder::{PipelineStep, StepContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Re-encodes the current artifact with a configuration template
#[derive(Debug, Clone)]
pub struct TranscodeStep {
    template: TranscodeConfig,
}

impl TranscodeStep {
    /// Input and output paths of `template` are replaced at run time
    pub fn new(template: TranscodeConfig) -> Self {
        Self { template }
    }
}

fn output_extension(template: &TranscodeConfig, input: &Path) -> String {
    template
        .format
        .clone()
        .or_else(|| input.extension().map(|e| e.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "mp4".to_string())
}

async fn run_template(config: TranscodeConfig, ctx: &StepContext<'_>) -> Result<()> {
    let transcoder = ctx.transcoder();
    let mut job = transcoder.create_job(config)?;
    transcoder.execute(&mut job, ctx.cancel()).await
}

#[async_trait]
impl PipelineStep for TranscodeStep {
    fn name(&self) -> &str {
        "transcode"
    }

    fn description(&self) -> String {
        format!(
            "Transcode with {}/{}",
            self.template.video_codec.as_deref().unwrap_or("default"),
            self.template.audio_codec.as_deref().unwrap_or("default")
        )
    }

    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf> {
        let output = ctx.scratch_path("transcode", &output_extension(&self.template, input));
        run_template(self.template.with_paths(input, &output), ctx).await?;
        Ok(output)
    }
}

/// Re-encodes the current artifact through a filter chain
#[derive(Debug, Clone)]
pub struct FilterStep {
    filters: FilterChain,
    template: TranscodeConfig,
}

impl FilterStep {
    pub fn new(filters: FilterChain, template: TranscodeConfig) -> Self {
        Self { filters, template }
    }
}

#[async_trait]
impl PipelineStep for FilterStep {
    fn name(&self) -> &str {
        "filter"
    }

    fn description(&self) -> String {
        format!(
            "Apply {} video and {} audio filters",
            self.filters.video.len(),
            self.filters.audio.len()
        )
    }

    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf> {
        let output = ctx.scratch_path("filter", &output_extension(&self.template, input));
        let config = self
            .template
            .with_paths(input, &output)
            .with_filters(self.filters.clone());
        run_template(config, ctx).await?;
        Ok(output)
    }
}

/// Writes `thumbnail_<n>.jpg` for each offset into `output_dir`
#[derive(Debug, Clone)]
pub struct ThumbnailStep {
    offsets: Vec<String>,
    output_dir: PathBuf,
}

impl ThumbnailStep {
    pub fn new<S: Into<String>>(offsets: impl IntoIterator<Item = S>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            offsets: offsets.into_iter().map(Into::into).collect(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for ThumbnailStep {
    fn name(&self) -> &str {
        "thumbnails"
    }

    fn description(&self) -> String {
        format!("Create {} thumbnails", self.offsets.len())
    }

    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        for (i, offset) in self.offsets.iter().enumerate() {
            let thumbnail = self.output_dir.join(format!("thumbnail_{}.jpg", i + 1));
            ctx.transcoder()
                .create_thumbnail(input, &thumbnail, offset, ctx.cancel())
                .await?;
        }

        info!("📸 {} thumbnails written to {}", self.offsets.len(), self.output_dir.display());
        Ok(input.to_path_buf())
    }
}

/// Converts the audio track into a standalone file
#[derive(Debug, Clone)]
pub struct ExtractAudioStep {
    output_path: PathBuf,
    format: String,
}

impl ExtractAudioStep {
    pub fn new(output_path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            format: format.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for ExtractAudioStep {
    fn name(&self) -> &str {
        "extract-audio"
    }

    fn description(&self) -> String {
        format!("Extract audio as {}", self.format)
    }

    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf> {
        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        ctx.transcoder()
            .convert_to_format(input, &self.output_path, &self.format, ctx.cancel())
            .await?;
        Ok(input.to_path_buf())
    }
}

/// Writes a plain-text media report
#[derive(Debug, Clone)]
pub struct AnalyzeStep {
    report_path: PathBuf,
}

impl AnalyzeStep {
    pub fn new(report_path: impl Into<PathBuf>) -> Self {
        Self {
            report_path: report_path.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for AnalyzeStep {
    fn name(&self) -> &str {
        "analyze"
    }

    fn description(&self) -> String {
        "Analyze media properties".to_string()
    }

    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf> {
        let info = ctx.transcoder().media_info(input).await?;

        let mut report = format!("File: {}\n", input.display());
        report.push_str(&format!(
            "Resolution: {}\n",
            info.resolution().unwrap_or_else(|| "n/a".to_string())
        ));
        report.push_str(&format!("Frame rate: {:.1} fps\n", info.frame_rate().unwrap_or(0.0)));
        report.push_str(&format!(
            "Duration: {:.1}s\n",
            info.duration().map(|d| d.as_secs_f64()).unwrap_or(0.0)
        ));
        report.push_str(&format!("Size: {}\n", FileManager::format_size(info.size().unwrap_or(0))));
        report.push_str(&format!("Summary: {}\n", info.summary()));

        if let Some(parent) = self.report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.report_path, report).await?;

        debug!("Analysis saved to {}", self.report_path.display());
        Ok(input.to_path_buf())
    }
}
