//! Per-document pipeline.
//!
//! Generation, segmenting, voice-over, acquisition and assembly for one input
//! document, strictly in that order. Segments are acquired one after another
//! in narration order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use tracing::Instrument;

use reelgen_media::{FfmpegToolkit, MediaToolkit};
use reelgen_models::{ClipFile, Segment};

use crate::allocator::{allocate, pair_queries};
use crate::assembler::{Assembler, AssemblyReport};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::fallback::{FallbackAcquirer, FallbackSource, YtDlpSource};
use crate::library::{load_cookies, LibraryAcquirer, LibrarySource, StockLibraryClient};
use crate::logging::DocumentLogger;
use crate::narration::{
    generate_narration, NarrationGenerator, OpenAiNarrator, UnavailableNarrator,
};
use crate::router::{SegmentAcquirer, SourceRouter};
use crate::segmenter::{narration_script, parse_narration};
use crate::voice::{CommandVoiceOver, ExistingVoiceOver, VoiceOverSynthesizer};
use crate::workspace::{collect_clip_files, write_document_meta, DocumentWorkspace};

/// Collaborators the pipeline runs against.
pub struct PipelineParts {
    pub narrator: Arc<dyn NarrationGenerator>,
    pub voice: Arc<dyn VoiceOverSynthesizer>,
    pub library: Arc<dyn LibrarySource>,
    pub fallback: Arc<dyn FallbackSource>,
    pub toolkit: Arc<dyn MediaToolkit>,
}

/// Turns input documents into finished videos.
pub struct DocumentPipeline {
    config: PipelineConfig,
    narrator: Arc<dyn NarrationGenerator>,
    voice: Arc<dyn VoiceOverSynthesizer>,
    toolkit: Arc<dyn MediaToolkit>,
    acquirer: SegmentAcquirer,
    assembler: Assembler,
}

impl DocumentPipeline {
    pub fn new(config: PipelineConfig, parts: PipelineParts) -> PipelineResult<Self> {
        let router = SourceRouter::new(config.fallback_probability)?;
        let acquirer = SegmentAcquirer::new(
            router,
            LibraryAcquirer::new(parts.library),
            FallbackAcquirer::new(parts.fallback, parts.toolkit.clone()),
        );

        Ok(Self {
            config,
            narrator: parts.narrator,
            voice: parts.voice,
            assembler: Assembler::new(parts.toolkit.clone()),
            toolkit: parts.toolkit,
            acquirer,
        })
    }

    /// Wire the production collaborators from `config`.
    pub async fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        let narrator: Arc<dyn NarrationGenerator> =
            match OpenAiNarrator::from_config(&config).await {
                Ok(narrator) => Arc::new(narrator),
                Err(e) => {
                    tracing::warn!("Narration generation unavailable: {}", e);
                    Arc::new(UnavailableNarrator::new(e.to_string()))
                }
            };

        let voice: Arc<dyn VoiceOverSynthesizer> = match &config.voice_command {
            Some(command) => Arc::new(CommandVoiceOver::new(command)?),
            None => Arc::new(ExistingVoiceOver::new(config.source_dir.clone())),
        };

        let cookies = match load_cookies(&config.library.cookies_path).await {
            Ok(cookies) => {
                tracing::info!(count = cookies.len(), "Library cookies loaded");
                cookies
            }
            Err(e) => {
                tracing::warn!("Continuing without library cookies: {}", e);
                BTreeMap::new()
            }
        };
        let library = Arc::new(StockLibraryClient::new(
            &config.library,
            config.request_timeout,
            &cookies,
        )?);

        let toolkit = Arc::new(FfmpegToolkit::new(config.encoding.clone()));

        Self::new(
            config,
            PipelineParts {
                narrator,
                voice,
                library,
                fallback: Arc::new(YtDlpSource::default()),
                toolkit,
            },
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for one input document.
    pub async fn run_document<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        document: &Path,
    ) -> PipelineResult<AssemblyReport> {
        let workspace = DocumentWorkspace::new(&self.config.process_dir, document);
        let logger = DocumentLogger::new(workspace.name(), "pipeline");
        let span = logger.create_span();

        let result = self
            .run_stages(rng, document, &workspace, &logger)
            .instrument(span)
            .await;
        if let Err(e) = &result {
            logger.log_error(&e.to_string());
        }
        result
    }

    async fn run_stages<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        document: &Path,
        workspace: &DocumentWorkspace,
        logger: &DocumentLogger,
    ) -> PipelineResult<AssemblyReport> {
        let generation = logger.stage("generation");
        generation.log_start(&document.display().to_string());
        let input = tokio::fs::read_to_string(document).await?;
        let narration = generate_narration(self.narrator.as_ref(), &input).await?;
        workspace.create().await?;
        tokio::fs::write(workspace.narration_path(), &narration).await?;
        generation.log_completion("narration received");

        let segments = parse_narration(&narration)?;
        write_document_meta(&segments, workspace).await?;

        let voice = logger.stage("voice_over");
        voice.log_start("synthesizing");
        let voice_path = workspace.voiceover_path();
        self.voice
            .synthesize(workspace.name(), &narration_script(&segments), &voice_path)
            .await?;
        let voice_seconds = self.toolkit.probe_duration(&voice_path).await?;
        voice.log_completion(&format!("{:.1}s of audio", voice_seconds));

        let clips = self
            .acquire_clips(rng, &segments, voice_seconds, workspace, &logger.stage("acquisition"))
            .await?;

        self.assemble(&segments, &clips, workspace, &logger.stage("assembly"))
            .await
    }

    async fn acquire_clips<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        segments: &[Segment],
        voice_seconds: f64,
        workspace: &DocumentWorkspace,
        logger: &DocumentLogger,
    ) -> PipelineResult<Vec<ClipFile>> {
        let budgets = allocate(segments, voice_seconds);
        let pairs = pair_queries(segments, &budgets);
        logger.log_start(&format!("{} segments", pairs.len()));

        let videos_dir = workspace.videos_dir();
        let mut clips = Vec::new();
        for (query, budget) in pairs {
            let acquired = self
                .acquirer
                .acquire_segment(rng, query, budget, &videos_dir)
                .await?;
            if acquired.is_empty() {
                logger.log_warning(&format!("segment {} has no footage", budget.segment_index));
            } else {
                logger.log_progress(&format!(
                    "segment {}: {} clips for {:.1}s",
                    budget.segment_index,
                    acquired.len(),
                    budget.seconds
                ));
            }
            clips.extend(acquired);
        }

        logger.log_completion(&format!("{} clips", clips.len()));
        Ok(clips)
    }

    async fn assemble(
        &self,
        segments: &[Segment],
        clips: &[ClipFile],
        workspace: &DocumentWorkspace,
        logger: &DocumentLogger,
    ) -> PipelineResult<AssemblyReport> {
        logger.log_start(&format!("{} clips", clips.len()));
        let output = workspace.output_path(&self.config.output_dir);
        let report = self
            .assembler
            .assemble(segments, clips, &workspace.voiceover_path(), &output)
            .await?;
        logger.log_completion(&format!(
            "{} ({:.1}s of {:.1}s voice-over)",
            report.output.display(),
            report.timeline_seconds,
            report.voice_seconds
        ));
        Ok(report)
    }

    /// Assemble a document from what an earlier run left in its working directory.
    pub async fn reassemble(&self, workspace: &DocumentWorkspace) -> PipelineResult<AssemblyReport> {
        let logger = DocumentLogger::new(workspace.name(), "reassembly");
        let span = logger.create_span();

        let result = self
            .reassemble_stages(workspace, &logger)
            .instrument(span)
            .await;
        if let Err(e) = &result {
            logger.log_error(&e.to_string());
        }
        result
    }

    async fn reassemble_stages(
        &self,
        workspace: &DocumentWorkspace,
        logger: &DocumentLogger,
    ) -> PipelineResult<AssemblyReport> {
        let narration = tokio::fs::read_to_string(workspace.narration_path()).await?;
        let segments = parse_narration(&narration)?;
        let clips = collect_clip_files(workspace.videos_dir(), self.toolkit.as_ref()).await?;
        self.assemble(&segments, &clips, workspace, logger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::testing::{entry, FakePlatform, FakeToolkit, FixedNarrator, RecordingVoice, StaticLibrary};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    const NARRATION: &str = "TITLE: Rivers\n###\nTEXT: Rivers carve valleys over ages.\n###\n\
                             QUERY: river valley\n###\nTEXT: Deltas form where rivers meet the sea, slowly.\n###\n\
                             QUERY: river delta\n###\nDESCRIPTION: A short film about rivers.";

    struct Harness {
        _dir: TempDir,
        config: PipelineConfig,
        voice: Arc<RecordingVoice>,
        toolkit: Arc<FakeToolkit>,
        document: std::path::PathBuf,
    }

    fn harness(narration: &str) -> (Harness, DocumentPipeline) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        let document = source.join("rivers.txt");
        std::fs::write(&document, "Everything about rivers.").unwrap();

        let config = PipelineConfig {
            source_dir: source,
            process_dir: dir.path().join("process"),
            output_dir: dir.path().join("output"),
            fallback_probability: 30,
            ..Default::default()
        };

        let voice = Arc::new(RecordingVoice::default());
        // Platform source videos are long; the voice-over is a minute.
        let toolkit = Arc::new(FakeToolkit::new().with_default_duration(600.0));
        let workspace = DocumentWorkspace::new(&config.process_dir, &document);
        toolkit.set_duration(workspace.voiceover_path(), 60.0);
        let platform = FakePlatform {
            pages: vec![vec![entry("r1")]],
            with_stream: vec!["r1".to_string()],
            ..Default::default()
        };

        let pipeline = DocumentPipeline::new(
            config.clone(),
            PipelineParts {
                narrator: Arc::new(FixedNarrator(narration.to_string())),
                voice: voice.clone(),
                library: Arc::new(StaticLibrary::with_durations(&[10, 10, 10, 10, 10, 10])),
                fallback: Arc::new(platform),
                toolkit: toolkit.clone(),
            },
        )
        .unwrap();

        (
            Harness {
                _dir: dir,
                config,
                voice,
                toolkit,
                document,
            },
            pipeline,
        )
    }

    #[tokio::test]
    async fn test_run_document_produces_video_and_meta() {
        let (h, pipeline) = harness(NARRATION);
        let mut rng = StdRng::seed_from_u64(17);

        let report = pipeline.run_document(&mut rng, &h.document).await.unwrap();

        let workspace = DocumentWorkspace::new(&h.config.process_dir, &h.document);
        assert_eq!(report.output, h.config.output_dir.join("rivers.mp4"));
        assert!(report.output.exists());
        assert_eq!(
            std::fs::read_to_string(workspace.meta_path()).unwrap(),
            "Rivers\n\nA short film about rivers."
        );
        assert_eq!(
            std::fs::read_to_string(workspace.narration_path()).unwrap(),
            NARRATION
        );
        assert_eq!(
            *h.voice.texts.lock().unwrap(),
            vec!["Rivers carve valleys over ages. Deltas form where rivers meet the sea, slowly.".to_string()]
        );

        assert!((report.voice_seconds - 60.0).abs() < 1e-9);
        assert_eq!(report.segments.len(), 2);
        for segment in &report.segments {
            assert!(segment.clips_used > 0);
            assert!(segment.achieved_seconds <= segment.budget_seconds + 1e-9);
        }
        assert!(report.timeline_seconds > 0.0);
        assert!(!h.toolkit.calls().is_empty());
    }

    #[tokio::test]
    async fn test_narration_without_text_fails_document() {
        let (h, pipeline) = harness("TITLE: Nothing to say ### QUERY: void");
        let mut rng = StdRng::seed_from_u64(1);

        let err = pipeline.run_document(&mut rng, &h.document).await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(h.voice.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reassemble_from_workspace() {
        let (h, pipeline) = harness(NARRATION);
        let mut rng = StdRng::seed_from_u64(3);
        let first = pipeline.run_document(&mut rng, &h.document).await.unwrap();
        std::fs::remove_file(&first.output).unwrap();

        let workspace = DocumentWorkspace::new(&h.config.process_dir, &h.document);
        let again = pipeline.reassemble(&workspace).await.unwrap();

        assert!(again.output.exists());
        assert_eq!(again.segments.len(), 2);
    }

    #[tokio::test]
    async fn test_reassemble_without_narration_fails() {
        let (h, pipeline) = harness(NARRATION);
        let workspace = DocumentWorkspace::new(&h.config.process_dir, &h.document);
        workspace.create().await.unwrap();

        let err = pipeline.reassemble(&workspace).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
        assert!(!workspace.output_path(&h.config.output_dir).exists());
    }

    #[tokio::test]
    async fn test_missing_document_is_io_error() {
        let (h, pipeline) = harness(NARRATION);
        let mut rng = StdRng::seed_from_u64(1);
        let err = pipeline
            .run_document(&mut rng, &h.config.source_dir.join("absent.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
