//! Narration-to-video worker binary.
//!
//! `reelgen-worker` processes every document in the source directory.
//! `reelgen-worker assemble` re-renders documents already in the process
//! directory from their narration and clips.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use reelgen_worker::logging::init_tracing;
use reelgen_worker::workspace::{prepare_directories, source_documents, DocumentWorkspace, NARRATION_FILE};
use reelgen_worker::{DocumentPipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting reelgen-worker");

    let config = PipelineConfig::from_env();
    config.validate()?;
    info!(
        source_dir = %config.source_dir.display(),
        process_dir = %config.process_dir.display(),
        output_dir = %config.output_dir.display(),
        fallback_probability = config.fallback_probability,
        model = %config.openai_model,
        seed = ?config.seed,
        "Pipeline config loaded"
    );

    let reassemble_only = std::env::args().nth(1).as_deref() == Some("assemble");
    if !reassemble_only && config.openai_api_key.is_none() {
        anyhow::bail!("OPENAI_API_KEY must be set to generate narration");
    }
    let pipeline = DocumentPipeline::from_config(config).await?;

    if reassemble_only {
        reassemble_all(&pipeline).await
    } else {
        run_all(&pipeline).await
    }
}

async fn run_all(pipeline: &DocumentPipeline) -> anyhow::Result<()> {
    let config = pipeline.config();
    prepare_directories(config).await?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let documents = source_documents(&config.source_dir).await?;
    info!(count = documents.len(), "Source documents found");

    let mut failed = 0usize;
    for document in &documents {
        info!(document = %document.display(), "Processing");
        match pipeline.run_document(&mut rng, document).await {
            Ok(report) => info!(output = %report.output.display(), "Document done"),
            // The pipeline logs the failure against its document.
            Err(_) => failed += 1,
        }
    }

    info!(processed = documents.len(), failed = failed, "All documents processed");
    Ok(())
}

async fn reassemble_all(pipeline: &DocumentPipeline) -> anyhow::Result<()> {
    let process_dir = &pipeline.config().process_dir;
    let mut entries = tokio::fs::read_dir(process_dir).await?;
    let mut workspaces = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.join(NARRATION_FILE).is_file() {
            workspaces.push(DocumentWorkspace::open(path));
        }
    }
    workspaces.sort_by(|a, b| a.name().cmp(b.name()));

    let mut failed = 0usize;
    for workspace in &workspaces {
        if pipeline.reassemble(workspace).await.is_err() {
            failed += 1;
        }
    }
    info!(reassembled = workspaces.len() - failed, failed = failed, "Reassembly finished");
    Ok(())
}
