//! Translate every image in a folder and export the results.
//!
//! ```text
//! GEMINI_API_KEY=... cargo run --example translate_folder -- <input-dir> <language> [output-dir]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use image_translate::{
    export_completed, BatchOrchestrator, BatchQueue, ChannelSink, ExportConfig, ProgressEvent,
    SessionState, SourceImage, TargetLanguage, Translator, TranslatorConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("image_translate=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: translate_folder <input-dir> <language> [output-dir]");
    };
    let language: TargetLanguage = args
        .next()
        .unwrap_or_else(|| "English".to_string())
        .parse()?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.join("translated"));

    let config = TranslatorConfig::from_env().context("loading translator config")?;
    tracing::info!(?config, "using model");
    let translator = Translator::from_config(config)?;

    let mut sources = Vec::new();
    for entry in std::fs::read_dir(&input).with_context(|| format!("reading {}", input.display()))? {
        let path = entry?.path();
        if path.is_file() {
            sources.push(SourceImage::from_path(&path)?);
        }
    }
    sources.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let queue = Arc::new(BatchQueue::new());
    let added = queue.add(sources)?;
    if added.is_empty() {
        bail!("no images found in {}", input.display());
    }

    let session = Arc::new(SessionState::new(true));
    session.set_target_language(language);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = BatchOrchestrator::new(translator, queue.clone(), session.clone())
        .with_sink(Arc::new(ChannelSink::new(tx)));

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let ProgressEvent::ItemStatus(e) = event {
                match &e.error {
                    Some(err) => println!("[{}/{}] {} {:?}: {}", e.finished, e.total, e.file_name, e.status, err),
                    None => println!("[{}/{}] {} {:?}", e.finished, e.total, e.file_name, e.status),
                }
            }
        }
    });

    let summary = orchestrator.run_batch().await?;
    drop(orchestrator);
    printer.await?;

    if let Some(notice) = session.global_error() {
        eprintln!("{}", notice);
    }
    println!(
        "{} succeeded, {} failed in {}ms",
        summary.succeeded, summary.failed, summary.total_duration_ms
    );

    let written = export_completed(&queue, language, &output, &ExportConfig::default()).await?;
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
