//! # Image Translate
//!
//! Batch translation of the text inside images, backed by an image-editing
//! generative model (Gemini `generateContent`).
//!
//! ## Key Features
//!
//! - **Ordered batch queue** with a per-item lifecycle
//!   (`Idle -> Processing -> Completed | Error`) and cheap snapshots
//! - **Sequential orchestrator**: one model call at a time, in insertion order;
//!   a rejected credential halts the whole run, every other failure stays on
//!   its item
//! - **Retry with linear backoff** for transient model overloads (3 attempts,
//!   2s then 4s)
//! - **Progress events** through a [`ProgressSink`], with a Tauri `AppHandle`
//!   sink behind the `tauri` feature
//! - **Export** of completed results as `translated_{stem}_{Language}.{ext}`,
//!   with the extension taken from the result media type
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use image_translate::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = TranslatorConfig::from_env()?;
//! let translator = Translator::from_config(config)?;
//!
//! let queue = Arc::new(BatchQueue::new());
//! queue.add([SourceImage::from_path("menu.jpg".as_ref())?])?;
//!
//! let session = Arc::new(SessionState::new(true));
//! session.set_target_language(TargetLanguage::Japanese);
//!
//! let orchestrator = BatchOrchestrator::new(translator, queue.clone(), session);
//! let summary = orchestrator.run_batch().await?;
//! println!("{} translated, {} failed", summary.succeeded, summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod export;
pub mod prompt;
pub mod queue;
pub mod retry;
pub mod session;
pub mod translator;
pub mod types;

pub use client::{GeminiClient, ImageEditModel};
pub use config::{ImageSize, TranslatorConfig};
pub use error::{
    ConfigError, ErrorKind, ExportError, OrchestratorError, QueueError, Result, TranslateError,
};
pub use events::{ChannelSink, NoopSink, ProgressEvent, ProgressSink};
pub use executor::BatchOrchestrator;
pub use export::{export_completed, ExportConfig};
pub use queue::BatchQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use session::{SessionSnapshot, SessionState};
pub use translator::Translator;
pub use types::{
    BatchItem, BatchItemStatus, BatchSummary, QueueCounts, SourceImage, TargetLanguage,
    TranslatedImage,
};
