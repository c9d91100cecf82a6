use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ExportError;
use crate::queue::BatchQueue;
use crate::types::{TargetLanguage, TranslatedImage};

/// Pause between consecutive file writes.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub stagger: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            stagger: DEFAULT_STAGGER,
        }
    }
}

impl ExportConfig {
    pub fn stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }
}

/// `translated_{stem}_{Language}.{ext}`, where `stem` is everything before the
/// first `.` of the original name. Any directory part of the name is dropped.
pub fn export_file_name(original: &str, language: TargetLanguage, result: &TranslatedImage) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = base.split('.').next().unwrap_or_default();
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("translated_{}_{}.{}", stem, language, result.extension())
}

/// One file to be written by [`export_completed`].
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub item_id: String,
    pub file_name: String,
    pub image: Arc<TranslatedImage>,
}

/// Plan output names for every completed item, in queue order.
///
/// Names that would collide get a ` (n)` suffix before the extension.
pub fn plan_exports(queue: &BatchQueue, language: TargetLanguage) -> Vec<ExportEntry> {
    let mut taken = HashSet::new();
    queue
        .completed()
        .into_iter()
        .filter_map(|item| {
            let base = export_file_name(item.file_name(), language, item.result.as_deref()?);
            let image = item.result?;
            let file_name = unique_name(&base, &mut taken);
            Some(ExportEntry {
                item_id: item.id,
                file_name,
                image,
            })
        })
        .collect()
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let (stem, ext) = base.rsplit_once('.').unwrap_or((base, ""));
    let mut n = 1;
    loop {
        let candidate = if ext.is_empty() {
            format!("{} ({})", stem, n)
        } else {
            format!("{} ({}).{}", stem, n, ext)
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write every completed result into `dir`, pausing `config.stagger` between files.
///
/// Returns the written paths in queue order.
pub async fn export_completed(
    queue: &BatchQueue,
    language: TargetLanguage,
    dir: &Path,
    config: &ExportConfig,
) -> Result<Vec<PathBuf>, ExportError> {
    let entries = plan_exports(queue, language);
    if entries.is_empty() {
        debug!("no completed items to export");
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Write {
            path: dir.display().to_string(),
            source,
        })?;

    let mut written = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 && !config.stagger.is_zero() {
            tokio::time::sleep(config.stagger).await;
        }

        let path = dir.join(&entry.file_name);
        tokio::fs::write(&path, &entry.image.bytes)
            .await
            .map_err(|source| ExportError::Write {
                path: path.display().to_string(),
                source,
            })?;
        debug!(item = %entry.item_id, path = %path.display(), "exported result");
        written.push(path);
    }

    info!(count = written.len(), dir = %dir.display(), "export finished");
    Ok(written)
}
