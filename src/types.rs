use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::UnknownLanguage;

/// Language that translated text is rendered in.
///
/// One language applies to every item of a batch run; it is not stored per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetLanguage {
    #[serde(rename = "Chinese (Simplified)")]
    ChineseSimplified,
    #[serde(rename = "Chinese (Traditional)")]
    ChineseTraditional,
    #[default]
    English,
    Japanese,
    Korean,
    Spanish,
    French,
    German,
    Russian,
    Portuguese,
    Italian,
    Vietnamese,
    Thai,
    Indonesian,
    Arabic,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 15] = [
        TargetLanguage::ChineseSimplified,
        TargetLanguage::ChineseTraditional,
        TargetLanguage::English,
        TargetLanguage::Japanese,
        TargetLanguage::Korean,
        TargetLanguage::Spanish,
        TargetLanguage::French,
        TargetLanguage::German,
        TargetLanguage::Russian,
        TargetLanguage::Portuguese,
        TargetLanguage::Italian,
        TargetLanguage::Vietnamese,
        TargetLanguage::Thai,
        TargetLanguage::Indonesian,
        TargetLanguage::Arabic,
    ];

    /// Name used in the model instruction and in exported file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLanguage::ChineseSimplified => "Chinese (Simplified)",
            TargetLanguage::ChineseTraditional => "Chinese (Traditional)",
            TargetLanguage::English => "English",
            TargetLanguage::Japanese => "Japanese",
            TargetLanguage::Korean => "Korean",
            TargetLanguage::Spanish => "Spanish",
            TargetLanguage::French => "French",
            TargetLanguage::German => "German",
            TargetLanguage::Russian => "Russian",
            TargetLanguage::Portuguese => "Portuguese",
            TargetLanguage::Italian => "Italian",
            TargetLanguage::Vietnamese => "Vietnamese",
            TargetLanguage::Thai => "Thai",
            TargetLanguage::Indonesian => "Indonesian",
            TargetLanguage::Arabic => "Arabic",
        }
    }

    /// BCP 47 style short code, accepted by [`FromStr`] alongside the full name.
    pub fn code(&self) -> &'static str {
        match self {
            TargetLanguage::ChineseSimplified => "zh-CN",
            TargetLanguage::ChineseTraditional => "zh-TW",
            TargetLanguage::English => "en",
            TargetLanguage::Japanese => "ja",
            TargetLanguage::Korean => "ko",
            TargetLanguage::Spanish => "es",
            TargetLanguage::French => "fr",
            TargetLanguage::German => "de",
            TargetLanguage::Russian => "ru",
            TargetLanguage::Portuguese => "pt",
            TargetLanguage::Italian => "it",
            TargetLanguage::Vietnamese => "vi",
            TargetLanguage::Thai => "th",
            TargetLanguage::Indonesian => "id",
            TargetLanguage::Arabic => "ar",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetLanguage {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TargetLanguage::ALL
            .into_iter()
            .find(|lang| {
                lang.as_str().eq_ignore_ascii_case(wanted) || lang.code().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownLanguage(wanted.to_string()))
    }
}

/// Per-item status: `Idle -> Processing -> Completed | Error`, with `Error -> Processing`
/// when a later run picks the item up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchItemStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl BatchItemStatus {
    pub fn can_transition_to(self, next: BatchItemStatus) -> bool {
        use BatchItemStatus::*;
        matches!(
            (self, next),
            (Idle, Processing) | (Error, Processing) | (Processing, Completed) | (Processing, Error)
        )
    }

    /// Whether a batch run should pick this item up.
    pub fn is_pending(self) -> bool {
        matches!(self, BatchItemStatus::Idle | BatchItemStatus::Error)
    }
}

/// A user-submitted image: raw bytes plus declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Original file name, used to name exported results.
    pub file_name: String,
    /// Declared media type (e.g. `image/png`).
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, inferring its media type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, media_type_for_path(path), bytes))
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }
}

/// Map a file extension to an image media type.
///
/// Unknown extensions yield `application/octet-stream`, which the queue rejects.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "application/octet-stream",
    }
}

/// The edited image returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl TranslatedImage {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// File extension matching the media type (`png` when unknown).
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }
}

/// One queued image and its translation lifecycle.
///
/// `result` is set iff `status == Completed`; `error` is set iff `status == Error`.
/// Items are handed out as snapshots; only [`crate::BatchQueue`] mutates the stored copy.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub source: Arc<SourceImage>,
    /// Renderable preview of the source, derived once at creation.
    pub display_original: Arc<str>,
    pub status: BatchItemStatus,
    pub result: Option<Arc<TranslatedImage>>,
    pub error: Option<String>,
    /// RFC 3339 timestamp of when the item was queued.
    pub created_at: String,
}

impl BatchItem {
    pub(crate) fn new(source: SourceImage) -> Self {
        let display_original: Arc<str> = Arc::from(source.to_data_url());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: Arc::new(source),
            display_original,
            status: BatchItemStatus::Idle,
            result: None,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.source.file_name
    }
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub idle: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.idle + self.processing + self.completed + self.error
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub target_language: TargetLanguage,
    /// Items dispatched to the model.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Working-set items removed from the queue before they were reached.
    pub skipped: usize,
    /// The run stopped early on a permission failure.
    pub halted: bool,
    /// The run stopped early on a caller cancel request.
    pub cancelled: bool,
    pub total_duration_ms: u64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse_name_and_code() {
        assert_eq!("Japanese".parse::<TargetLanguage>().unwrap(), TargetLanguage::Japanese);
        assert_eq!(
            "chinese (traditional)".parse::<TargetLanguage>().unwrap(),
            TargetLanguage::ChineseTraditional
        );
        assert_eq!("zh-CN".parse::<TargetLanguage>().unwrap(), TargetLanguage::ChineseSimplified);
        assert!("Klingon".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn test_language_serde_uses_display_name() {
        let json = serde_json::to_string(&TargetLanguage::ChineseSimplified).unwrap();
        assert_eq!(json, r#""Chinese (Simplified)""#);
        let back: TargetLanguage = serde_json::from_str(r#""Korean""#).unwrap();
        assert_eq!(back, TargetLanguage::Korean);
    }

    #[test]
    fn test_default_language_is_english() {
        assert_eq!(TargetLanguage::default(), TargetLanguage::English);
    }

    #[test]
    fn test_status_transitions() {
        use BatchItemStatus::*;
        assert!(Idle.can_transition_to(Processing));
        assert!(Error.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));

        assert!(!Completed.can_transition_to(Processing));
        assert!(!Idle.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a/b.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(media_type_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        let img = SourceImage::new("x.png", "image/png", vec![1, 2, 3]);
        assert_eq!(img.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_result_extension() {
        assert_eq!(TranslatedImage::new("image/jpeg", vec![]).extension(), "jpg");
        assert_eq!(TranslatedImage::new("image/png", vec![]).extension(), "png");
        assert_eq!(TranslatedImage::new("application/x-unknown", vec![]).extension(), "png");
    }

    #[test]
    fn test_new_item_is_idle() {
        let item = BatchItem::new(SourceImage::new("x.png", "image/png", vec![0]));
        assert_eq!(item.status, BatchItemStatus::Idle);
        assert!(item.result.is_none());
        assert!(item.error.is_none());
        assert!(item.display_original.starts_with("data:image/png;base64,"));
    }
}
