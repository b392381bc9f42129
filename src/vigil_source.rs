//! Media source selection and the analysis gate.
//!
//! A source is either a remote video URL (kept verbatim and parsed on every read, the
//! operator may still be typing) or an uploaded file held through an [`ObjectHandle`].
//! Analysis may only start from a source that validates.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::vigil_core::ValidationError;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Recognised remote URL layouts, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    WatchQuery,
    ShortLink,
    EmbedPath,
    LegacyVPath,
}

fn url_patterns() -> &'static [(UrlShape, Regex)] {
    static PATTERNS: OnceLock<Vec<(UrlShape, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (UrlShape::WatchQuery, r"(?i:youtube\.com)/watch\?(?:[^#\s]*&)?v=([^&?#/\s]+)"),
            (UrlShape::ShortLink, r"(?i:youtu\.be)/([^&?#/\s]+)"),
            (UrlShape::EmbedPath, r"(?i:youtube\.com)/embed/([^&?#/\s]+)"),
            (UrlShape::LegacyVPath, r"(?i:youtube\.com)/v/([^&?#/\s]+)"),
        ]
        .into_iter()
        .map(|(shape, pattern)| (shape, Regex::new(pattern).expect("static url pattern")))
        .collect()
    })
}

/// Extract the video identifier from a remote URL.
///
/// The first shape whose pattern matches wins; `None` means the input is invalid for
/// starting analysis.
pub fn parse_video_url(input: &str) -> Option<(UrlShape, String)> {
    url_patterns().iter().find_map(|(shape, pattern)| {
        pattern
            .captures(input)
            .and_then(|captures| captures.get(1))
            .map(|id| (*shape, id.as_str().to_string()))
    })
}

pub fn parse_video_id(input: &str) -> Option<String> {
    parse_video_url(input).map(|(_, id)| id)
}

/// A file offered by the upload collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub declared_type: String,
    pub size_bytes: u64,
    pub file_name: String,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("declared_type", &self.declared_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

impl FileUpload {
    pub fn new(
        bytes: Vec<u8>,
        declared_type: impl Into<String>,
        size_bytes: u64,
        file_name: impl Into<String>,
    ) -> Self {
        Self { bytes, declared_type: declared_type.into(), size_bytes, file_name: file_name.into() }
    }

    /// Read a file from disk, declaring its media type from the extension.
    ///
    /// Files above [`MAX_UPLOAD_BYTES`] are not read; the returned upload carries only
    /// the size so validation can reject it.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let size_bytes = std::fs::metadata(path)?.len();
        let bytes = if size_bytes > MAX_UPLOAD_BYTES { Vec::new() } else { std::fs::read(path)? };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { bytes, declared_type: media_type_for_path(path).to_string(), size_bytes, file_name })
    }
}

pub fn media_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" | "log" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Both upload preconditions: video media category and size limit.
pub fn validate_upload(upload: &FileUpload, limit_bytes: u64) -> Result<(), ValidationError> {
    let declared = upload.declared_type.trim().to_ascii_lowercase();
    if !declared.starts_with("video/") {
        return Err(ValidationError::UnsupportedMediaType {
            declared: upload.declared_type.clone(),
        });
    }
    if upload.size_bytes > limit_bytes {
        return Err(ValidationError::FileTooLarge { size_bytes: upload.size_bytes, limit_bytes });
    }
    Ok(())
}

/// Human readable byte count (binary units).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Allocates [`ObjectHandle`]s and counts the ones still alive.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<AtomicUsize>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, bytes: Vec<u8>) -> ObjectHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:vigil/{}", Uuid::new_v4());
        debug!(%url, len = bytes.len(), "allocated object handle");
        ObjectHandle { url, bytes: bytes.into(), live: self.live.clone() }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Scoped playback handle for uploaded bytes. Released when dropped.
pub struct ObjectHandle {
    url: String,
    bytes: Arc<[u8]>,
    live: Arc<AtomicUsize>,
}

impl ObjectHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("url", &self.url)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!(url = %self.url, "released object handle");
    }
}

/// The operator-chosen input.
#[derive(Debug, Default)]
pub enum MediaSource {
    #[default]
    None,
    RemoteUrl { raw: String },
    UploadedFile { handle: ObjectHandle, file_name: String, size_bytes: u64 },
}

impl MediaSource {
    /// Parsed identifier of a remote URL; recomputed on every call.
    pub fn parsed_id(&self) -> Option<String> {
        match self {
            Self::RemoteUrl { raw } => parse_video_id(raw),
            _ => None,
        }
    }

    /// Whether analysis could start from this source.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::None => false,
            Self::RemoteUrl { .. } => self.parsed_id().is_some(),
            Self::UploadedFile { .. } => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Short label used in log messages and the status bar.
    pub fn label(&self) -> String {
        match self {
            Self::None => "no source".to_string(),
            Self::RemoteUrl { raw } => match parse_video_id(raw) {
                Some(id) => format!("video {id}"),
                None => format!("unrecognised URL {raw}"),
            },
            Self::UploadedFile { file_name, .. } => format!("file {file_name}"),
        }
    }

    /// Handle-free, serializable view for presentation.
    pub fn view(&self) -> SourceView {
        match self {
            Self::None => SourceView::None,
            Self::RemoteUrl { raw } => {
                SourceView::RemoteUrl { raw: raw.clone(), video_id: parse_video_id(raw) }
            }
            Self::UploadedFile { handle, file_name, size_bytes } => SourceView::UploadedFile {
                file_name: file_name.clone(),
                size_bytes: *size_bytes,
                handle_url: handle.url().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceView {
    None,
    RemoteUrl { raw: String, video_id: Option<String> },
    UploadedFile { file_name: String, size_bytes: u64, handle_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { label: String },
    AlreadyRunning,
}

/// Source state machine plus the analysis gate.
#[derive(Debug)]
pub struct SourceSelector {
    source: MediaSource,
    analysis: AnalysisState,
    handles: HandleRegistry,
    max_upload_bytes: u64,
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSelector {
    pub fn new() -> Self {
        Self::with_registry(HandleRegistry::new())
    }

    pub fn with_registry(handles: HandleRegistry) -> Self {
        Self {
            source: MediaSource::None,
            analysis: AnalysisState::Idle,
            handles,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn analysis(&self) -> AnalysisState {
        self.analysis
    }

    pub fn is_running(&self) -> bool {
        self.analysis == AnalysisState::Running
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Store remote URL text verbatim, dropping any uploaded file.
    ///
    /// Blank text resets the source to `None`. Parsing is deferred to reads.
    pub fn select_remote(&mut self, raw: &str) -> Result<(), ValidationError> {
        self.ensure_idle()?;
        self.source = if raw.trim().is_empty() {
            MediaSource::None
        } else {
            MediaSource::RemoteUrl { raw: raw.to_string() }
        };
        Ok(())
    }

    /// Adopt an upload, replacing any URL text or previous file.
    ///
    /// On rejection the current source is left untouched.
    pub fn select_file(&mut self, upload: FileUpload) -> Result<(), ValidationError> {
        self.ensure_idle()?;
        validate_upload(&upload, self.max_upload_bytes)?;

        let FileUpload { bytes, file_name, size_bytes, .. } = upload;
        let handle = self.handles.allocate(bytes);
        info!(file = %file_name, size_bytes, handle = handle.url(), "adopted uploaded file");
        self.source = MediaSource::UploadedFile { handle, file_name, size_bytes };
        Ok(())
    }

    pub fn start(&mut self) -> Result<StartOutcome, ValidationError> {
        if self.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let label = match &self.source {
            MediaSource::None => return Err(ValidationError::NoSource),
            MediaSource::RemoteUrl { raw } => match parse_video_id(raw) {
                Some(id) => format!("video {id}"),
                None => return Err(ValidationError::InvalidUrl { input: raw.clone() }),
            },
            MediaSource::UploadedFile { file_name, .. } => format!("file {file_name}"),
        };
        self.analysis = AnalysisState::Running;
        Ok(StartOutcome::Started { label })
    }

    /// Back to Idle. The selected source is kept for a later restart.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.analysis = AnalysisState::Idle;
        true
    }

    /// Explicit cancel; only while Idle. Returns whether anything was held.
    pub fn clear(&mut self) -> Result<bool, ValidationError> {
        self.ensure_idle()?;
        let held = !self.source.is_none();
        self.source = MediaSource::None;
        Ok(held)
    }

    /// Drop everything regardless of state (session teardown).
    pub fn release(&mut self) -> bool {
        let held = matches!(self.source, MediaSource::UploadedFile { .. });
        self.source = MediaSource::None;
        self.analysis = AnalysisState::Idle;
        held
    }

    fn ensure_idle(&self) -> Result<(), ValidationError> {
        if self.is_running() {
            return Err(ValidationError::AnalysisRunning);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;

    const MIB: u64 = 1024 * 1024;

    #[fixture]
    fn selector() -> SourceSelector {
        SourceSelector::new()
    }

    fn video(size_bytes: u64) -> FileUpload {
        FileUpload::new(vec![0u8; 16], "video/mp4", size_bytes, "lobby.mp4")
    }

    #[rstest]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", UrlShape::WatchQuery, "dQw4w9WgXcQ")]
    #[case("https://youtube.com/watch?feature=share&v=XyZ_12-3&t=42", UrlShape::WatchQuery, "XyZ_12-3")]
    #[case("https://youtu.be/abc123", UrlShape::ShortLink, "abc123")]
    #[case("youtu.be/abc123?t=5", UrlShape::ShortLink, "abc123")]
    #[case("https://www.youtube.com/embed/emb42?autoplay=1", UrlShape::EmbedPath, "emb42")]
    #[case("http://www.YouTube.com/v/legacy9", UrlShape::LegacyVPath, "legacy9")]
    fn parses_recognised_shapes(#[case] url: &str, #[case] shape: UrlShape, #[case] id: &str) {
        assert_eq!(parse_video_url(url), Some((shape, id.to_string())));
    }

    #[rstest]
    #[case("https://example.com/video")]
    #[case("https://youtube.com/")]
    #[case("not a url")]
    #[case("")]
    fn rejects_unrecognised_urls(#[case] url: &str) {
        assert_eq!(parse_video_id(url), None);
    }

    #[rstest]
    fn remote_url_is_stored_verbatim_and_parsed_on_read(mut selector: SourceSelector) {
        selector.select_remote("https://youtu.be/ab").unwrap();
        assert_eq!(selector.source().parsed_id().as_deref(), Some("ab"));

        selector.select_remote("https://youtu.be/abc123").unwrap();
        match selector.source() {
            MediaSource::RemoteUrl { raw } => assert_eq!(raw, "https://youtu.be/abc123"),
            other => panic!("unexpected source: {other:?}"),
        }
        assert_eq!(selector.source().parsed_id().as_deref(), Some("abc123"));
    }

    #[rstest]
    fn blank_url_resets_source(mut selector: SourceSelector) {
        selector.select_remote("https://youtu.be/abc123").unwrap();
        selector.select_remote("   ").unwrap();
        assert!(selector.source().is_none());
    }

    #[rstest]
    fn file_replaces_url_and_url_releases_file(mut selector: SourceSelector) {
        selector.select_remote("https://youtu.be/abc123").unwrap();
        selector.select_file(video(50 * MIB)).unwrap();
        assert!(matches!(selector.source(), MediaSource::UploadedFile { .. }));
        assert_eq!(selector.handles().live(), 1);

        selector.select_file(video(MIB)).unwrap();
        assert_eq!(selector.handles().live(), 1);

        selector.select_remote("https://youtu.be/abc123").unwrap();
        assert_eq!(selector.handles().live(), 0);
    }

    #[rstest]
    #[case::too_large(video(101 * MIB))]
    #[case::not_video(FileUpload::new(Vec::new(), "image/png", 10, "face.png"))]
    fn rejected_upload_leaves_source_unchanged(mut selector: SourceSelector, #[case] upload: FileUpload) {
        selector.select_remote("https://youtu.be/abc123").unwrap();
        assert!(selector.select_file(upload).is_err());
        assert_eq!(selector.source().parsed_id().as_deref(), Some("abc123"));
        assert_eq!(selector.handles().live(), 0);
    }

    #[test]
    fn exact_limit_is_accepted() {
        assert!(validate_upload(&video(MAX_UPLOAD_BYTES), MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(
            validate_upload(&video(MAX_UPLOAD_BYTES + 1), MAX_UPLOAD_BYTES),
            Err(ValidationError::FileTooLarge {
                size_bytes: MAX_UPLOAD_BYTES + 1,
                limit_bytes: MAX_UPLOAD_BYTES
            })
        );
    }

    #[rstest]
    fn start_requires_valid_source(mut selector: SourceSelector) {
        assert_eq!(selector.start(), Err(ValidationError::NoSource));

        selector.select_remote("https://example.com/video").unwrap();
        assert_eq!(
            selector.start(),
            Err(ValidationError::InvalidUrl { input: "https://example.com/video".to_string() })
        );
        assert_eq!(selector.analysis(), AnalysisState::Idle);

        selector.select_remote("https://youtu.be/abc123").unwrap();
        assert_eq!(
            selector.start(),
            Ok(StartOutcome::Started { label: "video abc123".to_string() })
        );
        assert_eq!(selector.start(), Ok(StartOutcome::AlreadyRunning));
    }

    #[rstest]
    fn running_locks_source_until_stopped(mut selector: SourceSelector) {
        selector.select_file(video(MIB)).unwrap();
        selector.start().unwrap();

        assert_eq!(selector.clear(), Err(ValidationError::AnalysisRunning));
        assert_eq!(selector.select_remote("https://youtu.be/x"), Err(ValidationError::AnalysisRunning));

        assert!(selector.stop());
        assert!(!selector.stop());
        assert!(matches!(selector.source(), MediaSource::UploadedFile { .. }));
        assert!(matches!(selector.start(), Ok(StartOutcome::Started { .. })));
    }

    #[rstest]
    fn clear_and_release_drop_handle(mut selector: SourceSelector) {
        selector.select_file(video(MIB)).unwrap();
        assert_eq!(selector.clear(), Ok(true));
        assert_eq!(selector.handles().live(), 0);
        assert_eq!(selector.clear(), Ok(false));

        selector.select_file(video(MIB)).unwrap();
        selector.start().unwrap();
        assert!(selector.release());
        assert_eq!(selector.handles().live(), 0);
        assert_eq!(selector.analysis(), AnalysisState::Idle);
    }

    #[test]
    fn upload_from_path_declares_type_from_extension() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("Clip.MP4");
        fs::write(&path, b"frames").expect("write clip");

        let upload = FileUpload::from_path(&path).expect("read upload");
        assert_eq!(upload.declared_type, "video/mp4");
        assert_eq!(upload.size_bytes, 6);
        assert_eq!(upload.bytes, b"frames");
        assert_eq!(upload.file_name, "Clip.MP4");
    }

    #[rstest]
    #[case(512, "512 B")]
    #[case(1536, "1.5 KiB")]
    #[case(50 * MIB, "50.0 MiB")]
    fn formats_sizes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_size(bytes), expected);
    }
}
