use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::ValidationError;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

/// Longest URL accepted by default.
pub const DEFAULT_MAX_URL_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Classify a bare extension (no dot), case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaType::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaType::Video)
        } else {
            None
        }
    }

    /// Classify by the extension of the last path segment of `url`.
    pub fn from_url(url: &Url) -> Option<Self> {
        path_extension(url).and_then(MediaType::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn path_extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// One curated media item as persisted in `gallery.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    #[serde(alias = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(alias = "added_at")]
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Entry {
    /// First tag in sorted order, used as a short label in listings.
    pub fn first_tag(&self) -> Option<&str> {
        self.tags.iter().next().map(String::as_str)
    }
}

/// Limits applied while validating a candidate.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    pub max_url_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self { max_url_len: DEFAULT_MAX_URL_LEN }
    }
}

/// Candidate entry as supplied by an admin, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub url: String,
    /// Comma-separated tag list, e.g. `"Cats, memes"`.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub nsfw: Option<bool>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { title: title.into(), url: url.into(), ..Default::default() }
    }

    pub fn tags(mut self, raw: impl Into<String>) -> Self {
        self.tags = raw.into();
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = Some(nsfw);
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Validate and normalize into a fresh `Entry` stamped with a new id and the current time.
    pub fn validate(self, limits: &ValidationLimits) -> Result<Entry, ValidationError> {
        self.validate_with(limits, Uuid::new_v4(), Utc::now())
    }

    pub(crate) fn validate_with(
        self,
        limits: &ValidationLimits,
        id: Uuid,
        added_at: DateTime<Utc>,
    ) -> Result<Entry, ValidationError> {
        let (url, media_type) = check_url(&self.url, limits)?;
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::InvalidTitle);
        }
        Ok(Entry {
            id,
            title: title.to_string(),
            url,
            media_type,
            tags: normalize_tags(&self.tags),
            nsfw: self.nsfw.unwrap_or(false),
            added_at,
            caption: non_blank(self.caption),
            author: non_blank(self.author),
            pinned: self.pinned,
        })
    }
}

/// Check scheme, host, length and extension; returns the trimmed URL and its media type.
pub fn check_url(raw: &str, limits: &ValidationLimits) -> Result<(String, MediaType), ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::InvalidUrl("url is required".into()));
    }
    if raw.chars().count() > limits.max_url_len {
        return Err(ValidationError::InvalidUrl(format!(
            "url is longer than {} characters",
            limits.max_url_len
        )));
    }
    let parsed = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl(format!("{raw}: {e}")))?;
    if parsed.scheme() != "https" {
        return Err(ValidationError::InvalidUrl(format!("{raw}: scheme must be https")));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl(format!("{raw}: missing host")));
    }
    let media_type = MediaType::from_url(&parsed)
        .ok_or_else(|| ValidationError::UnsupportedMediaType(raw.to_string()))?;
    Ok((raw.to_string(), media_type))
}

/// Split on commas, trim, lowercase, drop empties, collapse duplicates.
pub fn normalize_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
