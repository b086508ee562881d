//! Audio media attached to books

use super::book::BookId;
use super::common::{row_id, Timestamp};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

row_id!(
    /// Unique identifier for an attached media file
    MediaId
);

/// Kind of attached media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Mp3,
    Ogg,
    Daisy,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Mp3, MediaType::Ogg, MediaType::Daisy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Daisy => "daisy",
        }
    }

    /// Human readable name of the format
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Ogg => "Ogg Vorbis",
            Self::Daisy => "DAISY",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Daisy => "daisy.zip",
        }
    }

    /// True when audio tags can be read from the file
    pub fn has_tags(&self) -> bool {
        !matches!(self, Self::Daisy)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::InvalidArgument {
                argument: "media type".to_string(),
                reason: format!("unknown media type '{}'", s),
            })
    }
}

/// Credits read from the audio tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaExtraInfo {
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub director_name: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub funded_by: String,
}

/// A media file attached to a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMedia {
    pub id: MediaId,
    pub book_id: BookId,
    pub media_type: MediaType,
    pub name: String,
    /// Path relative to the media root
    pub path: String,
    pub uploaded_at: Timestamp,
    pub extra_info: MediaExtraInfo,
    pub source_sha1: Option<String>,
}

impl BookMedia {
    pub fn new(book_id: BookId, media_type: MediaType, name: impl Into<String>) -> Self {
        Self {
            id: MediaId(0),
            book_id,
            media_type,
            name: name.into(),
            path: String::new(),
            uploaded_at: Timestamp::now(),
            extra_info: MediaExtraInfo::default(),
            source_sha1: None,
        }
    }

    /// File name without the directory part
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for BookMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_extension() {
        assert_eq!(MediaType::Daisy.extension(), "daisy.zip");
        assert_eq!("ogg".parse::<MediaType>().unwrap(), MediaType::Ogg);
        assert!(!MediaType::Daisy.has_tags());
    }

    #[test]
    fn test_media_display() {
        let mut media = BookMedia::new(BookId(1), MediaType::Mp3, "Rozdział 1");
        media.path = "book/mp3/rozdzial-1.mp3".to_string();
        assert_eq!(media.to_string(), "Rozdział 1 (rozdzial-1.mp3)");
    }
}
