//! Parsed source-document metadata

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base of catalogue URIs
pub const WLURI_BASE: &str = "http://wolnelektury.pl/katalog/lektura/";

/// Identifier URI of a book; the slug is its last path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WlUri {
    pub uri: String,
    pub slug: String,
    pub language: Option<String>,
}

impl WlUri {
    /// Parses an identifier URI
    pub fn parse(uri: &str) -> Result<Self, AppError> {
        let trimmed = uri.trim();
        let slug = trimmed
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if slug.is_empty() || !trimmed.contains("://") {
            return Err(AppError::InvalidMetadata {
                field: "dc:identifier.url".to_string(),
                value: uri.to_string(),
            });
        }
        Ok(Self {
            uri: trimmed.to_string(),
            slug,
            language: None,
        })
    }

    pub fn from_slug_and_lang(slug: &str, language: &str) -> Self {
        Self {
            uri: format!("{}{}/", WLURI_BASE, slug),
            slug: slug.to_string(),
            language: Some(language.to_string()),
        }
    }
}

impl fmt::Display for WlUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// A person credited in the metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub first_names: Vec<String>,
    pub last_name: String,
}

impl Person {
    pub fn new(first_names: &[&str], last_name: &str) -> Self {
        Self {
            first_names: first_names.iter().map(|s| s.to_string()).collect(),
            last_name: last_name.to_string(),
        }
    }

    /// Parses the `Last, First Second` form used in Dublin Core
    pub fn from_text(text: &str) -> Self {
        match text.split_once(',') {
            Some((last, first)) => Self {
                last_name: last.trim().to_string(),
                first_names: first.split_whitespace().map(str::to_string).collect(),
            },
            None => Self {
                last_name: text.trim().to_string(),
                first_names: Vec::new(),
            },
        }
    }

    /// `First Second Last`
    pub fn readable(&self) -> String {
        let mut parts: Vec<&str> = self.first_names.iter().map(String::as_str).collect();
        parts.push(&self.last_name);
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readable())
    }
}

/// Metadata describing one source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookInfo {
    pub url: WlUri,
    pub about: String,
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub authors: Vec<Person>,
    #[serde(default)]
    pub epochs: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Child parts, in order
    #[serde(default)]
    pub parts: Vec<WlUri>,
    pub variant_of: Option<WlUri>,
    #[serde(default)]
    pub audiences: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_name: String,
}

impl BookInfo {
    /// Minimal metadata for a title in the given language
    pub fn new(title: &str, language: &str) -> Self {
        let slug = crate::slug::slugify(title);
        Self {
            url: WlUri::from_slug_and_lang(&slug, language),
            about: format!("http://wolnelektury.pl/example/URI/{}", slug),
            title: title.to_string(),
            language: language.to_string(),
            authors: Vec::new(),
            epochs: Vec::new(),
            kinds: Vec::new(),
            genres: Vec::new(),
            parts: Vec::new(),
            variant_of: None,
            audiences: Vec::new(),
            description: String::new(),
            source_name: String::new(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.url.slug
    }

    /// Metadata dictionary stored as a book's extra info
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
