// crates/document/src/metadata.rs
//! Dublin Core metadata parsing

use crate::error::{DocumentError, DocumentResult};
use folio_core::{BookInfo, Person, WlUri};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Reads the `rdf:Description` block of a source document
pub struct MetadataParser {
    default_language: String,
}

impl Default for MetadataParser {
    fn default() -> Self {
        Self::new("pol")
    }
}

impl MetadataParser {
    /// Creates a parser that falls back to `default_language` when `dc:language` is absent
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
        }
    }

    /// Parses metadata from a file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> DocumentResult<BookInfo> {
        let content = std::fs::read(path)?;
        self.parse_bytes(&content)
    }

    /// Parses metadata from raw bytes
    pub fn parse_bytes(&self, content: &[u8]) -> DocumentResult<BookInfo> {
        let text = std::str::from_utf8(content)?;
        self.parse(text)
    }

    /// Parses metadata from a document string
    pub fn parse(&self, content: &str) -> DocumentResult<BookInfo> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut fields = RawFields::default();
        let mut in_description = false;
        let mut seen_description = false;
        let mut current: Option<String> = None;
        let mut text_buffer = String::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = element_name(&e);
                    if name == "rdf:Description" {
                        in_description = true;
                        seen_description = true;
                        fields.about = attribute(&e, "rdf:about");
                    } else if in_description && name.starts_with("dc:") {
                        current = Some(name);
                        text_buffer.clear();
                    }
                }
                Ok(Event::Text(e)) => {
                    if current.is_some() {
                        let text = e
                            .unescape()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                        text_buffer.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if current.is_some() {
                        text_buffer.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if name == "rdf:Description" {
                        // Only the first description block describes the document
                        break;
                    }
                    if current.as_deref() == Some(name.as_str()) {
                        fields.push(&name, text_buffer.trim());
                        current = None;
                        text_buffer.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(DocumentError::from(e)),
                _ => {}
            }
            buf.clear();
        }

        if !seen_description {
            return Err(DocumentError::NoMetadata);
        }

        fields.into_book_info(&self.default_language)
    }
}

/// Parses metadata with the default settings
pub fn parse_book_info(content: &str) -> DocumentResult<BookInfo> {
    MetadataParser::default().parse(content)
}

#[derive(Default)]
struct RawFields {
    about: Option<String>,
    creators: Vec<String>,
    titles: Vec<String>,
    periods: Vec<String>,
    types: Vec<String>,
    genres: Vec<String>,
    urls: Vec<String>,
    parts: Vec<String>,
    variant_of: Vec<String>,
    languages: Vec<String>,
    audiences: Vec<String>,
    descriptions: Vec<String>,
    source_names: Vec<String>,
}

impl RawFields {
    fn push(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let target = match name {
            "dc:creator" => &mut self.creators,
            "dc:title" => &mut self.titles,
            "dc:subject.period" => &mut self.periods,
            "dc:subject.type" => &mut self.types,
            "dc:subject.genre" => &mut self.genres,
            "dc:identifier.url" => &mut self.urls,
            "dc:relation.hasPart" => &mut self.parts,
            "dc:relation.isVariantOf" => &mut self.variant_of,
            "dc:language" => &mut self.languages,
            "dc:audience" => &mut self.audiences,
            "dc:description" => &mut self.descriptions,
            "dc:source.name" => &mut self.source_names,
            _ => return,
        };
        target.push(value.to_string());
    }

    fn into_book_info(self, default_language: &str) -> DocumentResult<BookInfo> {
        let title = self
            .titles
            .into_iter()
            .next()
            .ok_or_else(|| DocumentError::MissingField("dc:title".to_string()))?;
        let url = self
            .urls
            .first()
            .ok_or_else(|| DocumentError::MissingField("dc:identifier.url".to_string()))?;
        let url = parse_uri("dc:identifier.url", url)?;

        let parts = self
            .parts
            .iter()
            .map(|part| parse_uri("dc:relation.hasPart", part))
            .collect::<DocumentResult<Vec<_>>>()?;
        let variant_of = self
            .variant_of
            .first()
            .map(|uri| parse_uri("dc:relation.isVariantOf", uri))
            .transpose()?;

        let mut info = BookInfo::new(&title, default_language);
        info.about = self.about.unwrap_or_else(|| url.uri.clone());
        info.url = url;
        if let Some(language) = self.languages.into_iter().next() {
            info.language = language;
        }
        info.authors = self.creators.iter().map(|c| Person::from_text(c)).collect();
        info.epochs = self.periods;
        info.kinds = self.types;
        info.genres = self.genres;
        info.parts = parts;
        info.variant_of = variant_of;
        info.audiences = self.audiences;
        info.description = self.descriptions.join("\n");
        info.source_name = self.source_names.into_iter().next().unwrap_or_default();
        Ok(info)
    }
}

fn parse_uri(field: &str, value: &str) -> DocumentResult<WlUri> {
    WlUri::parse(value).map_err(|_| DocumentError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    })
}

pub(crate) fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

pub(crate) fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.as_ref() == key.as_bytes() {
            Some(
                attr.unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string()),
            )
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<utwor>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">
<rdf:Description rdf:about="http://redakcja.wolnelektury.pl/documents/book/dziady/">
<dc:creator xml:lang="pl">Mickiewicz, Adam</dc:creator>
<dc:title xml:lang="pl">Dziady</dc:title>
<dc:subject.period xml:lang="pl">Romantyzm</dc:subject.period>
<dc:subject.type xml:lang="pl">Dramat</dc:subject.type>
<dc:subject.genre xml:lang="pl">Dramat romantyczny</dc:subject.genre>
<dc:identifier.url xml:lang="pl">http://wolnelektury.pl/katalog/lektura/dziady</dc:identifier.url>
<dc:relation.hasPart xml:lang="pl">http://wolnelektury.pl/katalog/lektura/dziady-czesc-ii</dc:relation.hasPart>
<dc:relation.hasPart xml:lang="pl">http://wolnelektury.pl/katalog/lektura/dziady-czesc-iii</dc:relation.hasPart>
<dc:language xml:lang="pl">pol</dc:language>
<dc:audience>L</dc:audience>
</rdf:Description>
</rdf:RDF>
<dramat_wierszowany_lp><nazwa_utworu>Dziady</nazwa_utworu></dramat_wierszowany_lp>
</utwor>"#;

    #[test]
    fn test_parse_full_description() {
        let info = parse_book_info(SAMPLE).expect("Should parse metadata");
        assert_eq!(info.title, "Dziady");
        assert_eq!(info.slug(), "dziady");
        assert_eq!(info.language, "pol");
        assert_eq!(info.authors[0].readable(), "Adam Mickiewicz");
        assert_eq!(info.epochs, vec!["Romantyzm"]);
        assert_eq!(info.kinds, vec!["Dramat"]);
        assert_eq!(info.genres, vec!["Dramat romantyczny"]);
        assert_eq!(info.parts.len(), 2);
        assert_eq!(info.parts[1].slug, "dziady-czesc-iii");
        assert_eq!(info.audiences, vec!["L"]);
        assert_eq!(
            info.about,
            "http://redakcja.wolnelektury.pl/documents/book/dziady/"
        );
    }

    #[test]
    fn test_missing_title() {
        let xml = r#"<utwor><rdf:RDF><rdf:Description>
            <dc:identifier.url>http://wolnelektury.pl/katalog/lektura/x</dc:identifier.url>
        </rdf:Description></rdf:RDF></utwor>"#;
        let err = parse_book_info(xml).unwrap_err();
        assert!(matches!(err, DocumentError::MissingField(ref f) if f == "dc:title"));
    }

    #[test]
    fn test_no_metadata_block() {
        let err = parse_book_info("<utwor><akap>tekst</akap></utwor>").unwrap_err();
        assert!(matches!(err, DocumentError::NoMetadata));
    }

    #[test]
    fn test_default_language() {
        let xml = r#"<utwor><rdf:RDF><rdf:Description>
            <dc:title>Test</dc:title>
            <dc:identifier.url>http://wolnelektury.pl/katalog/lektura/test</dc:identifier.url>
        </rdf:Description></rdf:RDF></utwor>"#;
        let info = MetadataParser::new("eng").parse(xml).unwrap();
        assert_eq!(info.language, "eng");
        assert!(info.variant_of.is_none());
    }

    #[test]
    fn test_invalid_part_uri() {
        let xml = r#"<utwor><rdf:RDF><rdf:Description>
            <dc:title>Test</dc:title>
            <dc:identifier.url>http://wolnelektury.pl/katalog/lektura/test</dc:identifier.url>
            <dc:relation.hasPart>not a uri</dc:relation.hasPart>
        </rdf:Description></rdf:RDF></utwor>"#;
        let err = parse_book_info(xml).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidField { .. }));
    }
}
