// crates/document/src/lib.rs
//! Source-document toolkit for the Folio catalogue
//!
//! This crate reads the XML source format of catalogued books:
//! - Dublin Core metadata (`rdf:Description`) into [`BookInfo`](folio_core::BookInfo)
//! - HTML rendering with extraction of themed fragments
//! - plain-text rendering
//! - word-based truncation of HTML snippets
//! - conversion to derived formats through [`FormatConverter`]s
//!
//! # Example
//!
//! ```rust
//! use folio_document::{parse_book_info, render_html};
//!
//! let xml = r#"<utwor>
//! <rdf:RDF><rdf:Description>
//!   <dc:title>Przykład</dc:title>
//!   <dc:identifier.url>http://wolnelektury.pl/katalog/lektura/przyklad</dc:identifier.url>
//! </rdf:Description></rdf:RDF>
//! <akap><begin id="b1"/><motyw id="m1">Noc</motyw>Ciemno wszędzie.<end id="e1"/></akap>
//! </utwor>"#;
//!
//! let info = parse_book_info(xml).expect("Failed to parse metadata");
//! let doc = render_html(xml).expect("Failed to render");
//! println!("{}: {} fragments", info.title, doc.fragments.len());
//! ```

mod convert;
mod error;
mod html;
mod metadata;
mod text;
mod truncate;
mod wlxml;

pub use convert::{CommandConverter, ConverterSet, FormatConverter, NativeConverter};
pub use error::{DocumentError, DocumentResult};
pub use html::{has_text, render_html, ExtractedFragment, HtmlDocument};
pub use metadata::{parse_book_info, MetadataParser};
pub use text::render_text;
pub use truncate::truncate_html_words;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_workflow() {
        let xml = r#"<utwor>
<rdf:RDF><rdf:Description>
  <dc:title>Przykład</dc:title>
  <dc:identifier.url>http://wolnelektury.pl/katalog/lektura/przyklad</dc:identifier.url>
</rdf:Description></rdf:RDF>
<akap><begin id="b1"/><motyw id="m1">Noc</motyw>Ciemno wszędzie, głucho wszędzie, co to będzie, co to będzie?<end id="e1"/></akap>
</utwor>"#;

        let info = parse_book_info(xml).expect("Should parse");
        assert_eq!(info.slug(), "przyklad");

        let doc = render_html(xml).expect("Should render");
        assert_eq!(doc.fragments.len(), 1);
        assert_eq!(doc.fragments[0].themes, vec!["Noc"]);

        let short = truncate_html_words(&doc.fragments[0].text, 3);
        assert_eq!(short, "Ciemno wszędzie, głucho ...");

        let text = render_text(xml).expect("Should render text");
        assert!(text.starts_with("Ciemno wszędzie"));
    }
}
