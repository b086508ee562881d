// crates/document/tests/document_tests.rs
//! Integration tests for the document toolkit

use folio_core::BookFormat;
use folio_document::{
    has_text, parse_book_info, render_html, render_text, truncate_html_words, CommandConverter,
    ConverterSet, DocumentError, MetadataParser,
};
use tempfile::TempDir;

const PAN_TADEUSZ: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<utwor>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">
<rdf:Description rdf:about="http://redakcja.wolnelektury.pl/documents/book/pan-tadeusz/">
<dc:creator xml:lang="pl">Mickiewicz, Adam</dc:creator>
<dc:title xml:lang="pl">Pan Tadeusz</dc:title>
<dc:subject.period xml:lang="pl">Romantyzm</dc:subject.period>
<dc:subject.type xml:lang="pl">Epika</dc:subject.type>
<dc:subject.genre xml:lang="pl">Epopeja</dc:subject.genre>
<dc:identifier.url xml:lang="pl">http://wolnelektury.pl/katalog/lektura/pan-tadeusz</dc:identifier.url>
<dc:language xml:lang="pl">pol</dc:language>
<dc:audience>L</dc:audience>
<dc:source.name>Czytelnik, Warszawa 1955</dc:source.name>
</rdf:Description>
</rdf:RDF>
<powiesc>
<nazwa_utworu>Pan Tadeusz</nazwa_utworu>
<naglowek_rozdzial>Księga pierwsza</naglowek_rozdzial>
<strofa><begin id="b1"/><motyw id="m1">Kraj, Tęsknota</motyw>Litwo! Ojczyzno moja! ty jesteś jak zdrowie. /
Ile cię trzeba cenić, ten tylko się dowie, /
Kto cię stracił.<end id="e1"/></strofa>
<pe><slowo_obce>Przypis</slowo_obce> --- objaśnienie.</pe>
</powiesc>
</utwor>"#;

#[test]
fn test_metadata_of_full_document() {
    let info = parse_book_info(PAN_TADEUSZ).expect("Should parse metadata");

    assert_eq!(info.title, "Pan Tadeusz");
    assert_eq!(info.slug(), "pan-tadeusz");
    assert_eq!(info.authors.len(), 1);
    assert_eq!(info.authors[0].last_name, "Mickiewicz");
    assert_eq!(info.epochs, vec!["Romantyzm"]);
    assert_eq!(info.kinds, vec!["Epika"]);
    assert_eq!(info.genres, vec!["Epopeja"]);
    assert_eq!(info.source_name, "Czytelnik, Warszawa 1955");
    assert!(info.parts.is_empty());
}

#[test]
fn test_metadata_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pan-tadeusz.xml");
    std::fs::write(&path, PAN_TADEUSZ).unwrap();

    let info = MetadataParser::default().parse_file(&path).unwrap();
    assert_eq!(info.slug(), "pan-tadeusz");
}

#[test]
fn test_metadata_invalid_utf8() {
    let err = MetadataParser::default()
        .parse_bytes(&[0x3c, 0x75, 0xff, 0xfe])
        .unwrap_err();
    assert!(matches!(err, DocumentError::InvalidEncoding));
}

#[test]
fn test_html_of_full_document() {
    let doc = render_html(PAN_TADEUSZ).expect("Should render");

    assert!(doc.html.contains("<h1 class=\"title\">Pan Tadeusz</h1>"));
    assert!(doc.html.contains("Księga pierwsza"));
    assert!(!doc.html.contains("Czytelnik"));
    assert!(has_text(&doc.html));

    assert_eq!(doc.fragments.len(), 1);
    let fragment = &doc.fragments[0];
    assert_eq!(fragment.id, "1");
    assert_eq!(fragment.themes, vec!["Kraj", "Tęsknota"]);
    assert!(fragment.text.starts_with("Litwo! Ojczyzno moja!"));
    assert!(fragment.text.contains("<br/>\n"));
    assert!(fragment.text.ends_with("Kto cię stracił."));
}

#[test]
fn test_fragment_short_text() {
    let doc = render_html(PAN_TADEUSZ).unwrap();
    let short = truncate_html_words(&doc.fragments[0].text, 4);
    assert_eq!(short, "Litwo! Ojczyzno moja! ty ...");
}

#[test]
fn test_text_of_full_document() {
    let text = render_text(PAN_TADEUSZ).expect("Should render text");

    assert!(text.starts_with("Pan Tadeusz"));
    assert!(text.contains("Litwo! Ojczyzno moja! ty jesteś jak zdrowie.\n"));
    assert!(!text.contains("Kraj, Tęsknota"));
    assert!(!text.contains("objaśnienie"));
    assert!(text.ends_with('\n'));
}

#[test]
fn test_native_formats_through_converter_set() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("pan-tadeusz.xml");
    std::fs::write(&source, PAN_TADEUSZ).unwrap();

    let set = ConverterSet::with_commands(CommandConverter::new());
    let txt = dir.path().join("pan-tadeusz.txt");
    let html = dir.path().join("pan-tadeusz.html");

    set.convert(&source, BookFormat::Txt, &txt).unwrap();
    set.convert(&source, BookFormat::Html, &html).unwrap();

    assert!(std::fs::read_to_string(&txt).unwrap().contains("Kto cię stracił."));
    assert!(std::fs::read_to_string(&html)
        .unwrap()
        .contains("class=\"fragment-begin\""));
}

#[test]
fn test_unconfigured_format() {
    let set = ConverterSet::with_commands(CommandConverter::new());
    assert!(!set.supports(BookFormat::Epub));

    let dir = TempDir::new().unwrap();
    let err = set
        .convert(
            &dir.path().join("a.xml"),
            BookFormat::Epub,
            &dir.path().join("a.epub"),
        )
        .unwrap_err();
    assert!(matches!(err, DocumentError::NoConverter(_)));
}
