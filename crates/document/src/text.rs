// crates/document/src/text.rs
//! Plain-text rendering

use crate::error::{DocumentError, DocumentResult};
use crate::metadata::element_name;
use crate::wlxml::{self, Role};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Renders the body of a source document as plain text
///
/// Blocks are separated by blank lines, verses by line breaks. Metadata,
/// footnotes, theme lists and fragment markers are left out.
pub fn render_text(content: &str) -> DocumentResult<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    // (role, hidden) per open element
    let mut stack: Vec<(Role, bool)> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let role = wlxml::role(&element_name(&e));
                let hidden = stack.last().is_some_and(|(_, hidden)| *hidden)
                    || matches!(
                        role,
                        Role::Metadata | Role::Footnote | Role::Theme | Role::FragmentBegin | Role::FragmentEnd
                    );
                stack.push((role, hidden));
            }
            Ok(Event::Empty(e)) => {
                if matches!(wlxml::role(&element_name(&e)), Role::Separator) {
                    end_block(&mut out);
                    out.push_str("*\n\n");
                }
            }
            Ok(Event::End(_)) => {
                if let Some((role, hidden)) = stack.pop() {
                    if !hidden {
                        match role {
                            Role::Block(_, _) | Role::Stanza => end_block(&mut out),
                            Role::Verse => end_line(&mut out),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if stack.last().is_some_and(|(_, hidden)| *hidden) {
                    buf.clear();
                    continue;
                }
                let raw = e
                    .unescape()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                let text = wlxml::typography(&raw);
                let in_stanza = stack.iter().any(|(role, _)| *role == Role::Stanza);
                if in_stanza {
                    let lines = wlxml::verse_lines(&text);
                    let last = lines.len() - 1;
                    for (i, line) in lines.iter().enumerate() {
                        push_inline(&mut out, &wlxml::collapse_whitespace(line));
                        if i < last {
                            end_line(&mut out);
                        }
                    }
                } else {
                    push_inline(&mut out, &wlxml::collapse_whitespace(&text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::from(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string() + "\n")
}

fn push_inline(out: &mut String, text: &str) {
    // no leading spaces at the start of a line
    let text = if out.is_empty() || out.ends_with('\n') {
        text.trim_start()
    } else {
        text
    };
    out.push_str(text);
}

fn end_line(out: &mut String) {
    trim_trailing_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn end_block(out: &mut String) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_are_separated() {
        let xml = "<utwor><opowiadanie><nazwa_utworu>Tytuł</nazwa_utworu>\n<akap>Pierwszy\n  akapit.</akap><akap>Drugi.</akap></opowiadanie></utwor>";
        assert_eq!(render_text(xml).unwrap(), "Tytuł\n\nPierwszy akapit.\n\nDrugi.\n");
    }

    #[test]
    fn test_verses() {
        let xml = "<utwor><strofa>Litwo! Ojczyzno moja! /\n  ty jesteś jak zdrowie.</strofa></utwor>";
        assert_eq!(
            render_text(xml).unwrap(),
            "Litwo! Ojczyzno moja!\nty jesteś jak zdrowie.\n"
        );
    }

    #[test]
    fn test_hidden_elements() {
        let xml = r#"<utwor><rdf:RDF><dc:title>X</dc:title></rdf:RDF><akap><begin id="b1"/><motyw id="m1">Noc</motyw>Tekst<pe>przypis</pe> dalej<end id="e1"/></akap></utwor>"#;
        assert_eq!(render_text(xml).unwrap(), "Tekst dalej\n");
    }
}
