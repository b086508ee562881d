// crates/document/src/html.rs
//! HTML rendering and fragment extraction

use crate::error::{DocumentError, DocumentResult};
use crate::metadata::{attribute, element_name};
use crate::wlxml::{self, Role};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Rendered HTML of a document together with its closed fragments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlDocument {
    pub html: String,
    pub fragments: Vec<ExtractedFragment>,
}

impl HtmlDocument {
    /// True when the document has no visible text
    pub fn is_empty(&self) -> bool {
        !has_text(&self.html)
    }
}

/// A fragment delimited by matching `begin`/`end` markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFragment {
    /// Marker number, used as the anchor
    pub id: String,
    /// Balanced HTML of the fragment
    pub text: String,
    pub themes: Vec<String>,
}

/// Element currently open in the source
enum Frame {
    /// Rendered element with its HTML tag and opening markup
    Html(&'static str, String),
    /// Element rendered as nothing
    Hidden,
    /// Metadata subtree, skipped entirely
    Skip,
    /// Theme list being collected, with the marker id
    Theme(Option<String>, String),
    Stanza,
}

struct OpenFragment {
    id: String,
    order: usize,
    prefix: String,
    text: String,
    opened: Vec<&'static str>,
    themes: Vec<String>,
}

impl OpenFragment {
    fn finish(self) -> (usize, ExtractedFragment) {
        let mut text = self.prefix;
        text.push_str(&self.text);
        for tag in self.opened.iter().rev() {
            text.push_str(&format!("</{}>", tag));
        }
        (
            self.order,
            ExtractedFragment {
                id: self.id,
                text,
                themes: self.themes,
            },
        )
    }
}

#[derive(Default)]
struct Renderer {
    html: String,
    frames: Vec<Frame>,
    open: Vec<OpenFragment>,
    closed: Vec<(usize, ExtractedFragment)>,
    opened_count: usize,
    skip_depth: usize,
}

impl Renderer {
    fn in_stanza(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::Stanza))
    }

    fn open_tag(&mut self, tag: &'static str, class: Option<&str>) -> String {
        let markup = match class {
            Some(class) => format!("<{} class=\"{}\">", tag, class),
            None => format!("<{}>", tag),
        };
        self.html.push_str(&markup);
        for fragment in &mut self.open {
            fragment.text.push_str(&markup);
            fragment.opened.push(tag);
        }
        markup
    }

    fn close_tag(&mut self, tag: &'static str, markup: &str) {
        let close = format!("</{}>", tag);
        self.html.push_str(&close);
        for fragment in &mut self.open {
            if fragment.opened.last() == Some(&tag) {
                fragment.opened.pop();
            } else {
                // opened before the fragment began
                fragment.prefix.insert_str(0, markup);
            }
            fragment.text.push_str(&close);
        }
    }

    fn void_tag(&mut self, markup: &str) {
        self.html.push_str(markup);
        for fragment in &mut self.open {
            fragment.text.push_str(markup);
        }
    }

    fn text(&mut self, raw: &str) {
        if let Some(Frame::Theme(_, buffer)) = self.frames.last_mut() {
            buffer.push_str(raw);
            return;
        }
        let text = wlxml::typography(raw);
        let html = if self.in_stanza() {
            wlxml::verse_lines(&text)
                .iter()
                .map(|line| wlxml::escape_html(line))
                .collect::<Vec<_>>()
                .join("<br/>\n")
        } else {
            wlxml::escape_html(&text)
        };
        self.html.push_str(&html);
        for fragment in &mut self.open {
            fragment.text.push_str(&html);
        }
    }

    fn marker(&mut self, role: Role, e: &BytesStart<'_>) {
        let Some(id) = attribute(e, "id") else {
            return;
        };
        let number = wlxml::marker_number(&id).to_string();
        match role {
            Role::FragmentBegin => {
                self.html
                    .push_str(&format!("<a name=\"f{}\" class=\"fragment-begin\"></a>", number));
                self.open.push(OpenFragment {
                    id: number,
                    order: self.opened_count,
                    prefix: String::new(),
                    text: String::new(),
                    opened: Vec::new(),
                    themes: Vec::new(),
                });
                self.opened_count += 1;
            }
            Role::FragmentEnd => {
                if let Some(index) = self.open.iter().position(|f| f.id == number) {
                    let fragment = self.open.remove(index);
                    self.closed.push(fragment.finish());
                }
                self.html
                    .push_str(&format!("<a name=\"e{}\" class=\"fragment-end\"></a>", number));
            }
            _ => {}
        }
    }

    fn theme(&mut self, id: Option<String>, text: String) {
        let themes = wlxml::split_themes(&text);
        let number = id.as_deref().map(wlxml::marker_number).unwrap_or_default();
        self.html.push_str(&format!(
            "<span class=\"theme\" id=\"m{}\">{}</span>",
            number,
            wlxml::escape_html(&themes.join(", "))
        ));
        // themes belong to the fragment with the same number, else the innermost one
        let index = self
            .open
            .iter()
            .rposition(|f| f.id == number)
            .or_else(|| self.open.len().checked_sub(1));
        if let Some(index) = index {
            self.open[index].themes.extend(themes);
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = element_name(e);
        if self.skip_depth > 0 {
            if !empty {
                self.skip_depth += 1;
                self.frames.push(Frame::Skip);
            }
            return;
        }

        let role = wlxml::role(&name);
        match role {
            Role::Metadata => {
                if !empty {
                    self.skip_depth = 1;
                    self.frames.push(Frame::Skip);
                }
            }
            Role::FragmentBegin | Role::FragmentEnd => {
                self.marker(role, e);
                if !empty {
                    self.frames.push(Frame::Hidden);
                }
            }
            Role::Theme => {
                if empty {
                    return;
                }
                self.frames
                    .push(Frame::Theme(attribute(e, "id"), String::new()));
            }
            Role::Separator => {
                self.void_tag("<hr/>");
                if !empty {
                    self.frames.push(Frame::Hidden);
                }
            }
            Role::Stanza => {
                if !empty {
                    let markup = self.open_tag("div", Some("stanza"));
                    self.frames.push(Frame::Html("div", markup));
                    self.frames.push(Frame::Stanza);
                }
            }
            Role::Verse => {
                if !empty {
                    let markup = self.open_tag("div", Some("verse"));
                    self.frames.push(Frame::Html("div", markup));
                }
            }
            Role::Footnote => {
                if !empty {
                    let markup = self.open_tag("span", Some("annotation"));
                    self.frames.push(Frame::Html("span", markup));
                }
            }
            Role::Block(tag, class) | Role::Inline(tag, class) => {
                let class = class.map(str::to_string).or_else(|| {
                    if tag == "div" || tag == "span" {
                        Some(name.clone())
                    } else {
                        None
                    }
                });
                let markup = self.open_tag(tag, class.as_deref());
                if empty {
                    self.close_tag(tag, &markup);
                } else {
                    self.frames.push(Frame::Html(tag, markup));
                }
            }
        }
    }

    fn end(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame {
            Frame::Skip => {
                self.skip_depth = self.skip_depth.saturating_sub(1);
            }
            Frame::Hidden => {}
            Frame::Stanza => {
                // the enclosing div closes on the same end event
                if let Some(Frame::Html(tag, markup)) = self.frames.pop() {
                    self.close_tag(tag, &markup);
                }
            }
            Frame::Html(tag, markup) => self.close_tag(tag, &markup),
            Frame::Theme(id, text) => self.theme(id, text),
        }
    }

    fn finish(mut self) -> HtmlDocument {
        self.closed.sort_by_key(|(order, _)| *order);
        HtmlDocument {
            html: self.html,
            fragments: self.closed.into_iter().map(|(_, f)| f).collect(),
        }
    }
}

/// Renders a source document to HTML and extracts its closed fragments
///
/// Fragments left open at the end of the document are dropped.
pub fn render_html(content: &str) -> DocumentResult<HtmlDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut renderer = Renderer::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => renderer.start(&e, false),
            Ok(Event::Empty(e)) => renderer.start(&e, true),
            Ok(Event::End(_)) => renderer.end(),
            Ok(Event::Text(e)) => {
                if renderer.skip_depth == 0 {
                    let text = e
                        .unescape()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                    renderer.text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if renderer.skip_depth == 0 {
                    renderer.text(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::from(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(renderer.finish())
}

/// True when the markup contains non-whitespace text outside tags
///
/// Comments and other non-text markup do not count.
pub fn has_text(html: &str) -> bool {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) if !is_blank(&e) => return true,
            Ok(Event::CData(e)) if !is_blank(&e) => return true,
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

fn is_blank(raw: &[u8]) -> bool {
    String::from_utf8_lossy(raw).chars().all(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<utwor><rdf:RDF><rdf:Description><dc:title>Test</dc:title></rdf:Description></rdf:RDF><opowiadanie>
<nazwa_utworu>Test</nazwa_utworu>
<akap>Początek <begin id="b1"/><motyw id="m1">Miłość, Śmierć</motyw>środek akapitu</akap>
<akap>dalszy ciąg<end id="e1"/> koniec</akap>
<akap><begin id="b2"/><motyw id="m2">Noc</motyw>niezamknięty</akap>
</opowiadanie></utwor>"#;

    #[test]
    fn test_render_skips_metadata() {
        let doc = render_html(SAMPLE).unwrap();
        assert!(doc.html.contains("<h1 class=\"title\">Test</h1>"));
        assert!(!doc.html.contains("dc:title"));
        assert_eq!(doc.html.matches("Test").count(), 1);
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_only_closed_fragments_are_extracted() {
        let doc = render_html(SAMPLE).unwrap();
        assert_eq!(doc.fragments.len(), 1);

        let fragment = &doc.fragments[0];
        assert_eq!(fragment.id, "1");
        assert_eq!(fragment.themes, vec!["Miłość", "Śmierć"]);
        assert_eq!(fragment.text, "<p>środek akapitu</p>\n<p>dalszy ciąg</p>");
    }

    #[test]
    fn test_theme_markup_in_html() {
        let doc = render_html(SAMPLE).unwrap();
        assert!(doc
            .html
            .contains("<span class=\"theme\" id=\"m1\">Miłość, Śmierć</span>"));
        assert!(doc.html.contains("<a name=\"f1\" class=\"fragment-begin\"></a>"));
    }

    #[test]
    fn test_stanza_verses() {
        let doc = render_html("<utwor><strofa>Litwo! Ojczyzno moja! /\nty jesteś jak zdrowie</strofa></utwor>").unwrap();
        assert!(doc.html.contains(
            "<div class=\"stanza\">Litwo! Ojczyzno moja! <br/>\nty jesteś jak zdrowie</div>"
        ));
    }

    #[test]
    fn test_text_is_escaped_and_typography_applied() {
        let doc = render_html("<utwor><akap>a &lt; b --- ,,c''</akap></utwor>").unwrap();
        assert!(doc.html.contains("<p>a &lt; b \u{2014} \u{201e}c''</p>"));
    }

    #[test]
    fn test_empty_document() {
        let doc = render_html("<utwor>\n</utwor>").unwrap();
        assert!(doc.is_empty());
        assert!(doc.fragments.is_empty());
    }

    #[test]
    fn test_has_text_ignores_markup() {
        assert!(!has_text("<div>\n  <br/>\u{a0}</div>"));
        assert!(!has_text(r#"<p title="a > b"><!-- x > y --></p>"#));
        assert!(has_text("<p><![CDATA[x]]></p>"));
        assert!(has_text("<p>a &amp; b</p>"));
    }

    #[test]
    fn test_nested_fragments() {
        let xml = r#"<utwor><akap><begin id="b1"/><motyw id="m1">A</motyw>x <begin id="b2"/><motyw id="m2">B</motyw>y<end id="e2"/> z<end id="e1"/></akap></utwor>"#;
        let doc = render_html(xml).unwrap();
        assert_eq!(doc.fragments.len(), 2);
        assert_eq!(doc.fragments[0].id, "1");
        assert_eq!(doc.fragments[0].themes, vec!["A"]);
        assert_eq!(doc.fragments[0].text, "x y z");
        assert_eq!(doc.fragments[1].themes, vec!["B"]);
        assert_eq!(doc.fragments[1].text, "y");
    }

    #[test]
    fn test_malformed_xml() {
        assert!(render_html("<utwor><akap>x</utwor>").is_err());
    }
}
