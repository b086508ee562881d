// crates/document/src/truncate.rs
//! Word-based truncation of HTML snippets

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "col", "area", "wbr"];

/// Truncates HTML after `words` words, closing any tags left open
///
/// Returns the input unchanged when it has no more than `words` words, or
/// when it cannot be read as markup.
/// Truncated output ends with ` ...` before the closing tags.
pub fn truncate_html_words(html: &str, words: usize) -> String {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut out = String::with_capacity(html.len());
    let mut open: Vec<String> = Vec::new();
    let mut count = 0usize;
    let mut start = 0usize;

    loop {
        let Ok(event) = reader.read_event() else {
            return html.to_string();
        };
        let end = reader.buffer_position() as usize;
        let raw = &html[start..end];
        start = end;

        match event {
            Event::Start(e) => {
                let name = lowercase_name(e.name());
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    open.push(name);
                }
            }
            Event::End(e) => {
                let name = lowercase_name(e.name());
                if let Some(pos) = open.iter().rposition(|t| *t == name) {
                    open.truncate(pos);
                }
            }
            Event::Text(_) => {
                if let Some(cut) = word_limit(raw, words, &mut count) {
                    out.push_str(&raw[..cut]);
                    let trimmed = out.trim_end().len();
                    out.truncate(trimmed);
                    out.push_str(" ...");
                    for tag in open.iter().rev() {
                        out.push_str(&format!("</{}>", tag));
                    }
                    return out;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        out.push_str(raw);
    }

    html.to_string()
}

/// Byte offset of the first word past the limit, if `text` reaches it
fn word_limit(text: &str, words: usize, count: &mut usize) -> Option<usize> {
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            *count += 1;
            if *count > words {
                return Some(i);
            }
        }
    }
    None
}

fn lowercase_name(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        let html = "<p>Ala ma kota</p>";
        assert_eq!(truncate_html_words(html, 15), html);
    }

    #[test]
    fn test_truncates_and_closes_tags() {
        let html = "<p>jeden <em>dwa trzy</em> cztery</p><p>pięć</p>";
        assert_eq!(truncate_html_words(html, 2), "<p>jeden <em>dwa ...</em></p>");
    }

    #[test]
    fn test_void_elements_are_not_closed() {
        let html = "<div>raz<br/>dwa<br>trzy cztery</div>";
        assert_eq!(truncate_html_words(html, 3), "<div>raz<br/>dwa<br>trzy ...</div>");
    }

    #[test]
    fn test_markup_inside_attributes_and_comments() {
        let html = r#"<p title="a > b">jeden <!-- x > y --> dwa trzy</p>"#;
        assert_eq!(
            truncate_html_words(html, 2),
            r#"<p title="a > b">jeden <!-- x > y --> dwa ...</p>"#
        );
    }

    #[test]
    fn test_exact_word_count() {
        let html = "<p>a b c</p>";
        assert_eq!(truncate_html_words(html, 3), html);
    }
}
