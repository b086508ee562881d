// crates/document/src/wlxml.rs
//! Element vocabulary of the source format shared by the renderers

/// How an element is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// Metadata block, not rendered
    Metadata,
    /// Fragment start marker
    FragmentBegin,
    /// Fragment end marker
    FragmentEnd,
    /// Theme list of a fragment
    Theme,
    /// Footnote, left out of plain text
    Footnote,
    /// Horizontal separator
    Separator,
    /// Block-level element
    Block(&'static str, Option<&'static str>),
    /// Verse line inside a stanza
    Verse,
    /// Stanza; text lines are separated by `/`
    Stanza,
    /// Inline element
    Inline(&'static str, Option<&'static str>),
}

const CONTAINERS: &[&str] = &[
    "utwor",
    "opowiadanie",
    "powiesc",
    "liryka_l",
    "liryka_lp",
    "dramat_wierszowany_l",
    "dramat_wierszowany_lp",
    "dramat_wspolczesny",
    "kwestia",
    "lista_osob",
    "dlugi_cytat",
    "poezja_cyt",
    "motto",
    "dedykacja",
];

pub(crate) fn role(name: &str) -> Role {
    match name {
        "rdf:RDF" => Role::Metadata,
        "begin" => Role::FragmentBegin,
        "end" => Role::FragmentEnd,
        "motyw" => Role::Theme,
        "pe" | "pa" | "pt" | "pr" => Role::Footnote,
        "sekcja_swiatlo" | "sekcja_asterysk" | "separator_linia" => Role::Separator,
        "nazwa_utworu" => Role::Block("h1", Some("title")),
        "autor_utworu" => Role::Block("span", Some("author")),
        "podtytul" => Role::Block("span", Some("subtitle")),
        "naglowek_czesc" | "naglowek_akt" => Role::Block("h2", None),
        "naglowek_rozdzial" | "naglowek_scena" => Role::Block("h3", None),
        "naglowek_podrozdzial" | "srodtytul" | "naglowek_osoba" | "naglowek_listy" => {
            Role::Block("h4", None)
        }
        "akap" => Role::Block("p", None),
        "akap_cd" => Role::Block("p", Some("paragraph-cd")),
        "akap_dialog" => Role::Block("p", Some("paragraph-dialog")),
        "didaskalia" => Role::Block("div", Some("didaskalia")),
        "strofa" => Role::Stanza,
        "wers" | "wers_wciety" | "wers_akap" | "wers_cd" | "wers_do_prawej" | "wers_srodek" => {
            Role::Verse
        }
        "wyroznienie" => Role::Inline("em", Some("emphasis")),
        "tytul_dziela" => Role::Inline("em", Some("work-title")),
        "slowo_obce" => Role::Inline("em", Some("foreign-word")),
        "osoba" => Role::Inline("span", Some("person")),
        "didask_tekst" => Role::Inline("span", Some("didaskalia")),
        "mat" => Role::Inline("span", Some("math")),
        other if CONTAINERS.contains(&other) => Role::Block("div", None),
        _ => Role::Inline("span", None),
    }
}

/// Applies the typographic shorthands of the source format
pub(crate) fn typography(text: &str) -> String {
    text.replace("---", "\u{2014}").replace(",,", "\u{201e}")
}

/// Splits stanza text on `/` followed by whitespace
pub(crate) fn verse_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            lines.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    lines.push(current);
    lines
}

/// Collapses whitespace runs into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Numeric suffix of a marker id (`b12` -> `12`)
pub(crate) fn marker_number(id: &str) -> &str {
    id.trim_start_matches(|c: char| c.is_ascii_alphabetic())
}

/// Splits a theme list (`Miłość, Śmierć`) into names
pub(crate) fn split_themes(text: &str) -> Vec<String> {
    text.split(',')
        .map(|t| collapse_whitespace(t).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
