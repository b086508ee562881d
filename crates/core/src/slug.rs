//! Slug and sort-key helpers

/// Maps a character with diacritics to its ASCII spelling
fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'ą' => "a",
        'ć' => "c",
        'ę' => "e",
        'ł' => "l",
        'ń' => "n",
        'ó' => "o",
        'ś' => "s",
        'ź' | 'ż' => "z",
        'Ą' => "A",
        'Ć' => "C",
        'Ę' => "E",
        'Ł' => "L",
        'Ń' => "N",
        'Ó' => "O",
        'Ś' => "S",
        'Ź' | 'Ż' => "Z",
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'é' | 'è' | 'ê' | 'ë' | 'ě' => "e",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ò' | 'ô' | 'ö' | 'õ' | 'ő' => "o",
        'ú' | 'ù' | 'û' | 'ü' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'č' => "c",
        'ď' => "d",
        'ň' => "n",
        'ř' => "r",
        'š' => "s",
        'ť' => "t",
        'ž' => "z",
        'ç' => "c",
        'ñ' => "n",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ø' => "o",
        _ => return None,
    })
}

/// Turns arbitrary text into a `[a-z0-9-]` slug
///
/// Diacritics are transliterated, other characters become single dashes,
/// leading and trailing dashes are dropped.
pub fn slugify(text: &str) -> String {
    let mut ascii = String::with_capacity(text.len());
    for c in text.chars() {
        match transliterate(c) {
            Some(s) => ascii.push_str(s),
            None => ascii.push(c),
        }
    }

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Sort key that orders Polish letters after their base letters
pub fn sortify(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        match c {
            'ą' => key.push_str("a~"),
            'ć' => key.push_str("c~"),
            'ę' => key.push_str("e~"),
            'ł' => key.push_str("l~"),
            'ń' => key.push_str("n~"),
            'ó' => key.push_str("o~"),
            'ś' => key.push_str("s~"),
            'ź' => key.push_str("z~"),
            'ż' => key.push_str("z~~"),
            other => match transliterate(other) {
                Some(s) => key.push_str(s),
                None => key.push(other),
            },
        }
    }
    key
}

/// True when the slug consists of `[a-z0-9-]` only
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Truncates to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
