use rand::Rng;

/// Escapes the five HTML-significant characters (`&`, `<`, `>`, `"`, `'`).
///
/// Used by the renderer when autoescape is active and by the `escape` /
/// `forceescape` filters.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Shortens `s` to at most `length` characters, appending an ellipsis when
/// anything was cut. Only used for human-readable node/token displays.
pub fn ellipsis(s: &str, length: usize) -> String {
    if s.chars().count() <= length {
        return s.to_string();
    }
    let prefix: String = s.chars().take(length).collect();
    format!("{}...", prefix)
}

const LOREM_WORDS: &[&str] = &[
    "lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
    "ad",
    "minim",
    "veniam",
    "quis",
    "nostrud",
    "exercitation",
    "ullamco",
    "laboris",
    "nisi",
    "aliquip",
    "ex",
    "ea",
    "commodo",
    "consequat",
    "duis",
    "aute",
    "irure",
    "in",
    "reprehenderit",
    "voluptate",
    "velit",
    "esse",
    "cillum",
    "eu",
    "fugiat",
    "nulla",
    "pariatur",
    "excepteur",
    "sint",
    "occaecat",
    "cupidatat",
    "non",
    "proident",
    "sunt",
    "culpa",
    "qui",
    "officia",
    "deserunt",
    "mollit",
    "anim",
    "id",
    "est",
    "laborum",
];

/// Generates `n` paragraphs of lorem ipsum with `min..=max` words each.
/// With `html` set, paragraphs are wrapped in `<p>` tags.
pub fn lipsum(n: usize, html: bool, min: usize, max: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut paragraphs = Vec::with_capacity(n);
    for _ in 0..n {
        let count = if max > min {
            rng.gen_range(min..=max)
        } else {
            min
        };
        let mut words = Vec::with_capacity(count);
        for i in 0..count {
            let word = LOREM_WORDS[rng.gen_range(0..LOREM_WORDS.len())];
            if i == 0 {
                let mut c = word.chars();
                words.push(match c.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                    None => String::new(),
                });
            } else {
                words.push(word.to_string());
            }
        }
        let mut paragraph = words.join(" ");
        paragraph.push('.');
        if html {
            paragraph = format!("<p>{}</p>", paragraph);
        }
        paragraphs.push(paragraph);
    }
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_ellipsis() {
        assert_eq!(ellipsis("short", 20), "short");
        assert_eq!(ellipsis("a somewhat longer string", 6), "a some...");
    }

    #[test]
    fn test_lipsum_shape() {
        let text = lipsum(2, true, 5, 5);
        assert_eq!(text.matches("<p>").count(), 2);
        let plain = lipsum(1, false, 3, 3);
        assert!(!plain.contains("<p>"));
        assert!(plain.ends_with('.'));
    }
}
