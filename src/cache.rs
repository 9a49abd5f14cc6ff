// Cache keys and cleanup of generated pages before they are stored

pub const CACHE_PREFIX: &str = "ie:cache:";

// Most recent generations kept per (url, year)
pub const MAX_HISTORY: usize = 5;

const TITLE_MARKER: &str = "<!-- TITLE:";
const COMMENT_END: &str = "-->";
const FENCE: &str = "```";

/// Collapse trivially different spellings of a URL onto one key.
pub fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = normalized.strip_prefix(scheme) {
            normalized = rest.to_string();
            break;
        }
    }
    if let Some(rest) = normalized.strip_prefix("www.") {
        normalized = rest.to_string();
    }
    normalized.trim_end_matches('/').to_string()
}

// Only defined when both url and year are known
pub fn make_cache_key(url: Option<&str>, year: Option<&str>) -> Option<String> {
    let url = url.filter(|u| !u.trim().is_empty())?;
    let year = year.filter(|y| !y.trim().is_empty())?;
    Some(format!(
        "{}{}:{}",
        CACHE_PREFIX,
        urlencoding::encode(&normalize_url(url)),
        year
    ))
}

/// Strip markdown fences and repeated title comments from a finished generation.
///
/// Output that is already clean comes back byte-identical.
pub fn clean_generated_html(text: &str) -> String {
    let unfenced = strip_fences(text);
    dedupe_title_comment(&unfenced)
}

fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() >= 2 * FENCE.len() && trimmed.starts_with(FENCE) && trimmed.ends_with(FENCE)
    {
        let inner = &trimmed[FENCE.len()..trimmed.len() - FENCE.len()];
        // Only a single wrapping block counts
        if !inner.contains(FENCE) {
            // Drop the language tag on the opening line, e.g. ```html
            let body = match inner.find('\n') {
                Some(pos) if inner[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                    &inner[pos + 1..]
                }
                _ => inner,
            };
            return body.trim().to_string();
        }
    }

    if !text.contains(FENCE) {
        return text.to_string();
    }

    let stripped = text.replace("```html", "").replace(FENCE, "");
    stripped.trim().to_string()
}

fn title_comment_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find(TITLE_MARKER) {
        let start = from + offset;
        let end = match text[start..].find(COMMENT_END) {
            Some(rel) => start + rel + COMMENT_END.len(),
            None => break,
        };
        spans.push((start, end));
        from = end;
    }
    spans
}

fn dedupe_title_comment(text: &str) -> String {
    let spans = title_comment_spans(text);
    if spans.len() < 2 {
        return text.to_string();
    }

    let (first_start, first_end) = spans[0];
    let title = &text[first_start..first_end];

    let mut rest = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in &spans {
        rest.push_str(&text[cursor..*start]);
        cursor = *end;
    }
    rest.push_str(&text[cursor..]);

    format!("{}\n{}", title, rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_trivial_differences() {
        let expected = "example.com";
        for url in [
            "https://example.com",
            "http://example.com/",
            "HTTPS://WWW.Example.com//",
            "  example.com ",
        ] {
            assert_eq!(normalize_url(url), expected, "url: {url}");
        }
        assert_eq!(normalize_url("https://example.com/Docs/"), "example.com/docs");
    }

    #[test]
    fn cache_key_layout() {
        assert_eq!(
            make_cache_key(Some("https://example.com"), Some("1995")).as_deref(),
            Some("ie:cache:example.com:1995")
        );
        assert_eq!(
            make_cache_key(Some("https://example.com/a b?q=1"), Some("2040")).as_deref(),
            Some("ie:cache:example.com%2Fa%20b%3Fq%3D1:2040")
        );
    }

    #[test]
    fn cache_key_requires_url_and_year() {
        assert!(make_cache_key(None, Some("1995")).is_none());
        assert!(make_cache_key(Some("example.com"), None).is_none());
        assert!(make_cache_key(Some(""), Some("1995")).is_none());
    }

    #[test]
    fn clean_html_passes_through_unchanged() {
        let html = "<!-- TITLE: Example 1995 -->\n<div class=\"p-4\">Hello</div>\n";
        assert_eq!(clean_generated_html(html), html);
    }

    #[test]
    fn wrapping_fence_is_removed() {
        let text = "```html\n<!-- TITLE: A -->\n<div>x</div>\n```";
        assert_eq!(clean_generated_html(text), "<!-- TITLE: A -->\n<div>x</div>");
    }

    #[test]
    fn bare_fence_is_removed() {
        let text = "```\n<div>x</div>\n```\n";
        assert_eq!(clean_generated_html(text), "<div>x</div>");
    }

    #[test]
    fn stray_fences_are_removed() {
        let text = "Here you go:\n```html\n<div>x</div>\n``` enjoy";
        assert_eq!(clean_generated_html(text), "Here you go:\n\n<div>x</div>\n enjoy");
    }

    #[test]
    fn repeated_title_comment_keeps_first_in_front() {
        let text = "<!-- TITLE: First -->\n<div>a</div>\n<!-- TITLE: Second -->\n<p>b</p>";
        let cleaned = clean_generated_html(text);

        assert_eq!(cleaned.matches(TITLE_MARKER).count(), 1);
        assert!(cleaned.starts_with("<!-- TITLE: First -->"));
        assert!(cleaned.contains("<p>b</p>"));
        assert_eq!(clean_generated_html(&cleaned), cleaned);
    }

    #[test]
    fn echoed_title_before_content_is_dropped() {
        let text = "<div>intro</div><!-- TITLE: Echo --><!-- TITLE: Echo -->";
        let cleaned = clean_generated_html(text);
        assert_eq!(cleaned, "<!-- TITLE: Echo -->\n<div>intro</div>");
    }
}
