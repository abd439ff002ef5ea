//! Anchor extraction from directory-index pages.
//!
//! Auto-index pages wrap the listing in a table (`id="list"` on the
//! mirrors this tool targets); extraction is scoped to that table so
//! navigation chrome outside the listing never leaks into the crawl.

use std::sync::LazyLock;

use regex::Regex;

/// Anchor tags with a double-quoted href.
#[allow(clippy::expect_used)]
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]*)""#).expect("anchor regex is valid") // Static pattern, safe to panic
});

/// Returns the ordered hyperlink targets on an index page.
///
/// Scoped to the index table when one exists (`id="list"` preferred,
/// else the first table), falling back to the whole document. Column
/// sort links (`?C=N;O=D`) and fragments are dropped.
#[must_use]
pub fn extract_links(html: &str) -> Vec<String> {
    let scope = index_table_slice(html).unwrap_or(html);
    ANCHOR_HREF
        .captures_iter(scope)
        .map(|captures| captures[1].to_string())
        .filter(|href| !href.is_empty() && !href.starts_with('?') && !href.starts_with('#'))
        .collect()
}

fn index_table_slice(html: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets stable, so positions found in
    // the lowered copy index directly into the original.
    let lower = html.to_ascii_lowercase();
    let start = table_with_id(&lower, "list").or_else(|| lower.find("<table"))?;
    let open_end = lower[start..].find('>')? + start + 1;
    let close = lower[open_end..].find("</table")? + open_end;
    Some(&html[open_end..close])
}

fn table_with_id(lower: &str, id: &str) -> Option<usize> {
    let quoted = format!("id=\"{id}\"");
    let bare = format!("id={id}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find("<table") {
        let at = from + pos;
        let tag_end = lower[at..].find('>')? + at;
        let tag = &lower[at..tag_end];
        if tag.contains(&quoted) || tag.contains(&bare) {
            return Some(at);
        }
        from = tag_end;
    }
    None
}
