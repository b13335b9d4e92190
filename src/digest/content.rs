//! Display text for a discussion edit, built from the raw lines it added.
//!
//! The input is wikitext as it appears in a diff: headings, indentation colons,
//! trailing signatures and link markup. The output is a single line of plain
//! text suitable for a digest preview.

use std::sync::LazyLock;

use regex::Regex;

use super::patterns::{LINE_BREAK_PLACEHOLDER, SIGNATURE_PATTERN, STRIPPED_TAGS};

static REPLY_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:+ ?").expect("indent pattern is valid"));

static SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SIGNATURE_PATTERN).expect("signature pattern is valid"));

static PAIRED_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    let names = STRIPPED_TAGS.join("|");
    Regex::new(&format!(r"(?i)</?(?:{names})\b[^>]*>")).expect("tag pattern is valid")
});

static LABELLED_WIKILINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[[^\[\]|]*\|([^\[\]]*)\]\]").expect("wikilink pattern is valid")
});

static BARE_WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[:?([^\[\]|]*)\]\]").expect("wikilink pattern is valid"));

static EXTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:https?:)?//[^\s\]]+\s+([^\]]+)\]").expect("external link pattern is valid")
});

/// Builds preview text from the lines an edit added.
///
/// Steps, in order:
///
/// 1. remove the first `== heading ==` marker matching `heading`
///    (spaces and underscores are interchangeable), dropping the line if it
///    becomes blank
/// 2. for replies, strip one leading indentation run (`:`, `::`, ...) per line
/// 3. strip the trailing user signature
/// 4. drop leading and trailing blank lines
/// 5. join with single spaces; whitespace-only lines become a line-break
///    placeholder, empty lines disappear
/// 6. strip wrapper tags such as `<nowiki>` and `<code>`, keeping their text
/// 7. reduce `[[target|label]]`, `[[target]]` and `[url label]` to their
///    display text
///
/// The function is pure: identical input always yields identical output.
///
/// # Examples
///
/// ```
/// use talkdigest::digest::build_content;
///
/// let lines = vec![
///     "== T ==".to_string(),
///     "hello [[Foo|there]]".to_string(),
/// ];
/// assert_eq!(build_content(&lines, Some("T"), false), "hello there");
/// ```
pub fn build_content(lines: &[String], heading: Option<&str>, is_reply: bool) -> String {
    let mut lines: Vec<String> = lines.to_vec();

    if let Some(heading) = heading.filter(|h| !h.trim().is_empty()) {
        strip_heading_marker(&mut lines, heading);
    }

    if is_reply {
        for line in lines.iter_mut() {
            let stripped = REPLY_INDENT.replace(line, "").into_owned();
            *line = stripped;
        }
    }

    let joined = lines.join("\n");
    let unsigned = SIGNATURE.replace(&joined, "");
    let mut lines: Vec<&str> = unsigned.split('\n').collect();

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let text = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                LINE_BREAK_PLACEHOLDER
            } else {
                trimmed
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let text = PAIRED_TAGS.replace_all(&text, "");
    let text = LABELLED_WIKILINK.replace_all(&text, "$1");
    let text = BARE_WIKILINK.replace_all(&text, "$1");
    let text = EXTERNAL_LINK.replace_all(&text, "$1");

    text.into_owned()
}

/// Removes one heading marker for `heading`, in place.
fn strip_heading_marker(lines: &mut Vec<String>, heading: &str) {
    let words: Vec<String> = heading
        .split([' ', '_'])
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return;
    }
    let pattern = format!(r"={{2,6}}[ _]*{}[ _]*={{2,6}}", words.join("[ _]+"));
    let Ok(marker) = Regex::new(&pattern) else {
        tracing::debug!(heading = %heading, "Heading marker pattern rejected, leaving lines untouched");
        return;
    };

    let Some(pos) = lines.iter().position(|line| marker.is_match(line)) else {
        return;
    };

    let stripped = marker.replacen(&lines[pos], 1, "").into_owned();
    if stripped.trim().is_empty() {
        lines.remove(pos);
    } else {
        lines[pos] = stripped;
    }
}
