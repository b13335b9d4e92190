use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diff::{extract_insertions, is_multi_revision, text_with_breaks};
use crate::digest::patterns::{FEED_REPLY_SUMMARIES, NEW_PAGE_PREFIX_BLOCKS};

static SUMMARY_PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static AUTOCOMMENT: LazyLock<Selector> = LazyLock::new(|| selector(".autocomment"));
static TOP_LEVEL_BLOCKS: LazyLock<Selector> = LazyLock::new(|| selector("body > *, html > *"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// The feed document could not be read as RSS/Atom at all.
#[derive(Debug, Error)]
#[error("Feed parse error: {0}")]
pub struct FeedParseError(#[from] feed_rs::parser::ParseFeedError);

/// One item of the RecentChanges syndication feed.
///
/// Content-rich but coarse: when several edits land on a page in quick
/// succession the feed may show them as one combined diff
/// (`has_multiple_revisions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub author: String,
    pub page_title: String,
    /// Section heading taken from the auto-generated part of the edit summary
    pub heading: Option<String>,
    /// Lines added by the edit; `None` when the diff cannot be decomposed
    pub text_additions: Option<Vec<String>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_reply: bool,
    /// Revision before the edit (`oldid`); 0 for page creations
    pub from_revision: u64,
    /// Revision after the edit (`diff`)
    pub to_revision: u64,
    pub is_new_page: bool,
    pub has_multiple_revisions: bool,
}

/// Parses a RecentChanges RSS/Atom document into records, newest first.
///
/// Per-item problems never fail the parse: a missing author or title becomes
/// an empty string, an unreadable date becomes `None`, unparseable revision
/// ids become 0.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedRecord>, FeedParseError> {
    let feed = parser::parse(bytes)?;

    let records = feed
        .entries
        .into_iter()
        .map(|entry| {
            let author = entry
                .authors
                .first()
                .map(|p| p.name.trim().to_string())
                .unwrap_or_default();
            let page_title = entry.title.map(|t| t.content).unwrap_or_default();
            let timestamp = entry.published.or(entry.updated);
            let (from_revision, to_revision) = entry
                .links
                .first()
                .map(|l| revisions_from_permalink(&l.href))
                .unwrap_or((0, 0));
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            let is_new_page = from_revision == 0;
            let has_multiple_revisions = is_multi_revision(&description);
            let (heading, is_reply) = classify_summary(&description);
            let text_additions = if is_new_page {
                Some(new_page_lines(&description))
            } else if has_multiple_revisions {
                None
            } else {
                Some(extract_insertions(&description))
            };

            FeedRecord {
                author,
                page_title,
                heading,
                text_additions,
                timestamp,
                is_reply,
                from_revision,
                to_revision,
                is_new_page,
                has_multiple_revisions,
            }
        })
        .collect();

    Ok(records)
}

/// Reads `oldid` and `diff` from a permalink such as
/// `https://host/w/index.php?title=Talk:X&diff=124&oldid=123`.
fn revisions_from_permalink(href: &str) -> (u64, u64) {
    let Ok(url) = url::Url::parse(href) else {
        tracing::debug!(href = %href, "Unparseable feed permalink");
        return (0, 0);
    };

    let mut from = 0;
    let mut to = 0;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "oldid" => from = value.parse().unwrap_or(0),
            "diff" => to = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    (from, to)
}

/// Heading and reply flag from the summary paragraph.
///
/// The summary looks like
/// `<p><span class="autocomment"><a>→‎Heading</a>: </span> Reply</p>`:
/// the auto-generated span carries the section, the text after it says what
/// kind of edit this was.
fn classify_summary(description: &str) -> (Option<String>, bool) {
    let html = Html::parse_fragment(description);
    let Some(summary) = html.select(&SUMMARY_PARAGRAPH).next() else {
        return (None, false);
    };
    let Some(auto) = summary.select(&AUTOCOMMENT).next() else {
        return (None, false);
    };

    let auto_text: String = auto.text().collect();
    let heading = auto_text
        .trim()
        .trim_start_matches(['→', '\u{200e}', '\u{200f}'])
        .trim_end_matches(':')
        .trim()
        .to_string();
    let heading = (!heading.is_empty()).then_some(heading);

    let full: String = summary.text().collect();
    let remainder = full
        .split_once(auto_text.as_str())
        .map(|(_, rest)| rest)
        .unwrap_or_default()
        .trim();
    let is_reply = FEED_REPLY_SUMMARIES.contains(&remainder);

    (heading, is_reply)
}

/// Page text of a creation entry: every block after the metadata prefix,
/// leading blank lines dropped.
fn new_page_lines(description: &str) -> Vec<String> {
    let html = Html::parse_fragment(description);
    let text = html
        .select(&TOP_LEVEL_BLOCKS)
        .skip(NEW_PAGE_PREFIX_BLOCKS)
        .map(text_with_breaks)
        .collect::<Vec<_>>()
        .join("\n");

    text.split('\n')
        .skip_while(|line| line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
