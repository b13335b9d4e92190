//! Site vocabulary: change tags, edit-summary templates and the signature format.
//!
//! These describe how one particular wiki labels discussion edits. Pointing
//! the digest at a differently configured site means editing this file only.

/// Change tag applied to replies posted through the discussion tools.
pub const REPLY_TAG: &str = "discussiontools-reply";

/// Change tag applied to new topics posted through the discussion tools.
pub const NEW_TOPIC_TAG: &str = "discussiontools-newtopic";

/// Tag both sources are filtered by (covers replies and new topics).
pub const DISCUSSION_TAG: &str = "discussiontools-added-comment";

/// Opening of the section marker in an edit summary: `/* Heading */`.
pub const SECTION_SUMMARY_OPEN: &str = "/*";

/// Closing of the section marker in an edit summary.
pub const SECTION_SUMMARY_CLOSE: &str = "*/";

/// Edit-summary suffix of a reply.
pub const REPLY_SUMMARY_SUFFIX: &str = "Reply";

/// Edit-summary suffix of a new topic.
pub const NEW_SECTION_SUMMARY_SUFFIX: &str = "new section";

/// Edit-summary prefix the wiki generates when a page is created.
pub const PAGE_CREATION_SUMMARY_PREFIX: &str = "Created page with";

/// Summary texts (after the auto-generated section span) that mark a feed item as a reply.
pub const FEED_REPLY_SUMMARIES: &[&str] = &["Reply", "reply"];

/// Blocks preceding the page text in a new-page feed description
/// (the summary paragraph and the "New page" paragraph).
pub const NEW_PAGE_PREFIX_BLOCKS: usize = 2;

/// Markup tags whose wrappers are dropped from built content (inner text kept).
pub const STRIPPED_TAGS: &[&str] = &[
    "nowiki",
    "includeonly",
    "noinclude",
    "mobileonly",
    "nomobile",
    "code",
    "blockquote",
];

/// Trailing user signature:
/// `[[User:Name]] ([[User talk:Name|talk]]) HH:MM, D Month YYYY (UTC)`.
pub const SIGNATURE_PATTERN: &str = r"\[\[User:[^\]|]*(?:\|[^\]]*)?\]\]\s*\(\[\[User talk:[^\]|]*\|talk\]\]\)\s*\d{1,2}:\d{2}, \d{1,2} [A-Za-z]+ \d{4} \(UTC\)\s*$";

/// Stand-in for a line that held only whitespace.
pub const LINE_BREAK_PLACEHOLDER: &str = "<br>";

/// Day label used for records whose timestamp could not be parsed.
pub const UNKNOWN_DATE_LABEL: &str = "Unknown date";

/// Calendar-day label format (`January 20, 2025`).
pub const DAY_LABEL_FORMAT: &str = "%B %-d, %Y";
