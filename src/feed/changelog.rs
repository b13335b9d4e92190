use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::digest::patterns::{
    NEW_SECTION_SUMMARY_SUFFIX, NEW_TOPIC_TAG, PAGE_CREATION_SUMMARY_PREFIX, REPLY_SUMMARY_SUFFIX,
    REPLY_TAG, SECTION_SUMMARY_CLOSE, SECTION_SUMMARY_OPEN,
};

/// Errors for a change-log response that cannot be used at all.
#[derive(Debug, Error)]
pub enum ChangeLogParseError {
    /// Body is not JSON.
    #[error("Invalid change-log JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The API answered with an error object instead of results.
    #[error("Change-log API error {code}: {info}")]
    Api { code: String, info: String },
}

/// One tagged revision from the RecentChanges API.
///
/// Fine-grained (one record per edit) but without content; `contents` is
/// filled in later by reconciliation or gap-filling. `None` after the whole
/// pipeline means the content could not be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogRecord {
    pub page_id: u64,
    pub page_title: String,
    pub heading: Option<String>,
    pub username: String,
    pub is_anonymous: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_reply: bool,
    pub is_new_topic: bool,
    pub from_revision: u64,
    pub to_revision: u64,
    pub contents: Option<String>,
}

/// Parses a `list=recentchanges` response into records, preserving order.
///
/// Only a non-JSON body or an API error object fails; individual entries are
/// read field by field and malformed values fall back to empty/zero/`None`.
pub fn parse_change_log(bytes: &[u8]) -> Result<Vec<ChangeLogRecord>, ChangeLogParseError> {
    let body: Value = serde_json::from_slice(bytes)?;

    if let Some(error) = body.get("error") {
        return Err(ChangeLogParseError::Api {
            code: str_field(error, "code"),
            info: str_field(error, "info"),
        });
    }

    let Some(entries) = body
        .get("query")
        .and_then(|q| q.get("recentchanges"))
        .and_then(Value::as_array)
    else {
        tracing::debug!("Change-log response has no recentchanges list");
        return Ok(Vec::new());
    };

    Ok(entries.iter().map(parse_entry).collect())
}

fn parse_entry(entry: &Value) -> ChangeLogRecord {
    let tags: Vec<&str> = entry
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let is_reply = tags.contains(&REPLY_TAG);
    let is_new_topic = tags.contains(&NEW_TOPIC_TAG);

    let comment = str_field(entry, "comment");
    let heading = heading_from_summary(&comment, is_reply, is_new_topic);

    // formatversion=2 sends `"anon": true`, the legacy format sends `"anon": ""`
    let is_anonymous = entry
        .get("anon")
        .is_some_and(|v| !matches!(v, Value::Bool(false) | Value::Null));

    let timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    ChangeLogRecord {
        page_id: u64_field(entry, "pageid"),
        page_title: str_field(entry, "title"),
        heading,
        username: str_field(entry, "user"),
        is_anonymous,
        timestamp,
        is_reply,
        is_new_topic,
        from_revision: u64_field(entry, "old_revid"),
        to_revision: u64_field(entry, "revid"),
        contents: None,
    }
}

/// Section heading from an edit summary such as `/* Topic */ Reply`.
///
/// Page creations carry the page text rather than a section marker and yield
/// `None`, as does any summary without a `/* ... */` wrapper.
pub(crate) fn heading_from_summary(
    comment: &str,
    is_reply: bool,
    is_new_topic: bool,
) -> Option<String> {
    let comment = comment.trim();
    if comment.starts_with(PAGE_CREATION_SUMMARY_PREFIX) {
        return None;
    }

    let suffix = if is_reply {
        Some(REPLY_SUMMARY_SUFFIX)
    } else if is_new_topic {
        Some(NEW_SECTION_SUMMARY_SUFFIX)
    } else {
        None
    };
    let marker = suffix
        .and_then(|s| comment.strip_suffix(s))
        .unwrap_or(comment)
        .trim_end();

    let inner = marker.strip_prefix(SECTION_SUMMARY_OPEN)?;
    let (heading, _) = inner.split_once(SECTION_SUMMARY_CLOSE)?;
    let heading = heading.trim();

    (!heading.is_empty()).then(|| heading.to_string())
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RESPONSE: &str = r#"{
  "batchcomplete": true,
  "query": {
    "recentchanges": [
      {
        "type": "edit", "ns": 1, "title": "Talk:Example", "pageid": 42,
        "revid": 124, "old_revid": 123, "rcid": 9001,
        "user": "Alice", "timestamp": "2025-01-20T14:00:00Z",
        "comment": "/* Some topic */ Reply",
        "tags": ["discussiontools", "discussiontools-reply", "discussiontools-added-comment"]
      },
      {
        "type": "edit", "ns": 1, "title": "Talk:Example", "pageid": 42,
        "revid": 123, "old_revid": 120, "rcid": 9000,
        "user": "192.0.2.7", "anon": true, "timestamp": "2025-01-20T13:00:00Z",
        "comment": "/* Fresh */ new section",
        "tags": ["discussiontools-newtopic"]
      },
      {
        "type": "new", "ns": 1, "title": "Talk:New", "pageid": 77,
        "revid": 500, "old_revid": 0,
        "user": "Carol", "timestamp": "not a date",
        "comment": "Created page with \"== Hi ==\"",
        "tags": ["discussiontools-newtopic"]
      }
    ]
  }
}"#;

    #[test]
    fn test_parse_entries() {
        let records = parse_change_log(RESPONSE.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let reply = &records[0];
        assert_eq!(reply.page_id, 42);
        assert_eq!(reply.page_title, "Talk:Example");
        assert_eq!(reply.username, "Alice");
        assert!(!reply.is_anonymous);
        assert!(reply.is_reply);
        assert!(!reply.is_new_topic);
        assert_eq!(reply.heading.as_deref(), Some("Some topic"));
        assert_eq!((reply.from_revision, reply.to_revision), (123, 124));
        assert_eq!(reply.contents, None);
        assert_eq!(
            reply.timestamp.unwrap().to_rfc3339(),
            "2025-01-20T14:00:00+00:00"
        );

        let topic = &records[1];
        assert!(topic.is_anonymous);
        assert!(topic.is_new_topic);
        assert!(!topic.is_reply);
        assert_eq!(topic.heading.as_deref(), Some("Fresh"));

        let created = &records[2];
        assert_eq!(created.heading, None);
        assert_eq!(created.timestamp, None);
        assert_eq!(created.from_revision, 0);
    }

    #[test]
    fn test_legacy_anon_flag() {
        let body = r#"{"query":{"recentchanges":[{"anon":"","revid":1}]}}"#;
        let records = parse_change_log(body.as_bytes()).unwrap();
        assert!(records[0].is_anonymous);
    }

    #[test]
    fn test_malformed_entry_degrades() {
        let body = r#"{"query":{"recentchanges":[{"revid":"seven","tags":"nope","comment":5}]}}"#;
        let records = parse_change_log(body.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_revision, 0);
        assert!(!records[0].is_reply);
        assert_eq!(records[0].heading, None);
    }

    #[test]
    fn test_missing_list_is_empty() {
        let records = parse_change_log(br#"{"batchcomplete":true}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_api_error() {
        let body = r#"{"error":{"code":"badvalue","info":"Unrecognized value"}}"#;
        match parse_change_log(body.as_bytes()) {
            Err(ChangeLogParseError::Api { code, .. }) => assert_eq!(code, "badvalue"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            parse_change_log(b"<html>"),
            Err(ChangeLogParseError::Json(_))
        ));
    }

    #[test]
    fn test_heading_from_summary() {
        assert_eq!(
            heading_from_summary("/* A b */ Reply", true, false).as_deref(),
            Some("A b")
        );
        assert_eq!(
            heading_from_summary("/* A b */ new section", false, true).as_deref(),
            Some("A b")
        );
        assert_eq!(
            heading_from_summary("/* Kept */ custom text", true, false).as_deref(),
            Some("Kept")
        );
        assert_eq!(heading_from_summary("Reply", true, false), None);
        assert_eq!(heading_from_summary("/*  */ Reply", true, false), None);
        assert_eq!(
            heading_from_summary("Created page with \"/* x */\"", false, true),
            None
        );
    }
}
