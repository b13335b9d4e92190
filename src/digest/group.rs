use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use super::patterns::{DAY_LABEL_FORMAT, UNKNOWN_DATE_LABEL};
use crate::feed::ChangeLogRecord;

/// Consecutive records sharing a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateGroup {
    /// Day label, e.g. `January 20, 2025`
    pub label: String,
    pub records: Vec<ChangeLogRecord>,
}

/// The finished digest: day groups in source (newest-first) order.
///
/// A list rather than a map: the same label can appear twice when records
/// from one day are separated by a record from another day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedResult {
    pub groups: Vec<DateGroup>,
}

impl GroupedResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All records, in order.
    pub fn records(&self) -> impl Iterator<Item = &ChangeLogRecord> {
        self.groups.iter().flat_map(|g| g.records.iter())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut ChangeLogRecord> {
        self.groups.iter_mut().flat_map(|g| g.records.iter_mut())
    }
}

/// Buckets records by calendar day in `tz`, in one forward pass.
///
/// A new group starts whenever a record's label differs from the previous
/// record's, so ordering is never changed and out-of-order input produces
/// repeated labels.
pub fn group_by_date<Tz>(records: Vec<ChangeLogRecord>, tz: &Tz) -> GroupedResult
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut groups: Vec<DateGroup> = Vec::new();

    for record in records {
        let label = match record.timestamp {
            Some(ts) => ts.with_timezone(tz).format(DAY_LABEL_FORMAT).to_string(),
            None => UNKNOWN_DATE_LABEL.to_string(),
        };

        match groups.last_mut() {
            Some(group) if group.label == label => group.records.push(record),
            _ => groups.push(DateGroup {
                label,
                records: vec![record],
            }),
        }
    }

    GroupedResult { groups }
}
