//! The per-family discovery cursor.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::SatelliteFamily;

/// Last successful discovery time plus the ids returned by that pass.
///
/// Replaced wholesale on every committed pass; ids from older passes are not
/// carried forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub family: SatelliteFamily,
    pub last_run: DateTime<Utc>,
    pub seen_ids: BTreeSet<String>,
}

impl Watermark {
    pub fn new(
        family: SatelliteFamily,
        last_run: DateTime<Utc>,
        seen_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            family,
            last_run: truncate_to_seconds(last_run),
            seen_ids: seen_ids.into_iter().collect(),
        }
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    pub(crate) fn to_document(&self) -> WatermarkDocument {
        WatermarkDocument {
            time: self.last_run.to_rfc3339_opts(SecondsFormat::Secs, true),
            files: self.seen_ids.iter().cloned().collect(),
        }
    }

    pub(crate) fn from_document(
        family: SatelliteFamily,
        doc: WatermarkDocument,
    ) -> Result<Self, chrono::ParseError> {
        let last_run = DateTime::parse_from_rfc3339(&doc.time)?.with_timezone(&Utc);
        Ok(Self::new(family, last_run, doc.files))
    }
}

/// On-disk form: `{"time": "<ISO-8601 UTC>", "files": [...]}`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WatermarkDocument {
    pub time: String,
    #[serde(default)]
    pub files: Vec<String>,
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}
