use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Assist,
    Ocr,
    Upload,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Assist => "assist",
            Mode::Ocr => "ocr",
            Mode::Upload => "upload",
        })
    }
}

/// Phase durations in milliseconds. Also returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_ms: Option<u64>,
    pub processing_ms: u64,
    pub total_ms: u64,
}

/// One completed request. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    pub route: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub timing: Timing,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
