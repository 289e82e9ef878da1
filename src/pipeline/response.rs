use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Outcome;
use crate::provider::Signals;
use crate::store::ImageToken;
use crate::telemetry::Timing;
use crate::text::strip_code_fence;

/// Text ready for speech plus optional extra facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpokenReply {
    pub spoken: String,
    pub details: Vec<String>,
}

impl SpokenReply {
    pub fn byte_len(&self) -> usize {
        self.spoken.len() + self.details.iter().map(String::len).sum::<usize>()
    }
}

#[derive(Deserialize)]
struct StructuredReply {
    #[serde(alias = "summary", alias = "text")]
    spoken: String,
    #[serde(default)]
    details: Vec<String>,
}

/// Splits backend output into spoken text and details.
///
/// Falls back to the whole text as `spoken` when it is not the expected JSON.
/// Never fails.
pub fn parse_spoken_reply(raw: &str) -> SpokenReply {
    match serde_json::from_str::<StructuredReply>(strip_code_fence(raw)) {
        Ok(reply) if !reply.spoken.trim().is_empty() => SpokenReply {
            spoken: reply.spoken.trim().to_string(),
            details: reply
                .details
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        },
        _ => SpokenReply {
            spoken: raw.trim().to_string(),
            details: Vec::new(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistResponse {
    #[serde(flatten)]
    pub reply: SpokenReply,
    pub signals: Signals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_token: Option<ImageToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResponse {
    #[serde(flatten)]
    pub reply: SpokenReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_token: Option<ImageToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub token: ImageToken,
    pub expires_in_ms: u64,
}

/// What a handler hands back: the result plus the timing block that every
/// response carries.
///
/// Serializes as `{"ok": true, "data": .., "timing": ..}` or
/// `{"ok": false, "error": {"message", "err_code", "details"?}, "timing": ..}`.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub result: Outcome<T>,
    pub timing: Timing,
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match &self.result {
            Ok(data) => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("data", data)?;
            }
            Err(failure) => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", failure)?;
            }
        }
        map.serialize_entry("timing", &self.timing)?;
        map.end()
    }
}
