use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::utils::time::now_utc;

pub const RESPONSE_ENVELOPE_SCHEMA_VERSION: &str = "qadash.response-envelope.v1";

/// Warning code attached to every record-level degradation.
pub const RECORD_DEGRADED: &str = "record_degraded";

/// A coded message. Warnings and the error share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub code: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Notice {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// How current the records behind a read response are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub stale: bool,
    /// Source chain the cache loaded from, e.g. `fallback[json:..., sqlite:...]`.
    pub source: String,
    /// Adapter that produced the records: `json` or `sqlite`.
    pub data_source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_at_utc: Option<String>,
}

/// Uniform JSON wrapper printed by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,

    pub meta: BTreeMap<String, Value>,
    pub warnings: Vec<Notice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Notice>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(Notice::new(code, message));
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        Self {
            ok,
            command: command.into(),
            generated_at_utc: now_utc(),
            data: None,
            freshness: None,
            meta: BTreeMap::from([(
                "schema_version".to_string(),
                json!(RESPONSE_ENVELOPE_SCHEMA_VERSION),
            )]),
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = Some(freshness);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.push(Notice::new(code, message));
        self
    }

    /// Adds one [`RECORD_DEGRADED`] warning per adapter message.
    #[must_use]
    pub fn with_degradations<'a>(mut self, messages: impl IntoIterator<Item = &'a String>) -> Self {
        self.warnings.extend(
            messages
                .into_iter()
                .map(|message| Notice::new(RECORD_DEGRADED, message.clone())),
        );
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    /// True when the caller got an answer but should not fully trust it.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.freshness.as_ref().is_some_and(|freshness| freshness.stale)
            || !self.warnings.is_empty()
    }
}

/// Carries an error envelope through `anyhow` so `main` can print it on stdout.
#[derive(Debug, Clone)]
pub struct ResponseEnvelopeFailure {
    envelope: ResponseEnvelope,
}

impl ResponseEnvelopeFailure {
    #[must_use]
    pub fn new(envelope: ResponseEnvelope) -> Self {
        Self { envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }
}

impl Display for ResponseEnvelopeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => write!(f, "{} failed", self.envelope.command),
        }
    }
}

impl std::error::Error for ResponseEnvelopeFailure {}
