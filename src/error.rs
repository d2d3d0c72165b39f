use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `onboard-relay`.
///
/// Each subsystem defines its own error enum. Drivers match on these to decide
/// whether a failure is per-item (report and continue) or run-fatal; the
/// application edge uses `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Change-set detection ────────────────────────────────────────────
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),

    // ── Chat transport ──────────────────────────────────────────────────
    #[error("chat: {0}")]
    Chat(#[from] ChatError),

    // ── Entity sources ──────────────────────────────────────────────────
    #[error("source: {0}")]
    Source(#[from] SourceError),

    // ── Notification delivery ───────────────────────────────────────────
    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),

    // ── Directory administration ────────────────────────────────────────
    #[error("directory: {0}")]
    Directory(#[from] DirectoryError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("missing required setting `{key}` ({hint})")]
    Missing { key: &'static str, hint: &'static str },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Detector errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DetectorError {
    /// The baseline is the idempotence anchor; failing to write it aborts the run.
    #[error("failed to write baseline {path}: {message}")]
    BaselineWrite { path: String, message: String },

    #[error("failed to encode baseline: {0}")]
    Encode(String),
}

// ─── Chat transport errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{endpoint} rate-limited")]
    RateLimited { endpoint: String },

    #[error("{endpoint} still rate-limited after {attempts} attempts")]
    RateLimitExhausted { endpoint: String, attempts: u32 },

    #[error("{endpoint} denied for missing capability: {code}")]
    MissingCapability { endpoint: String, code: String },

    #[error("{endpoint} found no match: {code}")]
    NotFound { endpoint: String, code: String },

    #[error("{endpoint} failed: {code}")]
    Api { endpoint: String, code: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} request failed: {message}")]
    Transport { endpoint: String, message: String },
}

impl ChatError {
    /// Map a Slack `error` code from an `{"ok": false}` body onto the taxonomy.
    pub fn from_api_code(endpoint: &str, code: &str) -> Self {
        let endpoint = endpoint.to_string();
        let code_owned = code.to_string();
        match code {
            "ratelimited" | "rate_limited" => Self::RateLimited { endpoint },
            "missing_scope"
            | "not_allowed_token_type"
            | "no_permission"
            | "restricted_action"
            | "access_denied"
            | "method_not_supported_for_channel_type" => Self::MissingCapability {
                endpoint,
                code: code_owned,
            },
            "users_not_found" | "user_not_found" => Self::NotFound {
                endpoint,
                code: code_owned,
            },
            _ => Self::Api {
                endpoint,
                code: code_owned,
            },
        }
    }

    pub fn is_missing_capability(&self) -> bool {
        matches!(self, Self::MissingCapability { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ─── Source errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{endpoint} rate-limited")]
    RateLimited { endpoint: String },

    #[error("{endpoint} still rate-limited after {attempts} attempts")]
    RateLimitExhausted { endpoint: String, attempts: u32 },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} request failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned an unexpected payload: {message}")]
    Decode { endpoint: String, message: String },

    #[error("roster {path}: {message}")]
    Roster { path: String, message: String },
}

// ─── Delivery errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Every applicable strategy failed and nothing was left to fall back on.
    #[error("no delivery path reached {recipient}: {}", format_attempts(.attempts, .resolution.as_deref()))]
    Exhausted {
        recipient: String,
        resolution: Option<String>,
        attempts: Vec<(String, String)>,
    },
}

fn format_attempts(attempts: &[(String, String)], resolution: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(attempts.len() + 1);
    if let Some(reason) = resolution {
        parts.push(format!("resolve: {reason}"));
    }
    parts.extend(
        attempts
            .iter()
            .map(|(strategy, message)| format!("{strategy}: {message}")),
    );
    if parts.is_empty() {
        "no strategy was applicable".to_string()
    } else {
        parts.join("; ")
    }
}

// ─── Directory errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("`{program} {action}` exited with status {status}: {stderr}")]
    Command {
        program: String,
        action: String,
        status: i32,
        stderr: String,
    },

    #[error("unknown directory module version `{0}` (expected v1 or v2)")]
    UnknownVersion(String),
}
