use thiserror::Error;

/// Failures on the fetch path.
///
/// Per-year `Transport` / `Upstream` / `Parse` failures are absorbed by the
/// aggregator; `UnknownDataset` and `InvalidDate` describe a malformed
/// initiating request and always surface to the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {provider} failed")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} responded with status {status}: {body}")]
    Upstream {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("Unknown dataset '{0}'. Supported datasets: SLV, FLX.")]
    UnknownDataset(String),

    #[error("Invalid calendar day {month:02}/{day:02}")]
    InvalidDate { month: u32, day: u32 },
}

impl FetchError {
    pub(crate) fn transport(provider: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { provider, source }
    }

    pub(crate) fn upstream(provider: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        Self::Upstream {
            provider,
            status,
            body: truncate_body(body),
        }
    }

    pub(crate) fn parse<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::Parse {
            provider,
            message: message.into(),
        }
    }

    /// True for failures that only affect a single year of a multi-year fetch.
    pub fn is_per_year(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Upstream { .. } | Self::Parse { .. }
        )
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
