use thiserror::Error;

/// Errors surfaced by the weather client.
#[derive(Debug, Error)]
pub enum Error {
    /// No API key was found in the config file or environment. Raised when the
    /// client is constructed, before any request is attempted.
    #[error(
        "OpenWeather API key is missing.\n\
         Hint: run `dashboard configure` or set the OPENWEATHER_API_KEY environment variable."
    )]
    MissingApiKey,

    /// The caller passed an empty city name or an empty id list.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider returned a non-success status, or the request never
    /// completed. Carries the HTTP status when one was received.
    #[error("OpenWeather request failed{}: {message}", fmt_status(.status))]
    Upstream { status: Option<u16>, message: String },

    /// The provider answered 2xx but the body was not the expected JSON.
    #[error("Failed to parse OpenWeather response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// Build an `Upstream` error from a transport-level failure (DNS,
    /// connect, timeout). No status is available in that case.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Error::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
