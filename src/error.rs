use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Startup misconfiguration. Never produced once the scheduler is running.
    #[error("config: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: timed out")]
    TimedOut { context: String },

    #[error("mangadex responded with {status} ({body})")]
    Upstream { status: StatusCode, body: String },

    #[error("{context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("webhook responded with {status} ({body})")]
    Delivery { status: StatusCode, body: String },
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn timed_out(context: impl Into<String>) -> Self {
        Self::TimedOut {
            context: context.into(),
        }
    }

    /// True for failures the request never got an answer for.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::TimedOut { .. })
    }

    /// True when the source API answered but the answer was unusable.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Decode { .. })
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery { .. })
    }
}
