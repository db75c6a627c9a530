use anyhow::anyhow;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedData,
    InvalidMove,
    Network,
    Persistence,
    Timeout,
    Forbidden,
    Unknown,
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn malformed(code: &'static str, public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::MalformedData,
            code,
            public,
            source,
        }
    }

    pub fn invalid_move(code: &'static str, public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidMove,
            code,
            public,
            source,
        }
    }

    pub fn network(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Network,
            code: "network_error",
            public,
            source,
        }
    }

    pub fn persistence(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Persistence,
            code: "persistence_error",
            public,
            source,
        }
    }

    pub fn timeout(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            code: "timeout",
            public,
            source,
        }
    }

    pub fn forbidden(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Forbidden,
            code: "forbidden",
            public,
            source,
        }
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public,
            source,
        }
    }

    /// Transient failures that the user can retry by repeating the gesture.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network | ErrorKind::Persistence | ErrorKind::Timeout
        )
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {:#}", self.public, self.code, self.source)
    }
}

impl std::error::Error for LibError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<reqwest::Error> for LibError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::timeout("The server took too long to respond", anyhow!(value))
        } else if value.is_decode() {
            Self::malformed(
                "unreadable_response",
                "The server returned data that could not be read",
                anyhow!(value),
            )
        } else {
            Self::network("Could not reach the server", anyhow!(value))
        }
    }
}
