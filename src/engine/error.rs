use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    SessionNotFound(Ulid),
    LimitExceeded(&'static str),
    /// A feed source could not deliver; the affected week stays unselectable.
    FeedUnavailable { feed: &'static str, reason: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SessionNotFound(id) => write!(f, "session not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::FeedUnavailable { feed, reason } => {
                write!(f, "{feed} feed unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
