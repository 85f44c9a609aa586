use uuid::Uuid;

#[derive(Debug)]
pub enum EngineError {
    /// The entity addressed by the operation does not exist.
    NotFound(Uuid),
    /// A referenced entity (foreign key in a request body) does not exist.
    UnknownReference { field: &'static str, id: Uuid },
    EmailTaken(String),
    UsernameTaken(String),
    /// An existing reservation overlaps the requested interval.
    Conflict(Uuid),
    /// Interval start is not before its end, or a query range is inverted.
    InvalidRange,
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnknownReference { field, id } => {
                write!(f, "unknown {field}: {id}")
            }
            EngineError::EmailTaken(email) => {
                write!(f, "client with email {email} already exists")
            }
            EngineError::UsernameTaken(username) => {
                write!(f, "employee with username {username} already exists")
            }
            EngineError::Conflict(id) => {
                write!(f, "conflict with reservation: {id}")
            }
            EngineError::InvalidRange => write!(f, "start date must be before end date"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
