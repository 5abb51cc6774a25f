/// Packet construction and boundary lifting failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The port name was empty.
    InvalidPort(String),
    /// Encoding a value into a payload failed.
    Codec(flowpack::Error),
    /// The component value did not have the expected shape.
    TypeMismatch { expected: String, found: String },
    /// A packet record was missing a required field.
    MissingField(String),
    /// A well-formed record violated the packet invariants.
    ProtocolViolation(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPort(port) => write!(f, "Invalid port name: {:?}", port),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Self::MissingField(name) => write!(f, "Missing field: {}", name),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<flowpack::Error> for Error {
    fn from(e: flowpack::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
