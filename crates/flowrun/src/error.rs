use std::path::PathBuf;

/// Runtime, lifecycle and driver failures.
#[derive(Debug)]
pub enum Error {
    /// The component buffer was empty or unreadable.
    Load(String),
    /// The module was invalid or its execution context could not be allocated.
    Instantiation(String),
    AlreadyInstantiated,
    AlreadyTerminated,
    /// The handle has no live execution context.
    NotInstantiated,
    /// An earlier invocation on this handle is still running.
    InvocationActive,
    /// A packet could not be built.
    Port(flowport::Error),
    /// A payload failed to decode and the caller asked to abort.
    Decode { port: String, error: flowpack::Error },
    /// The component ended the invocation with an error packet.
    Component { port: String, message: String },
    Engine(wasmtime::Error),
    Io { path: PathBuf, error: std::io::Error },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "Load error: {}", msg),
            Self::Instantiation(msg) => write!(f, "Instantiation error: {}", msg),
            Self::AlreadyInstantiated => write!(f, "Component is already instantiated"),
            Self::AlreadyTerminated => write!(f, "Component has been terminated"),
            Self::NotInstantiated => write!(f, "Component is not instantiated"),
            Self::InvocationActive => write!(f, "Another invocation is still active"),
            Self::Port(e) => write!(f, "Port error: {}", e),
            Self::Decode { port, error } => write!(f, "Decode error on port {}: {}", port, error),
            Self::Component { port, message } => {
                write!(f, "Component error on port {}: {}", port, message)
            }
            Self::Engine(e) => write!(f, "Engine error: {}", e),
            Self::Io { path, error } => write!(f, "Failed to read {}: {}", path.display(), error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Port(e) => Some(e),
            Self::Decode { error, .. } => Some(error),
            Self::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<flowport::Error> for Error {
    fn from(e: flowport::Error) -> Self {
        Self::Port(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
