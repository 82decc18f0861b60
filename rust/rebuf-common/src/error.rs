use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn out_of_range(position: u64, length: u64) -> Error {
        Error(ErrorKind::PositionOutOfRange { position, length }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn corrupt_chunk<E>(position: u64, source: E) -> Error
    where
        E: Into<StdErrorBoxed>,
    {
        Error(
            ErrorKind::CorruptChunk {
                position,
                source: source.into(),
            }
            .into(),
        )
    }

    /// Converts the error into a `std::io::Error`, keeping the original I/O error
    /// when there is one.
    pub fn into_io_error(self) -> std::io::Error {
        match self.into_kind() {
            ErrorKind::Io { source, .. } => source,
            kind @ (ErrorKind::InvalidArgument { .. } | ErrorKind::PositionOutOfRange { .. }) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, kind)
            }
            kind => std::io::Error::other(kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("position {position} is beyond the end of the resource (length {length})")]
    PositionOutOfRange { position: u64, length: u64 },

    #[error("corrupt chunk at position {position}: {source}")]
    CorruptChunk {
        position: u64,
        source: StdErrorBoxed,
    },

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        e.into_io_error()
    }
}
