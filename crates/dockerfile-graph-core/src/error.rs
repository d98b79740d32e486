use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("dockerfile parse error: {msg}")]
    DockerfileParse { msg: String },
    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn dockerfile_parse(msg: impl Into<String>) -> Self {
        Self::DockerfileParse { msg: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument { msg: msg.into() }
    }
}
