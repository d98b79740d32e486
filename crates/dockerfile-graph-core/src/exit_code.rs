use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    DockerfileParse = 3,
    Io = 6,
    Usage = 64,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(value: &Error) -> Self {
        match value {
            Error::DockerfileParse { .. } => Self::DockerfileParse,
            Error::InvalidArgument { .. } => Self::Usage,
            Error::Io { .. } => Self::Io,
        }
    }
}
