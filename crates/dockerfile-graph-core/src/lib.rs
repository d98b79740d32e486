pub mod args;
pub mod dot;
pub mod error;
pub mod exit_code;
pub mod images;
pub mod label;
pub mod lines;
pub mod model;
pub mod options;
pub mod parser;

pub use crate::dot::{DotOptions, EdgeStyle, render_dot};
pub use crate::error::Error;
pub use crate::exit_code::ExitCode;
pub use crate::model::{ExternalImage, Layer, SimplifiedDockerfile, Stage, WaitFor, WaitForKind};
pub use crate::parser::parse_dockerfile;
