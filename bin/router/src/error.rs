//! Domain error types for router commands.

use std::fmt;
use std::path::PathBuf;

/// Errors from running a router command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// An input file could not be read.
    ReadInput { path: PathBuf, details: String },
    /// An output file could not be written.
    WriteOutput { path: PathBuf, details: String },
    /// The workflow document could not be loaded.
    InvalidDocument { path: PathBuf, details: String },
    /// A command-line argument is malformed.
    InvalidArgument { name: &'static str, details: String },
    /// A graph edit was rejected.
    EditRejected { details: String },
    /// A routing request could not be answered.
    RoutingFailed { details: String },
    /// Output could not be serialized.
    Serialize { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::ReadInput { path, details } => {
                write!(f, "failed to read '{}': {details}", path.display())
            }
            Self::WriteOutput { path, details } => {
                write!(f, "failed to write '{}': {details}", path.display())
            }
            Self::InvalidDocument { path, details } => {
                write!(f, "'{}' is not a workflow definition: {details}", path.display())
            }
            Self::InvalidArgument { name, details } => {
                write!(f, "invalid --{name}: {details}")
            }
            Self::EditRejected { details } => write!(f, "edit rejected: {details}"),
            Self::RoutingFailed { details } => write!(f, "routing failed: {details}"),
            Self::Serialize { details } => write!(f, "failed to serialize output: {details}"),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let err = CliError::ReadInput {
            path: PathBuf::from("flows/support.json"),
            details: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("flows/support.json"));
    }

    #[test]
    fn argument_errors_name_the_flag() {
        let err = CliError::InvalidArgument {
            name: "data",
            details: "expected a JSON object".to_string(),
        };
        assert_eq!(err.to_string(), "invalid --data: expected a JSON object");
    }
}
