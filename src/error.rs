use std::path::Path;

use thiserror::Error;

/// Every failure an action can surface. Each variant renders the message
/// printed as the process's terminal failure.
#[derive(Debug, Error)]
pub enum AgileError {
    #[error("Invalid value for parameter [{name}] : [{value}]")]
    InvalidParameter { name: String, value: String },

    #[error("Invalid file [{0}], possibly file doesn't exists")]
    InvalidFile(String),

    #[error("Invalid file path [{0}], possibly application can not write at specified path")]
    NotWritable(String),

    #[error("[{kind}] named [{name}] found [{found}] , expected 1")]
    NameResolution {
        kind: String,
        name: String,
        found: usize,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    #[error("{0}")]
    Remote(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error in writing csv file: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AgileError>;

impl AgileError {
    pub fn invalid_parameter(name: &str, value: impl std::fmt::Display) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid_file(path: &Path) -> Self {
        Self::InvalidFile(path.display().to_string())
    }

    pub fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            context: context.to_string(),
            message: err.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Joins the server-reported error list into one message.
    pub fn remote(errors: &[String]) -> Self {
        if errors.is_empty() {
            Self::Remote("Request was not successful".into())
        } else {
            Self::Remote(errors.join("; "))
        }
    }
}
