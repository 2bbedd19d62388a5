use std::any::Any;
use std::io;
use thiserror::Error;

/// Errors produced while turning a file into Markdown.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Input stream is empty")]
    EmptyInput,

    #[error("Could not determine file type")]
    UnknownType,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Failed to convert {format}: {message}")]
    Format {
        format: &'static str,
        message: String,
    },
}

impl ConvertError {
    pub(crate) fn format(format: &'static str) -> impl FnOnce(String) -> Self {
        move |message| ConvertError::Format { format, message }
    }
}

/// Text of a caught panic payload (`&str` or `String`, as `panic!` produces).
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
