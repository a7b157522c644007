use thiserror::Error;

use std::io;

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type FormatFileResult<T> = std::result::Result<T, FormatFileError>;

/// Errors while parsing an event id literal in the format file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntLiteralError {
    #[error("empty integer literal")]
    Empty,

    #[error("invalid digit `{found}` in base {radix} literal `{literal}`")]
    InvalidDigit {
        literal: String,
        found: char,
        radix: u32,
    },

    #[error("integer literal `{literal}` does not fit in 64 bits")]
    Overflow { literal: String },
}

/// Problems found while compiling a template at table build time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder `%({name})` at column {column}")]
    UnknownPlaceholder { name: String, column: usize },

    #[error("unsupported conversion `{conversion}` at column {column}")]
    UnsupportedConversion { conversion: char, column: usize },

    #[error("incomplete format specifier at column {column}")]
    Truncated { column: usize },

    #[error("{what} {value} at column {column} exceeds {max}")]
    TooWide {
        what: &'static str,
        value: usize,
        max: usize,
        column: usize,
    },
}

#[derive(Debug, Error)]
pub enum FormatFileError {
    #[error("failed to read format file")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("wrong format file (line {line}): {reason}")]
    WrongFormat { line: usize, reason: WrongFormatReason },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WrongFormatReason {
    #[error("expected `<event id> <template>`")]
    MissingTemplate,

    #[error("bad event id: {0}")]
    EventId(#[from] IntLiteralError),

    #[error("bad template: {0}")]
    Template(#[from] TemplateError),
}

/// Fatal errors while decoding the binary stream.
///
/// Running out of bytes is never an error, the reader simply stops.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("offset {offset}: failed to read {what}")]
    Io {
        offset: u64,
        what: &'static str,
        source: io::Error,
    },
}

/// A template could not be bound to the record fields.
///
/// This is absorbed by the renderer, which falls back to dumping the raw template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderMismatch {
    #[error("conversion at column {column} has no mapping key")]
    MissingKey { column: usize },

    #[error("value {value} at column {column} is not a character")]
    NotAChar { value: i128, column: usize },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to write output")]
    Output { source: io::Error },
}
