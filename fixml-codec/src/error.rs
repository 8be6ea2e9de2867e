//! Decode-side error type.
//!
//! Mirrors the teacher's convention of a flat `thiserror` enum per crate
//! rather than a tree of nested error types.

use thiserror::Error;

/// Everything that can go wrong turning bytes into a [`fixml_types::Message`].
#[derive(Debug, Error)]
pub enum ParserError {
    /// The underlying XML is not well-formed.
    #[error("malformed XML: {0}")]
    MalformedXml(#[from] quick_xml::Error),

    /// The document root carries an `xmlns` this engine does not recognize.
    #[error("unrecognized FIXML namespace: {0}")]
    UnknownNamespace(String),

    /// The element nesting does not match any known message shape.
    #[error("structure violation: {0}")]
    StructureViolation(&'static str),

    /// More than 16 open elements at once.
    #[error("element nesting exceeds the maximum supported depth")]
    TooDeep,

    /// The buffered bytes end before a full document could be tokenized —
    /// either mid-element or mid-attribute. More input may resolve this;
    /// [`crate::decode::StreamingParser`] treats it as "need more", not a
    /// hard failure.
    #[error("incomplete document")]
    Incomplete,

    /// An attribute held a value that could not be parsed into the expected type.
    #[error("invalid value for attribute `{attr}`: {value}")]
    InvalidAttrValue { attr: &'static str, value: String },

    /// A required attribute or child element was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A mnemonic or symbol attribute was present but empty.
    #[error(transparent)]
    Validation(#[from] fixml_types::ValidationError),
}

pub type Result<T> = std::result::Result<T, ParserError>;
