use std::fmt;
use thiserror::Error as ThisError;

///
/// CodecError
///
/// Structured codec error with a stable internal classification.
/// Every encode/decode/plan surface funnels failures through this type so
/// callers can branch on `class` without parsing messages.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct CodecError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl CodecError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a malformed-qualifier error for a specific origin.
    ///
    /// Raised for unreadable segment varints, unknown reference-type tags,
    /// and qualifier suffixes that contradict the schema. These indicate
    /// storage corruption or version skew, never a caller mistake.
    pub(crate) fn malformed_qualifier(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::MalformedQualifier, origin, message)
    }

    /// Construct an unsupported-shape error for a specific origin.
    pub(crate) fn unsupported_shape(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::UnsupportedShape, origin, message)
    }

    /// Construct a missing-definition error for a specific origin.
    pub(crate) fn missing_definition(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::MissingDefinition, origin, message)
    }

    /// Construct an unimplemented-operation error for a specific origin.
    ///
    /// Reserved branches (nested delete propagation, container change
    /// decoding below one level) report through this class so callers can
    /// detect and skip rather than trip an assertion.
    pub(crate) fn unimplemented(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unimplemented, origin, message)
    }

    /// Construct a storage-origin failure surfaced by a caller-supplied source.
    pub fn storage(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Storage, origin, message)
    }

    #[must_use]
    pub const fn is_unimplemented(&self) -> bool {
        matches!(self.class, ErrorClass::Unimplemented)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Codec failure taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    MalformedQualifier,
    UnsupportedShape,
    MissingDefinition,
    Unimplemented,
    Storage,
    Serialize,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MalformedQualifier => "malformed_qualifier",
            Self::UnsupportedShape => "unsupported_shape",
            Self::MissingDefinition => "missing_definition",
            Self::Unimplemented => "unimplemented",
            Self::Storage => "storage",
            Self::Serialize => "serialize",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Encode,
    Decode,
    Changes,
    Plan,
    Model,
    Serialize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
            Self::Changes => "changes",
            Self::Plan => "plan",
            Self::Model => "model",
            Self::Serialize => "serialize",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
