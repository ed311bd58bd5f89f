use std::fmt::Debug;

/// A relq error. Every failure on a library path is one of these; emission
/// aborts on the first error and discards partial output.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub reason: Reason,
    pub hints: Vec<String>,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// An item or label is not visible under the current emitter chain.
    NotFound {
        name: String,
        namespace: String,
    },
    /// Duplicated bindings, labels out of range, slicing a distinct query and
    /// other misuses of the builder surface.
    InvalidArgument(String),
    /// Template regions of one tag carry different text, or a batch revise
    /// supplies conflicting replacements for the same region.
    Inconsistent(String),
    /// A template region lies outside the text, is negative or inverted.
    Boundary(String),
    /// The dialect lacks a requested feature.
    Unsupported(String),
    /// Internal invariant breakage.
    Bug {
        details: Option<String>,
    },
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            reason,
            hints: Vec::new(),
        }
    }

    pub fn not_found<S: ToString>(name: S, namespace: &str) -> Self {
        Error::new(Reason::NotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    pub fn invalid_argument<S: ToString>(message: S) -> Self {
        Error::new(Reason::InvalidArgument(message.to_string()))
    }

    pub fn inconsistent<S: ToString>(message: S) -> Self {
        Error::new(Reason::Inconsistent(message.to_string()))
    }

    pub fn boundary<S: ToString>(message: S) -> Self {
        Error::new(Reason::Boundary(message.to_string()))
    }

    pub fn unsupported<S: ToString>(feature: S) -> Self {
        Error::new(Reason::Unsupported(feature.to_string()))
    }

    /// Used for things that you *think* should never happen, but are not sure.
    pub fn new_assert<S: ToString>(details: S) -> Self {
        Error::new(Reason::Bug {
            details: Some(details.to_string()),
        })
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::NotFound { name, namespace } => write!(f, "{namespace} `{name}` not found"),
            Reason::InvalidArgument(text) => write!(f, "invalid argument: {text}"),
            Reason::Inconsistent(text) => write!(f, "inconsistent: {text}"),
            Reason::Boundary(text) => write!(f, "region out of bounds: {text}"),
            Reason::Unsupported(feature) => write!(f, "dialect does not support {feature}"),
            Reason::Bug { details } => {
                write!(f, "internal error")?;
                if let Some(details) = details {
                    write!(f, "; {details}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.reason, f)?;
        for hint in &self.hints {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl<T> WithErrorInfo for Result<T> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }
}
