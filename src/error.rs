use std::{error, fmt, io};

/// Crate-wide error type returned by every stage of the compilation
/// pipeline.
///
/// Each pipeline stage surfaces its own errors up through this enum;
/// later stages are never invoked once an earlier one has failed (see
/// the propagation rules in the error handling design).
#[derive(Debug)]
pub enum Error {
    /// The named class could not be located by the caller's class loader.
    ClassNotFound(String),
    /// The input bytes fail a structural or magic/version check.
    MalformedClass(String),
    /// A constant-pool entry used by the decoded instructions is a tag the
    /// reader does not understand.
    UnsupportedConstant(u8),
    /// The class has no method matching the requested selector, or (for
    /// whole-class compilation) no method at all.
    NoExecutableMethod,
    /// The container writer failed to create or write the output file.
    WriteFailed(io::Error),
    /// Setting the executable permission bits on the output file failed.
    ///
    /// Constructible by [`crate::container::set_executable`], but the
    /// pipeline only ever logs this variant via
    /// [`crate::diagnostics::warn_permission`] and continues; it is part
    /// of the public enum so callers that invoke the container writer
    /// directly still get a typed error instead of a silent no-op.
    PermissionSetFailed(io::Error),
    /// An invariant the pipeline relies on was violated. These indicate a
    /// bug in this crate, not a bad input.
    InternalError(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassNotFound(name) => write!(f, "class not found: `{name}`"),
            Self::MalformedClass(reason) => write!(f, "malformed class file: {reason}"),
            Self::UnsupportedConstant(tag) => {
                write!(f, "unsupported constant pool tag: {tag}")
            }
            Self::NoExecutableMethod => write!(f, "no executable method found"),
            Self::WriteFailed(err) => write!(f, "failed to write output file: {err}"),
            Self::PermissionSetFailed(err) => {
                write!(f, "failed to set executable permission bits: {err}")
            }
            Self::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::WriteFailed(err) | Self::PermissionSetFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::WriteFailed(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
