use std::fmt;

/// Errors produced by the environment-sanitization core.
///
/// Policy rejection is deliberately not represented here: `rebuild_env`
/// silently drops rejected variables (spec: not an error for rebuild),
/// while `validate_env_vars` reports rejections as a formatted diagnostic
/// string rather than this enum.
#[derive(Debug)]
pub enum EnvError {
    /// A name was empty, or contained `=` where that is not allowed
    /// (set/unset), or an entry passed to `put` had no `=` at all.
    InvalidName,
    /// Table growth would overflow `capacity + 128` or `capacity * size_of::<usize>()`.
    Overflow,
    /// `read_env_file` hit an I/O error other than the file being absent.
    Io(std::io::Error),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::InvalidName => write!(f, "invalid environment variable name"),
            EnvError::Overflow => write!(f, "internal error, environment table size overflow"),
            EnvError::Io(e) => write!(f, "unable to read environment file: {e}"),
        }
    }
}

impl std::error::Error for EnvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EnvError {
    fn from(err: std::io::Error) -> Self {
        EnvError::Io(err)
    }
}
