use thiserror::Error as ThisError;

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// A proposed update lost the commit race and was dropped.
    Conflict,
    /// A value could not be canonicalized for projection.
    Serialize,
    Internal,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Commit,
    Watch,
    Projection,
}

///
/// AtomError
///
/// Structured out-of-band failure report with a stable classification.
/// Never returned by the atom's operations, which are contractually
/// non-failing; it only flows through the failure sink.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct AtomError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl AtomError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Report for a retrying update that ran out of attempts.
    pub(crate) fn retry_exhausted(attempts: u32) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Commit,
            format!("update dropped after {attempts} stale commit attempts"),
        )
    }
}

///
/// ProjectionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ProjectionError {
    #[error("projection serialize error: {0}")]
    Serialize(String),
}

impl ProjectionError {
    pub(crate) const fn class() -> ErrorClass {
        ErrorClass::Serialize
    }
}

impl From<ProjectionError> for AtomError {
    fn from(err: ProjectionError) -> Self {
        Self::new(
            ProjectionError::class(),
            ErrorOrigin::Projection,
            err.to_string(),
        )
    }
}
