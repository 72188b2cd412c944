use thiserror::Error;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    /// A bounding box with `min > max` on some axis.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),
    /// No dominant plane could be fitted. Recoverable: the frame keeps its ground points.
    #[error("Plane not found: {0}")]
    PlaneNotFound(String),
    /// Registration did not converge or hit a degenerate system. Recoverable per frame.
    #[error("Registration diverged: {0}")]
    RegistrationDiverged(String),
    /// The accumulated pose would become non-finite. Fatal for the frame.
    #[error("Pose corruption: {0}")]
    PoseCorruption(String),
    /// Parameters could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }

    pub fn invalid_bounds<T: ToString>(msg: T) -> Self {
        Error::InvalidBounds(msg.to_string())
    }

    /// Whether the session may continue with the next frame after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PlaneNotFound(_) | Error::RegistrationDiverged(_) | Error::PoseCorruption(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::PlaneNotFound("few points".into()).is_recoverable());
        assert!(Error::RegistrationDiverged("singular".into()).is_recoverable());
        assert!(!Error::invalid_parameter("voxel size").is_recoverable());
        assert!(!Error::invalid_bounds("x").is_recoverable());
        assert!(!Error::Config("missing file".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::invalid_parameter("voxel size must be positive");
        assert_eq!(err.to_string(), "Parameter error: voxel size must be positive");
    }
}
