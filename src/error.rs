//! Error types.
//!
//! - `FitError`: the two ways the knee fit itself can fail.
//! - `AppError`: the CLI boundary error, carrying a process exit code.
//!
//! Exit codes:
//! - `2`: bad input (paths, file shapes, CLI values)
//! - `3`: not enough valid measurements to fit
//! - `4`: numerical failure (non-convergence, singular covariance)

use thiserror::Error;

/// Failure modes of the knee model fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("insufficient data: {valid} valid measurement(s), at least {required} required")]
    InsufficientData { valid: usize, required: usize },

    #[error("fit did not converge: {0}")]
    NotConverged(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::InsufficientData { .. } => 3,
            FitError::NotConverged(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_distinct_exit_codes() {
        let insufficient: AppError = FitError::InsufficientData { valid: 2, required: 3 }.into();
        let diverged: AppError = FitError::NotConverged("damping exhausted".to_string()).into();

        assert_eq!(insufficient.exit_code(), 3);
        assert_eq!(diverged.exit_code(), 4);
        assert!(insufficient.message().contains("insufficient data"));
        assert!(diverged.message().contains("did not converge"));
    }
}
