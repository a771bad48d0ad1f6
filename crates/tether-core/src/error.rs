use thiserror::Error;

#[derive(Debug, Error)]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl TetherError {
    /// Short error code string, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            TetherError::Config(_) => "CONFIG_ERROR",
            TetherError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
        }
    }
}

pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(TetherError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            TetherError::PayloadTooLarge { size: 2, max: 1 }.code(),
            "PAYLOAD_TOO_LARGE"
        );
        assert_eq!(
            TetherError::PayloadTooLarge { size: 2, max: 1 }.to_string(),
            "Payload too large: 2 bytes (max 1)"
        );
    }
}
