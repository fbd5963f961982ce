use thiserror::Error;

/// Errors produced by LambdaGate.
///
/// The first six variants are the core taxonomy reported by the function
/// runtime and the route table. The rest cover the HTTP boundary, route
/// persistence and plain I/O. Every variant reaches clients as a server error
/// whose body carries [`LambdaError::kind`] and the display message.
#[derive(Error, Debug)]
pub enum LambdaError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Function source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Dependency provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Dependency directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Function execution failed: {0}")]
    FunctionExecutionFailed(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Invalid function: {0}")]
    InvalidFunction(String),

    #[error("Missing parameter '{key}' in request {origin}")]
    MissingParameter { origin: String, key: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Route persistence error: {0}")]
    Persistence(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl LambdaError {
    /// Stable name of the variant, used as the `error` field of HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LambdaError::FunctionNotFound(_) => "FunctionNotFound",
            LambdaError::SourceUnavailable(_) => "SourceUnavailable",
            LambdaError::ProvisioningFailed(_) => "ProvisioningFailed",
            LambdaError::DirectoryUnavailable(_) => "DirectoryUnavailable",
            LambdaError::FunctionExecutionFailed(_) => "FunctionExecutionFailed",
            LambdaError::RouteNotFound(_) => "RouteNotFound",
            LambdaError::InvalidFunction(_) => "InvalidFunction",
            LambdaError::MissingParameter { .. } => "MissingParameter",
            LambdaError::InvalidRequest(_) => "InvalidRequest",
            LambdaError::Persistence(_) => "Persistence",
            LambdaError::Transport(_) => "Transport",
            LambdaError::Io(_) => "Io",
            LambdaError::JsonSerialization(_) => "JsonSerialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, LambdaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(LambdaError::FunctionNotFound("x".into()).kind(), "FunctionNotFound");
        assert_eq!(LambdaError::RouteNotFound("x".into()).kind(), "RouteNotFound");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(LambdaError::from(io).kind(), "Io");
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = LambdaError::MissingParameter {
            origin: "query".into(),
            key: "page".into(),
        };
        assert_eq!(err.to_string(), "Missing parameter 'page' in request query");
    }
}
