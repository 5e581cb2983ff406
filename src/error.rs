use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// Returned bytes are too short (or otherwise unreadable) for the requested fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("call failed: {0}")]
    CallFailed(String),

    #[error("call timed out after {0}s")]
    Timeout(u64),

    /// A chain value does not fit the decimal type used for presentation.
    #[error("value overflow: {0}")]
    Overflow(String),

    #[error("All protocol data fetches failed")]
    AllProtocolsFailed { details: Vec<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MetricsError {
    /// HTTP-style status the boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            MetricsError::AllProtocolsFailed { .. } => 503,
            MetricsError::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// JSON body the boundary layer answers with.
    pub fn to_body(&self, timestamp: i64) -> serde_json::Value {
        match self {
            MetricsError::AllProtocolsFailed { details } => serde_json::json!({
                "error": self.to_string(),
                "details": details,
                "timestamp": timestamp,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_boundary_status() {
        let unavailable = MetricsError::AllProtocolsFailed {
            details: vec!["AAVE: call failed: boom".to_string()],
        };
        assert_eq!(unavailable.status_code(), 503);
        assert_eq!(
            MetricsError::InvalidInput("tvl".to_string()).status_code(),
            400
        );
        assert_eq!(MetricsError::Timeout(10).status_code(), 500);
        assert_eq!(unavailable.to_string(), "All protocol data fetches failed");

        let body = unavailable.to_body(1_700_000_000);
        assert_eq!(body["details"][0], "AAVE: call failed: boom");
        assert_eq!(body["timestamp"], 1_700_000_000);
        assert_eq!(
            MetricsError::InvalidInput("tvl".to_string()).to_body(0)["error"],
            "invalid input: tvl"
        );
    }
}
