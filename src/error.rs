//! Custom error types for rdsup.

use thiserror::Error;

/// Errors that can occur during RDS upgrade operations.
#[derive(Error, Debug)]
pub enum UpgraderError {
    #[error("[{0}] {1}")]
    AwsSdk(String, String),

    #[error("[{0}] AWS credentials error: {1}")]
    AwsCredentials(String, String),

    #[error("DB instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Invalid instance selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid tag filter: {0}")]
    InvalidTagFilter(String),

    #[error("DB instance {instance_id} can not become available (status: {status})")]
    InstanceUnavailable { instance_id: String, status: String },

    #[error("Timeout waiting for {operation}: {details}")]
    Timeout { operation: String, details: String },

    #[error("Upgrade path for {engine} revisits or exceeds the hop limit at {version}")]
    UpgradePathLoop { engine: String, version: String },
}

impl UpgraderError {
    /// Create an AWS SDK error from any error type.
    /// Credential failures are split out so they can be reported separately.
    pub fn aws<E: std::fmt::Debug + std::fmt::Display>(component: &str, err: E) -> Self {
        let err_debug = format!("{err:?}");
        let err_display = err.to_string();
        let component = component.to_string();

        let combined_lower = format!("{err_display} {err_debug}").to_lowercase();

        if combined_lower.contains("no credentials")
            || combined_lower.contains("credentials not found")
            || combined_lower.contains("expiredtoken")
            || combined_lower.contains("expired token")
            || combined_lower.contains("the security token included in the request is")
            || combined_lower.contains("invalidclienttokenid")
            || combined_lower.contains("signaturedoesnotmatch")
            || combined_lower.contains("accessdenied")
            || combined_lower.contains("access denied")
            || combined_lower.contains("not authorized")
        {
            return Self::AwsCredentials(
                component,
                Self::extract_error_details(&err_debug, &err_display),
            );
        }

        Self::AwsSdk(
            component,
            Self::extract_error_details(&err_debug, &err_display),
        )
    }

    /// Pull the service `message` out of an SDK error, falling back to its display form.
    fn extract_error_details(debug_str: &str, display_str: &str) -> String {
        // Pattern: message: Some("actual error message")
        if let Some(pos) = debug_str.find("message: Some(\"") {
            let start = pos + "message: Some(\"".len();
            let rest = &debug_str[start..];
            if let Some(end) = rest.find('"') {
                return rest[..end].to_string();
            }
        }

        if !display_str.to_lowercase().contains("service error") {
            return display_str.to_string();
        }

        "AWS API request failed".to_string()
    }
}
