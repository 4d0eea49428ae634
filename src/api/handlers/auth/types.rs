//! Request/response types for auth endpoints.
//!
//! Wire field names are camelCase to match the frontend contract.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_uses_camel_case_fields() -> Result<()> {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": "hunter2hunter2",
            "firstName": "Alice",
        }))?;
        assert_eq!(request.first_name.as_deref(), Some("Alice"));
        assert_eq!(request.last_name, None);
        Ok(())
    }

    #[test]
    fn user_response_round_trips() -> Result<()> {
        let response = UserResponse {
            id: "00000000-0000-0000-0000-000000000000".to_string(),
            email: "bob@example.com".to_string(),
            first_name: None,
            last_name: Some("Builder".to_string()),
            is_verified: true,
        };
        let value = serde_json::to_value(&response)?;
        let verified = value
            .get("isVerified")
            .and_then(serde_json::Value::as_bool)
            .context("missing isVerified")?;
        assert!(verified);
        assert!(value.get("lastName").is_some());
        let decoded: UserResponse = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "bob@example.com");
        Ok(())
    }
}
