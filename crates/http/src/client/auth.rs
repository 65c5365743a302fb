//! Identity API client methods

use super::{ClientError, PortalClient};
use crate::types::{MessageResponse, RegistrationResponse};
use portal_core::{LoginPayload, RegistrationPayload, TokenGrant, UserRecord};
use reqwest::Method;
use serde_json::Value;

/// Fixed identity API routes, relative to the API base URL
pub mod routes {
    pub const LOGIN: &str = "auth/login";
    pub const REGISTER: &str = "auth/register";
    pub const LOGOUT: &str = "auth/logout";
    pub const REFRESH: &str = "auth/refresh";
    pub const USER: &str = "auth/user";
}

impl PortalClient {
    /// Exchange credentials for a token grant
    pub async fn login(&self, credentials: &LoginPayload) -> Result<TokenGrant, ClientError> {
        let request = self.request(Method::POST, routes::LOGIN).json(credentials);
        self.execute(request).await
    }

    /// Create an account. The captcha answer is never forwarded.
    pub async fn register(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<RegistrationResponse, ClientError> {
        let request = self
            .request(Method::POST, routes::REGISTER)
            .json(&payload.for_upstream());
        let response: Option<RegistrationResponse> = self.execute(request).await?;
        Ok(response.unwrap_or_default())
    }

    /// End the remote session identified by `token_id`
    pub async fn logout(&self, token_id: Option<&str>) -> Result<MessageResponse, ClientError> {
        let mut request = self.request(Method::POST, routes::LOGOUT);
        if let Some(token_id) = token_id {
            request = request.bearer_auth(token_id);
        }
        let response: Option<MessageResponse> = self.execute(request).await?;
        Ok(response.unwrap_or_default())
    }

    /// Mint a new access token from the `token_id` correlation token
    pub async fn refresh(&self, token_id: Option<&str>) -> Result<TokenGrant, ClientError> {
        let mut request = self.request(Method::POST, routes::REFRESH);
        if let Some(token_id) = token_id {
            request = request.bearer_auth(token_id);
        }
        self.execute(request).await
    }

    /// Fetch the identity behind `bearer`. Accepts `{user: …}` or a bare record.
    pub async fn current_user(&self, bearer: &str) -> Result<UserRecord, ClientError> {
        let request = self.request(Method::GET, routes::USER).bearer_auth(bearer);
        let body: Value = self.execute(request).await?;

        match body {
            Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) => {
                Ok(UserRecord::new(map.remove("user").unwrap_or_default()))
            }
            Value::Object(map) => Ok(UserRecord::new(Value::Object(map))),
            _ => Err(ClientError::MalformedResponse(
                "user endpoint returned a non-object body".into(),
            )),
        }
    }
}
