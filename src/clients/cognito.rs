use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

use crate::config::CognitoConfig;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, thiserror::Error)]
pub enum CognitoError {
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Cognito request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected Cognito response: {0}")]
    Protocol(String),
}

impl CognitoError {
    /// Short exception name, e.g. `UsernameExistsException`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpOutput {
    #[serde(rename = "UserSub")]
    pub user_sub: String,
    #[serde(rename = "UserConfirmed", default)]
    pub user_confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    pub access_token: String,
    #[serde(rename = "RefreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct InitiateAuthOutput {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
    #[serde(rename = "ChallengeName")]
    challenge_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserOutput {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "UserAttributes", default)]
    pub user_attributes: Vec<AttributeType>,
}

impl GetUserOutput {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.user_attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// `SECRET_HASH` for app clients that carry a secret:
/// base64(HMAC-SHA256(client_secret, username + client_id)).
#[must_use]
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    // new_from_slice accepts any key length for SHA256
    let Ok(mut mac) = <Hmac<Sha256>>::new_from_slice(client_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[derive(Clone)]
pub struct CognitoClient {
    client: Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl CognitoClient {
    pub fn new(config: &CognitoConfig) -> Result<Self, CognitoError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn secret_hash_for(&self, username: &str) -> Option<String> {
        if self.client_secret.is_empty() {
            None
        } else {
            Some(secret_hash(&self.client_secret, username, &self.client_id))
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        body: Value,
    ) -> Result<T, CognitoError> {
        debug!(operation, "Calling Cognito");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(decode_error(status, &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| CognitoError::Protocol(format!("{operation}: {e}")))
    }

    /// Register `email` as the username with a `name` attribute.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignUpOutput, CognitoError> {
        let mut body = json!({
            "ClientId": self.client_id,
            "Username": email,
            "Password": password,
            "UserAttributes": [
                { "Name": "email", "Value": email },
                { "Name": "name", "Value": display_name },
            ],
        });
        if let Some(hash) = self.secret_hash_for(email) {
            body["SecretHash"] = Value::String(hash);
        }

        self.call("SignUp", body).await
    }

    pub async fn initiate_auth(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticationResult, CognitoError> {
        let mut params = json!({
            "USERNAME": email,
            "PASSWORD": password,
        });
        if let Some(hash) = self.secret_hash_for(email) {
            params["SECRET_HASH"] = Value::String(hash);
        }

        let body = json!({
            "ClientId": self.client_id,
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": params,
        });

        let output: InitiateAuthOutput = self.call("InitiateAuth", body).await?;
        unwrap_auth_result(output)
    }

    /// `username` must be the value the secret hash was registered with.
    pub async fn refresh_auth(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<AuthenticationResult, CognitoError> {
        let mut params = json!({ "REFRESH_TOKEN": refresh_token });
        if let Some(hash) = self.secret_hash_for(username) {
            params["SECRET_HASH"] = Value::String(hash);
        }

        let body = json!({
            "ClientId": self.client_id,
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": params,
        });

        let output: InitiateAuthOutput = self.call("InitiateAuth", body).await?;
        unwrap_auth_result(output)
    }

    pub async fn get_user(&self, access_token: &str) -> Result<GetUserOutput, CognitoError> {
        self.call("GetUser", json!({ "AccessToken": access_token }))
            .await
    }

    pub async fn global_sign_out(&self, access_token: &str) -> Result<(), CognitoError> {
        let _: Value = self
            .call("GlobalSignOut", json!({ "AccessToken": access_token }))
            .await?;
        Ok(())
    }
}

fn unwrap_auth_result(output: InitiateAuthOutput) -> Result<AuthenticationResult, CognitoError> {
    match (output.authentication_result, output.challenge_name) {
        (Some(result), _) => Ok(result),
        (None, Some(challenge)) => Err(CognitoError::Service {
            code: "ChallengeRequired".to_string(),
            message: format!("Additional challenge required: {challenge}"),
        }),
        (None, None) => Err(CognitoError::Protocol(
            "InitiateAuth returned no authentication result".to_string(),
        )),
    }
}

fn decode_error(status: reqwest::StatusCode, body: &[u8]) -> CognitoError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            kind: Some(kind), message,
        }) => {
            // `__type` may carry a namespace prefix: "aws.cognito#NotAuthorizedException"
            let code = kind.rsplit('#').next().unwrap_or(&kind).to_string();
            CognitoError::Service {
                code,
                message: message.unwrap_or_default(),
            }
        }
        _ => CognitoError::Protocol(format!(
            "HTTP {status}: {}",
            String::from_utf8_lossy(body)
        )),
    }
}
