//! Signed-in session state and the two-step (password, then TOTP) login flow.
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::types::Role;

/// Tokens handed out by `/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub role: Role,
}

/// Claims carried in the access token payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub sub_id: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Decode (without verifying) the JWT payload. `None` for malformed tokens.
    pub fn claims(&self) -> Option<Claims> {
        decode_claims(&self.access_token)
    }

    /// Id of the signed-in user, used to hide self-service admin actions.
    pub fn user_id(&self) -> Option<i64> {
        self.claims().and_then(|c| c.sub_id)
    }
}

pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Result of submitting credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(Session),
    /// Password accepted; the account needs a TOTP code.
    SecondFactorRequired,
}

/// Where the login form currently is.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoginFlow {
    #[default]
    Credentials,
    AwaitingCode { username: String, password: String },
}

/// What the login form submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub otp: Option<String>,
}

/// Credentials to send to the backend for the next attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
    pub otp: Option<String>,
}

impl LoginFlow {
    /// Merge a form submission with the flow state.
    ///
    /// While awaiting a code, the stored credentials are reused and only the code is taken
    /// from the form. A form that carries a username and password starts over.
    pub fn attempt(&self, form: LoginForm) -> Result<LoginAttempt, ClientError> {
        let otp = form.otp.filter(|c| !c.trim().is_empty()).map(|c| c.trim().to_string());
        let fresh = !form.username.is_empty() && !form.password.is_empty();
        match self {
            _ if fresh => Ok(LoginAttempt {
                username: form.username,
                password: form.password,
                otp,
            }),
            LoginFlow::Credentials => Err(ClientError::Validation("Username and password are required".into())),
            LoginFlow::AwaitingCode { username, password } => {
                let Some(code) = otp else {
                    return Err(ClientError::Validation("Please enter 2FA code".into()));
                };
                Ok(LoginAttempt {
                    username: username.clone(),
                    password: password.clone(),
                    otp: Some(code),
                })
            }
        }
    }

    /// Next state after the backend answered `attempt`.
    pub fn advance(&mut self, attempt: &LoginAttempt, outcome: &LoginOutcome) {
        *self = match outcome {
            LoginOutcome::SecondFactorRequired => LoginFlow::AwaitingCode {
                username: attempt.username.clone(),
                password: attempt.password.clone(),
            },
            LoginOutcome::Authenticated(_) => LoginFlow::Credentials,
        };
    }

    pub fn reset(&mut self) {
        *self = LoginFlow::Credentials;
    }
}

/// Password change form, validated before it reaches the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.old_password.is_empty() || self.new_password.is_empty() || self.confirm_password.is_empty() {
            return Err(ClientError::Validation("All fields are required".into()));
        }
        if self.new_password != self.confirm_password {
            return Err(ClientError::Validation("New passwords do not match".into()));
        }
        Ok(())
    }
}
