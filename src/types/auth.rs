use oauth2::RefreshToken;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Optional overrides for the password / refresh-token flow.
///
/// When `refresh_token` is set the refresh grant is used and the
/// email/password fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct SignInParams {
    pub email: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<RefreshToken>,
}

impl SignInParams {
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            refresh_token: None,
        }
    }

    pub fn refresh(refresh_token: RefreshToken) -> Self {
        Self {
            refresh_token: Some(refresh_token),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PasswordSignInBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshTokenBody<'a> {
    pub refresh_token: &'a str,
    pub grant_type: &'static str,
}

/// Response of both identity endpoints.
///
/// Sign-in answers in camelCase, the token endpoint in snake_case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInResponse {
    #[serde(default, rename = "idToken", alias = "id_token")]
    pub id_token: Option<String>,
    #[serde(
        default,
        rename = "expiresIn",
        alias = "expires_in",
        deserialize_with = "seconds_from_string_or_number"
    )]
    pub expires_in: Option<u64>,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl SignInResponse {
    /// Non-empty bearer token, if the endpoint issued one.
    pub fn token(&self) -> Option<&str> {
        self.id_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn refresh_descriptor(&self) -> Option<RefreshDescriptor> {
        let expires_in = self.expires_in?;
        let refresh_token = self.refresh_token.as_ref()?;
        Some(RefreshDescriptor {
            expires_in,
            refresh_token: RefreshToken::new(refresh_token.clone()),
        })
    }

    /// Human-readable rejection reason from the `error` envelope.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("response carried no idToken")
            .to_string()
    }
}

/// Token lifetime plus the grant needed to renew it. Never persisted.
#[derive(Debug, Clone)]
pub struct RefreshDescriptor {
    pub expires_in: u64,
    pub refresh_token: RefreshToken,
}

/// Result of one sign-in or refresh round-trip.
#[derive(Debug, Clone, Default)]
pub struct SignInOutcome {
    pub id_token: Option<String>,
    pub refresh: Option<RefreshDescriptor>,
}

fn seconds_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
