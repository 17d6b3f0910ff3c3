use crate::error::NexusError;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

pub const ENV_PREFIX: &str = "FIREBASE_";
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_TOKEN_PATH: &str = "./firebase_auth_token.json";
pub const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com";
pub const SECURETOKEN_BASE: &str = "https://securetoken.googleapis.com";
pub const FIRESTORE_BASE: &str = "https://firestore.googleapis.com";

const SIGN_IN_PATH: &str = "v1/accounts:signInWithPassword";
const REFRESH_PATH: &str = "v1/token";

/// Keys taken verbatim from the environment. `Env` would otherwise parse
/// `0042` as the integer 42.
const TEXT_KEYS: &[&str] = &[
    "token",
    "database",
    "project_id",
    "project_key",
    "auth_email",
    "auth_password",
    "helper_program",
    "helper_args",
    "loglevel",
];

/// How the binary obtains its first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Password,
    ServiceAccount,
}

/// Runtime configuration, read once at startup from `FIREBASE_*` variables.
///
/// Unset values fall back to empty strings: downstream URLs stay well-formed
/// and are simply rejected upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token: String,
    pub database: String,
    pub project_id: String,
    pub project_key: String,
    pub auth_email: String,
    pub auth_password: String,
    /// Test-only: fixed refresh delay in seconds, bypassing the reported lifetime.
    pub refresh_rate: Option<u64>,
    pub auth_mode: AuthMode,
    pub token_path: PathBuf,
    pub helper_program: String,
    pub helper_args: String,
    pub identity_base: Url,
    pub securetoken_base: Url,
    pub firestore_base: Url,
    pub proxy: Option<Url>,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            project_id: String::new(),
            project_key: String::new(),
            auth_email: String::new(),
            auth_password: String::new(),
            refresh_rate: None,
            auth_mode: AuthMode::default(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            helper_program: "gcloud".to_string(),
            helper_args: "auth application-default print-access-token".to_string(),
            identity_base: Url::parse(IDENTITY_BASE).expect("valid identity base url"),
            securetoken_base: Url::parse(SECURETOKEN_BASE).expect("valid securetoken base url"),
            firestore_base: Url::parse(FIRESTORE_BASE).expect("valid firestore base url"),
            proxy: None,
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `FIREBASE_*` environment variables.
    pub fn from_env() -> Result<Self, NexusError> {
        Ok(Self::figment().extract()?)
    }

    pub fn figment() -> Figment {
        let env = Env::prefixed(ENV_PREFIX);
        let text: BTreeMap<String, String> = env
            .clone()
            .only(TEXT_KEYS)
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect();

        Figment::from(Serialized::defaults(Config::default()))
            .merge(env.ignore(TEXT_KEYS))
            .merge(Serialized::defaults(text))
    }

    /// Report the first missing project value. Requests are still built without them.
    pub fn check_project(&self) -> Result<(), NexusError> {
        if self.project_id.is_empty() {
            return Err(NexusError::ConfigMissing("FIREBASE_PROJECT_ID"));
        }
        if self.project_key.is_empty() {
            return Err(NexusError::ConfigMissing("FIREBASE_PROJECT_KEY"));
        }
        Ok(())
    }

    pub fn helper_args(&self) -> Vec<String> {
        self.helper_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn sign_in_url(&self) -> Result<Url, NexusError> {
        keyed_url(&self.identity_base, SIGN_IN_PATH, &self.project_key)
    }

    pub fn refresh_url(&self) -> Result<Url, NexusError> {
        keyed_url(&self.securetoken_base, REFRESH_PATH, &self.project_key)
    }
}

fn keyed_url(base: &Url, path: &str, key: &str) -> Result<Url, NexusError> {
    let mut url = with_trailing_slash(base).join(path)?;
    url.query_pairs_mut().append_pair("key", key);
    Ok(url)
}

fn with_trailing_slash(base: &Url) -> Url {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
