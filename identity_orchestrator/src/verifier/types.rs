use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub(super) fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    pub(super) fn joined(&self) -> String {
        match self {
            Self::Single(aud) => aud.clone(),
            Self::Multiple(auds) => auds.join(","),
        }
    }
}

/// Claims read from an OIDC ID token payload
#[derive(Debug, Clone, Deserialize)]
pub(super) struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Identity asserted by a verified ID token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedClaims {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub issuer: String,
}
