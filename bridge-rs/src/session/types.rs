//! Session target and credential types

use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Authentication mechanism used for the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMechanism {
    Basic,
    Kerberos,
    Negotiate,
    CredSsp,
}

impl AuthMechanism {
    /// HTTP authorization scheme name
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Kerberos => "Kerberos",
            Self::Negotiate => "Negotiate",
            Self::CredSsp => "CredSSP",
        }
    }

    /// Parse mechanism from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "kerberos" => Some(Self::Kerberos),
            "negotiate" => Some(Self::Negotiate),
            "credssp" => Some(Self::CredSsp),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Credential handed over by the external authentication step
///
/// The bridge only holds and forwards it; acquiring it is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    /// Username and password, for Basic
    Password { username: String, password: Secret },
    /// A pre-acquired token, for Kerberos, Negotiate and CredSSP
    Token(Secret),
}

impl Credential {
    pub fn password(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn token(token: impl Into<Secret>) -> Self {
        Self::Token(token.into())
    }

    /// The principal name, if the credential carries one
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Password { username, .. } => Some(username),
            Self::Token(_) => None,
        }
    }
}

/// The management target a session connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Endpoint URI
    pub endpoint: Url,
    /// Configuration scope on the endpoint, e.g. `Microsoft.Exchange`
    pub configuration_scope: String,
    pub auth_mechanism: AuthMechanism,
}

impl Target {
    pub fn new(endpoint: Url, configuration_scope: impl Into<String>, auth_mechanism: AuthMechanism) -> Self {
        Self {
            endpoint,
            configuration_scope: configuration_scope.into(),
            auth_mechanism,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] via {}",
            self.endpoint, self.configuration_scope, self.auth_mechanism
        )
    }
}
