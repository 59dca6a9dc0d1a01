use crate::config::CredentialsConfig;
use crate::error::AuthError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

/// Identity reported for sessions opened with the emergency override secret.
pub const OVERRIDE_IDENTITY: &str = "emergency-override";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Secondary,
    EmergencyOverride,
}

#[derive(Clone)]
pub struct Credential {
    pub identity: String,
    secret_digest: [u8; 32],
    pub role: Role,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub identity: String,
    pub role: Role,
}

/// Why a verification failed. Only the event sink sees this; callers get
/// `AuthError::InvalidCredentials` either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownIdentity,
    WrongSecret,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::UnknownIdentity => write!(f, "unknown username"),
            Rejection::WrongSecret => write!(f, "wrong password"),
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Configured username/password pairs. Read-only after construction.
///
/// Both sides of every comparison are hashed to fixed-size digests first, so
/// the comparison touches the same number of bytes whatever the secret's
/// content or length, and every stored credential is checked on every call.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    users: Vec<Credential>,
    emergency: Option<Credential>,
}

impl CredentialStore {
    pub fn new(users: Vec<(String, String, Role)>, override_secret: Option<String>) -> Self {
        let users = users
            .into_iter()
            .map(|(identity, secret, role)| Credential {
                secret_digest: digest(&secret),
                identity,
                role,
            })
            .collect();
        let emergency = override_secret.map(|secret| Credential {
            identity: OVERRIDE_IDENTITY.to_string(),
            secret_digest: digest(&secret),
            role: Role::EmergencyOverride,
        });
        Self { users, emergency }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        let mut users = vec![(
            config.primary.username.clone(),
            config.primary.password.clone(),
            Role::Primary,
        )];
        if let Some(secondary) = &config.secondary {
            users.push((secondary.username.clone(), secondary.password.clone(), Role::Secondary));
        }
        Self::new(users, config.override_password.clone())
    }

    pub fn verify(&self, identity: &str, secret: &str) -> Result<Verified, AuthError> {
        self.check(identity, secret)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    /// Same as `verify`, but keeps the reason for a rejection.
    pub fn check(&self, identity: &str, secret: &str) -> Result<Verified, Rejection> {
        let identity_digest = digest(identity);
        let secret_digest = digest(secret);

        let mut found: Option<&Credential> = None;
        let mut known = Choice::from(0);
        for credential in &self.users {
            let same_identity = digest(&credential.identity)[..].ct_eq(&identity_digest[..]);
            let matched = credential.secret_digest[..].ct_eq(&secret_digest[..]) & same_identity;
            known |= same_identity;
            if bool::from(matched) && found.is_none() {
                found = Some(credential);
            }
        }

        let emergency = self.matches_override(&secret_digest);
        match found {
            Some(credential) => Ok(Verified {
                identity: credential.identity.clone(),
                role: credential.role,
            }),
            None if bool::from(emergency) => Ok(Verified {
                identity: OVERRIDE_IDENTITY.to_string(),
                role: Role::EmergencyOverride,
            }),
            None if bool::from(known) => Err(Rejection::WrongSecret),
            None => Err(Rejection::UnknownIdentity),
        }
    }

    /// Checks only the emergency override secret, ignoring any identity.
    pub fn verify_override(&self, secret: &str) -> Option<Verified> {
        if bool::from(self.matches_override(&digest(secret))) {
            Some(Verified {
                identity: OVERRIDE_IDENTITY.to_string(),
                role: Role::EmergencyOverride,
            })
        } else {
            None
        }
    }

    fn matches_override(&self, secret_digest: &[u8; 32]) -> Choice {
        match &self.emergency {
            Some(credential) => credential.secret_digest[..].ct_eq(&secret_digest[..]),
            None => Choice::from(0),
        }
    }

    pub fn has_override(&self) -> bool {
        self.emergency.is_some()
    }
}
