use crate::model::UserId;
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid or expired credential")]
    InvalidCredential,
}

/// Résout un jeton opaque en identifiant d'utilisateur.
pub trait IdentityResolver: Send + Sync {
    fn resolve_subject(&self, credential: &str) -> Result<UserId, IdentityError>;
}

/// Table statique jeton → utilisateur (fichier JSON `{"jeton": 12, ...}`).
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, UserId>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let tokens: HashMap<String, UserId> =
            serde_json::from_slice(&data).with_context(|| "parsing token table")?;
        Ok(Self { tokens })
    }

    pub fn insert<T: Into<String>>(&mut self, token: T, user: UserId) {
        self.tokens.insert(token.into(), user);
    }
}

impl IdentityResolver for TokenTable {
    fn resolve_subject(&self, credential: &str) -> Result<UserId, IdentityError> {
        let credential = credential.strip_prefix("Bearer ").unwrap_or(credential).trim();
        self.tokens
            .get(credential)
            .copied()
            .ok_or(IdentityError::InvalidCredential)
    }
}
