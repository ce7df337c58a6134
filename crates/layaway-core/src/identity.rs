use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("key bytes do not form a valid verifying key")]
    MalformedKey,
    #[error("signature does not verify against signer {signer}")]
    BadSignature { signer: PartyKey },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartyKey(#[serde(with = "hex::serde")] [u8; 32]);

impl PartyKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn verifying_key(&self) -> Result<VerifyingKey, IdentityError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| IdentityError::MalformedKey)
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..6]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub key: PartyKey,
}

impl Party {
    pub fn new(name: impl Into<String>, key: PartyKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.key)
    }
}

#[derive(Clone)]
pub struct PartyIdentity {
    name: String,
    signing_key: SigningKey,
}

impl PartyIdentity {
    pub fn generate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_signing_key(name: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            name: name.into(),
            signing_key,
        }
    }

    pub fn key(&self) -> PartyKey {
        PartyKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn party(&self) -> Party {
        Party {
            name: self.name.clone(),
            key: self.key(),
        }
    }

    pub fn sign(&self, message: &[u8]) -> PartySignature {
        PartySignature {
            signer: self.key(),
            signature: self.signing_key.sign(message).to_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySignature {
    pub signer: PartyKey,
    #[serde(with = "hex::serde")]
    pub signature: [u8; 64],
}

impl PartySignature {
    pub fn verify(&self, message: &[u8]) -> Result<(), IdentityError> {
        let key = self.signer.verifying_key()?;
        let signature = Signature::from_bytes(&self.signature);
        key.verify(message, &signature)
            .map_err(|_| IdentityError::BadSignature { signer: self.signer })
    }
}
