//! Access to the signing keys. Keys are held by an external custody service and referenced by
//! opaque ids; the service only ever hands out public keys and raw DER signatures.

pub mod gcp_kms;
pub mod local;

use core::fmt;

use async_trait::async_trait;
use secp256k1::PublicKey;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub String);

impl fmt::Display for KeyId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Error, Debug)]
pub enum CustodyError {
	#[error("Request for key {key} failed: {source}")]
	Transport {
		key: KeyId,
		#[source]
		source: reqwest::Error,
	},
	#[error("Custody service returned {status} for key {key}: {body}")]
	Status { key: KeyId, status: reqwest::StatusCode, body: String },
	#[error("Unexpected response for key {key}: {reason}")]
	InvalidResponse { key: KeyId, reason: String },
	#[error("Unknown key {0}")]
	UnknownKey(KeyId),
}

// We use a trait so we can inject a mock in the tests
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyCustody: Send + Sync {
	/// The keys to sign with, in configuration order.
	fn keys(&self) -> Vec<KeyId>;

	async fn get_public_key(&self, key: &KeyId) -> Result<PublicKey, CustodyError>;

	/// Signs the 32-byte `prehash` as is and returns the DER encoded `(r, s)`.
	async fn asymmetric_sign(
		&self,
		key: &KeyId,
		prehash: &[u8; 32],
	) -> Result<Vec<u8>, CustodyError>;
}
