//! Google Cloud KMS over its REST API. Keys must be `EC_SIGN_SECP256K1_SHA256` key versions.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, RequestBuilder};
use secp256k1::PublicKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{CustodyError, KeyCustody, KeyId};
use crate::constants::HTTP_REQUEST_TIMEOUT;

/// DER `SubjectPublicKeyInfo` header for an uncompressed secp256k1 point.
const SECP256K1_SPKI_PREFIX: [u8; 23] = [
	0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05, 0x2b,
	0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpKmsKey {
	pub project_id: String,
	pub location_id: String,
	pub key_ring_id: String,
	pub key_id: String,
	pub key_version: String,
}

impl GcpKmsKey {
	pub fn resource_name(&self) -> String {
		format!(
			"projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}/cryptoKeyVersions/{}",
			self.project_id, self.location_id, self.key_ring_id, self.key_id, self.key_version
		)
	}
}

#[derive(Deserialize)]
struct PublicKeyResponse {
	pem: String,
}

#[derive(Deserialize)]
struct AsymmetricSignResponse {
	signature: String,
}

pub struct GcpKmsClient {
	// Internally the Client is Arc'd
	client: Client,
	endpoint: String,
	access_token: String,
	keys: Vec<KeyId>,
}

impl GcpKmsClient {
	pub fn new(endpoint: &str, access_token: String, keys: &[GcpKmsKey]) -> anyhow::Result<Self> {
		Ok(Self {
			client: Client::builder().timeout(HTTP_REQUEST_TIMEOUT).build()?,
			endpoint: endpoint.trim_end_matches('/').to_string(),
			access_token,
			keys: keys.iter().map(|key| KeyId(key.resource_name())).collect(),
		})
	}

	/// Reads the OAuth2 bearer token from `access_token_file`.
	pub fn from_token_file(
		endpoint: &str,
		access_token_file: &Path,
		keys: &[GcpKmsKey],
	) -> anyhow::Result<Self> {
		let access_token = std::fs::read_to_string(access_token_file)
			.with_context(|| {
				format!("Failed to read KMS access token file at {}", access_token_file.display())
			})?
			.trim()
			.to_string();
		Self::new(endpoint, access_token, keys)
	}

	fn url(&self, key: &KeyId, method: &str) -> String {
		format!("{}/v1/{}{}", self.endpoint, key, method)
	}

	async fn send<T: DeserializeOwned>(
		&self,
		key: &KeyId,
		request: RequestBuilder,
	) -> Result<T, CustodyError> {
		let response = request
			.bearer_auth(&self.access_token)
			.send()
			.await
			.map_err(|source| CustodyError::Transport { key: key.clone(), source })?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(CustodyError::Status { key: key.clone(), status, body })
		}

		response
			.json::<T>()
			.await
			.map_err(|source| CustodyError::Transport { key: key.clone(), source })
	}
}

pub fn public_key_from_pem(pem: &str) -> Result<PublicKey, String> {
	let body: String = pem
		.lines()
		.map(str::trim)
		.filter(|line| !line.starts_with("-----"))
		.collect();
	let der = BASE64.decode(body).map_err(|e| format!("Invalid PEM body: {e}"))?;
	let point = der
		.strip_prefix(&SECP256K1_SPKI_PREFIX[..])
		.ok_or_else(|| "Not an uncompressed secp256k1 public key".to_string())?;
	PublicKey::from_slice(point).map_err(|e| e.to_string())
}

fn asymmetric_sign_request(prehash: &[u8; 32]) -> serde_json::Value {
	// KMS treats the field as an opaque 32-byte digest; the hash function is not applied again.
	json!({ "digest": { "sha256": BASE64.encode(prehash) } })
}

#[async_trait]
impl KeyCustody for GcpKmsClient {
	fn keys(&self) -> Vec<KeyId> {
		self.keys.clone()
	}

	async fn get_public_key(&self, key: &KeyId) -> Result<PublicKey, CustodyError> {
		let response: PublicKeyResponse =
			self.send(key, self.client.get(self.url(key, "/publicKey"))).await?;
		debug!(key_id = %key, "Fetched public key");
		public_key_from_pem(&response.pem)
			.map_err(|reason| CustodyError::InvalidResponse { key: key.clone(), reason })
	}

	async fn asymmetric_sign(
		&self,
		key: &KeyId,
		prehash: &[u8; 32],
	) -> Result<Vec<u8>, CustodyError> {
		let response: AsymmetricSignResponse = self
			.send(
				key,
				self.client
					.post(self.url(key, ":asymmetricSign"))
					.json(&asymmetric_sign_request(prehash)),
			)
			.await?;
		BASE64.decode(response.signature).map_err(|e| CustodyError::InvalidResponse {
			key: key.clone(),
			reason: format!("Signature is not base64: {e}"),
		})
	}
}
