use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use tracing::debug;

use super::{CustodyError, KeyCustody, KeyId};

/// Keys held in process, loaded from hex files. Intended for testnets and dry runs.
pub struct LocalKeys {
	keys: Vec<(KeyId, SecretKey)>,
}

impl LocalKeys {
	pub fn new(keys: Vec<(KeyId, SecretKey)>) -> Self {
		Self { keys }
	}

	/// Each file holds one hex encoded secp256k1 secret key. The file path is the key id.
	pub fn from_files(files: &[PathBuf]) -> anyhow::Result<Self> {
		let keys = files
			.iter()
			.map(|file| {
				let secret_key = utilities::read_clean_and_decode_hex_str_file(
					file,
					"Local signing key",
					|str| {
						SecretKey::from_slice(&hex::decode(str)?)
							.map_err(anyhow::Error::new)
							.context("Not a valid secp256k1 secret key")
					},
				)?;
				Ok((KeyId(file.display().to_string()), secret_key))
			})
			.collect::<anyhow::Result<Vec<_>>>()?;
		debug!("Loaded {} local signing keys", keys.len());
		Ok(Self::new(keys))
	}

	fn secret_key(&self, key: &KeyId) -> Result<&SecretKey, CustodyError> {
		self.keys
			.iter()
			.find_map(|(id, secret_key)| (id == key).then_some(secret_key))
			.ok_or_else(|| CustodyError::UnknownKey(key.clone()))
	}
}

#[async_trait]
impl KeyCustody for LocalKeys {
	fn keys(&self) -> Vec<KeyId> {
		self.keys.iter().map(|(id, _)| id.clone()).collect()
	}

	async fn get_public_key(&self, key: &KeyId) -> Result<PublicKey, CustodyError> {
		Ok(PublicKey::from_secret_key(SECP256K1, self.secret_key(key)?))
	}

	async fn asymmetric_sign(
		&self,
		key: &KeyId,
		prehash: &[u8; 32],
	) -> Result<Vec<u8>, CustodyError> {
		Ok(SECP256K1
			.sign_ecdsa(&Message::from_digest(*prehash), self.secret_key(key)?)
			.serialize_der()
			.to_vec())
	}
}
