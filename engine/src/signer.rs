use dvn_chains::{
	evm::to_checksum_address,
	signature::{evm_address, signature_from_der},
	Digest, RecoveryError, Signature, SigningMode,
};
use futures::future::try_join_all;
use secp256k1::PublicKey;
use thiserror::Error;
use tracing::{debug, info};

use crate::custody::{CustodyError, KeyCustody, KeyId};

#[derive(Error, Debug)]
pub enum SignError {
	#[error(transparent)]
	Custody(#[from] CustodyError),
	#[error("Signature from key {key} is unusable: {source}")]
	Recovery {
		key: KeyId,
		#[source]
		source: RecoveryError,
	},
}

/// Signs digests with every custody key and turns the results into recoverable signatures.
pub struct SignerAdapter<C> {
	custody: C,
	keys: Vec<(KeyId, PublicKey)>,
}

impl<C: KeyCustody> SignerAdapter<C> {
	/// Looks up the public key of every custody key. Done once, before any digest is signed.
	pub async fn new(custody: C) -> Result<Self, SignError> {
		let keys = try_join_all(custody.keys().into_iter().map(|key| {
			let custody = &custody;
			async move {
				let public_key = custody.get_public_key(&key).await?;
				info!(
					key_id = %key,
					address = %to_checksum_address(&evm_address(&public_key)),
					"Resolved signing key"
				);
				Ok::<_, SignError>((key, public_key))
			}
		}))
		.await?;

		Ok(Self { custody, keys })
	}

	#[cfg(test)]
	fn signer_addresses(&self) -> Vec<dvn_chains::evm::EvmAddress> {
		self.keys.iter().map(|(_, public_key)| evm_address(public_key)).collect()
	}

	/// One signature per key, in key order. Fails on the first key that errors.
	pub async fn sign(
		&self,
		digest: &Digest,
		mode: SigningMode,
	) -> Result<Vec<Signature>, SignError> {
		let prehash = mode.prehash(digest);
		try_join_all(self.keys.iter().map(|(key, public_key)| async move {
			let der = self.custody.asymmetric_sign(key, &prehash).await?;
			let signature = signature_from_der(&der, digest, public_key, mode)
				.map_err(|source| SignError::Recovery { key: key.clone(), source })?;
			debug!(
				key_id = %key,
				address = %to_checksum_address(&signature.address),
				"Signed digest"
			);
			Ok(signature)
		}))
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::custody::{local::LocalKeys, MockKeyCustody};
	use dvn_chains::{hash::keccak256, signature::recover_address};
	use secp256k1::{Message, SecretKey, SECP256K1};
	use utilities::{assert_err, assert_ok};

	fn secret_key(seed: u8) -> SecretKey {
		SecretKey::from_slice(&[seed; 32]).unwrap()
	}

	fn local_keys(seeds: &[u8]) -> LocalKeys {
		LocalKeys::new(
			seeds.iter().map(|seed| (KeyId(format!("key-{seed}")), secret_key(*seed))).collect(),
		)
	}

	#[tokio::test]
	async fn signatures_recover_to_their_signers() {
		let adapter = assert_ok!(SignerAdapter::new(local_keys(&[1, 2, 3])).await);
		let digest = keccak256(b"digest");

		for mode in [SigningMode::PersonalMessage, SigningMode::RawDigest] {
			let signatures = assert_ok!(adapter.sign(&digest, mode).await);
			assert_eq!(signatures.len(), 3);
			assert_eq!(
				signatures.iter().map(|s| s.address).collect::<Vec<_>>(),
				adapter.signer_addresses()
			);
			for signature in signatures {
				assert_eq!(
					assert_ok!(recover_address(&signature.signature, &digest, mode)),
					signature.address
				);
			}
		}
	}

	#[tokio::test]
	async fn no_keys_no_signatures() {
		let adapter = assert_ok!(SignerAdapter::new(local_keys(&[])).await);
		assert!(assert_ok!(adapter.sign(&[0; 32], SigningMode::RawDigest).await).is_empty());
	}

	#[tokio::test]
	async fn mismatched_key_is_fatal() {
		let mut custody = MockKeyCustody::new();
		custody.expect_keys().returning(|| vec![KeyId("kms-key".to_string())]);
		custody
			.expect_get_public_key()
			.times(1)
			.returning(|_| Ok(PublicKey::from_secret_key(SECP256K1, &secret_key(1))));
		// Custody signs with a different key than the one it reports
		custody.expect_asymmetric_sign().returning(|_, prehash| {
			Ok(SECP256K1
				.sign_ecdsa(&Message::from_digest(*prehash), &secret_key(2))
				.serialize_der()
				.to_vec())
		});

		let adapter = assert_ok!(SignerAdapter::new(custody).await);
		assert!(matches!(
			assert_err!(adapter.sign(&[5; 32], SigningMode::RawDigest).await),
			SignError::Recovery { source: RecoveryError::RecoveryIdNotFound, .. }
		));
	}

	#[tokio::test]
	async fn custody_errors_propagate() {
		let mut custody = MockKeyCustody::new();
		custody.expect_keys().returning(|| vec![KeyId("a".to_string()), KeyId("b".to_string())]);
		custody
			.expect_get_public_key()
			.returning(|key| Err(CustodyError::UnknownKey(key.clone())));

		assert!(matches!(
			SignerAdapter::new(custody).await,
			Err(SignError::Custody(CustodyError::UnknownKey(_)))
		));
	}
}
