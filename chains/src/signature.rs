//! Turns the DER signatures a key custody service returns into the 65-byte recoverable form DVN
//! contracts verify.
//!
//! Custody services sign a 32-byte prehash and return `(r, s)` only. The recovery id is found by
//! recovering the public key for each candidate id and comparing it with the key's known public
//! key.

use secp256k1::{
	ecdsa::{self, RecoverableSignature, RecoveryId},
	Message, PublicKey, SECP256K1,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
	evm::{self, EvmAddress},
	hash::keccak256,
	Digest,
};

pub const SIGNATURE_LEN: usize = 65;

const ETHEREUM_V_OFFSET: u8 = 27;

/// What the custody key actually signs for a given digest, and how `v` is encoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SigningMode {
	/// EIP-191 personal message over the digest, `v = 27 + recovery id`.
	PersonalMessage,
	/// The digest itself, `v = recovery id`.
	RawDigest,
}

impl SigningMode {
	pub fn prehash(&self, digest: &Digest) -> Digest {
		match self {
			SigningMode::PersonalMessage => evm::eip191_hash(digest),
			SigningMode::RawDigest => *digest,
		}
	}

	fn v_offset(&self) -> u8 {
		match self {
			SigningMode::PersonalMessage => ETHEREUM_V_OFFSET,
			SigningMode::RawDigest => 0,
		}
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
	#[error("None of the candidate recovery ids reproduce the signer's public key")]
	RecoveryIdNotFound,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
	#[serde(with = "utilities::serde_helpers::hex_prefixed")]
	pub signature: [u8; SIGNATURE_LEN],
	#[serde(
		serialize_with = "evm::serialize_checksummed",
		deserialize_with = "utilities::serde_helpers::hex_prefixed::deserialize"
	)]
	pub address: EvmAddress,
}

/// `keccak256(uncompressed_key[1..])[12..]`
pub fn evm_address(public_key: &PublicKey) -> EvmAddress {
	let hash = keccak256(&public_key.serialize_uncompressed()[1..]);
	let mut address = [0u8; 20];
	address.copy_from_slice(&hash[12..]);
	address
}

/// Parses a DER signature and moves `s` into the lower half of the curve order.
pub fn parse_der_low_s(der: &[u8]) -> Result<ecdsa::Signature, RecoveryError> {
	let mut signature = ecdsa::Signature::from_der(der)
		.map_err(|e| RecoveryError::MalformedSignature(e.to_string()))?;
	signature.normalize_s();
	Ok(signature)
}

/// Finds the recovery id for which `(prehash, r, s, id)` recovers `public_key`.
pub fn find_recovery_id(
	prehash: &Digest,
	signature: &ecdsa::Signature,
	public_key: &PublicKey,
) -> Result<RecoveryId, RecoveryError> {
	let message = Message::from_digest(*prehash);
	let compact = signature.serialize_compact();
	let expected = public_key.serialize_uncompressed();

	for i in 0..4 {
		let recovery_id = RecoveryId::from_i32(i)
			.map_err(|e| RecoveryError::MalformedSignature(e.to_string()))?;
		let Ok(recoverable) = RecoverableSignature::from_compact(&compact, recovery_id) else {
			continue
		};
		if let Ok(recovered) = SECP256K1.recover_ecdsa(&message, &recoverable) {
			if recovered.serialize_uncompressed()[1..] == expected[1..] {
				return Ok(recovery_id)
			}
		}
	}

	Err(RecoveryError::RecoveryIdNotFound)
}

/// Builds the `r ‖ s ‖ v` signature for `digest` from a custody DER signature made by the key
/// with `public_key`.
pub fn signature_from_der(
	der: &[u8],
	digest: &Digest,
	public_key: &PublicKey,
	mode: SigningMode,
) -> Result<Signature, RecoveryError> {
	let prehash = mode.prehash(digest);
	let signature = parse_der_low_s(der)?;
	let recovery_id = find_recovery_id(&prehash, &signature, public_key)?;

	let mut bytes = [0u8; SIGNATURE_LEN];
	bytes[..64].copy_from_slice(&signature.serialize_compact());
	bytes[64] = mode.v_offset() + recovery_id.to_i32() as u8;

	Ok(Signature { signature: bytes, address: evm_address(public_key) })
}

/// Recovers the signer address from a 65-byte signature produced by [signature_from_der].
pub fn recover_address(
	signature: &[u8; SIGNATURE_LEN],
	digest: &Digest,
	mode: SigningMode,
) -> Result<EvmAddress, RecoveryError> {
	let v = signature[64]
		.checked_sub(mode.v_offset())
		.ok_or_else(|| RecoveryError::MalformedSignature(format!("Invalid v {}", signature[64])))?;
	let recovery_id = RecoveryId::from_i32(v as i32)
		.map_err(|e| RecoveryError::MalformedSignature(e.to_string()))?;
	let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
		.map_err(|e| RecoveryError::MalformedSignature(e.to_string()))?;
	let public_key = SECP256K1
		.recover_ecdsa(&Message::from_digest(mode.prehash(digest)), &recoverable)
		.map_err(|e| RecoveryError::MalformedSignature(e.to_string()))?;
	Ok(evm_address(&public_key))
}


#[cfg(test)]
mod tests {
	use super::{test_keys::*, *};
	use hex_literal::hex;
	use proptest::prelude::*;
	use secp256k1::SecretKey;
	use utilities::{assert_err, assert_ok};

	const CURVE_ORDER: [u8; 32] =
		hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");

	fn negate_s(compact: [u8; 64]) -> [u8; 64] {
		let mut result = compact;
		let mut borrow = 0i16;
		for i in (0..32).rev() {
			let diff = CURVE_ORDER[i] as i16 - compact[32 + i] as i16 - borrow;
			borrow = if diff < 0 { 1 } else { 0 };
			result[32 + i] = diff.rem_euclid(256) as u8;
		}
		result
	}

	fn high_s_der(low_s: &ecdsa::Signature) -> Vec<u8> {
		let high = assert_ok!(ecdsa::Signature::from_compact(&negate_s(low_s.serialize_compact())));
		high.serialize_der().to_vec()
	}

	#[test]
	fn address_from_public_key() {
		let public_key = assert_ok!(PublicKey::from_slice(&hex!(
			"034ac1bb1bc5fd7a9b173f6a136a40e4be64841c77d7f66ead444e101e01348127"
		)));
		assert_eq!(evm_address(&public_key), hex!("70e7db0678460c5e53f1ffc9221d1c692111dcc5"));
	}

	fn matching_recovery_ids(
		prehash: &Digest,
		signature: &ecdsa::Signature,
		public_key: &PublicKey,
	) -> Vec<i32> {
		let message = Message::from_digest(*prehash);
		(0..4)
			.filter(|i| {
				let recovery_id = RecoveryId::from_i32(*i).unwrap();
				RecoverableSignature::from_compact(&signature.serialize_compact(), recovery_id)
					.ok()
					.and_then(|recoverable| SECP256K1.recover_ecdsa(&message, &recoverable).ok())
					.is_some_and(|recovered| recovered == *public_key)
			})
			.collect()
	}

	#[test]
	fn wrong_public_key_is_not_recovered() {
		let digest = keccak256(b"payload");
		let signature = assert_ok!(parse_der_low_s(&custody_sign(1, &digest)));
		assert_eq!(
			find_recovery_id(&digest, &signature, &public_key(2)),
			Err(RecoveryError::RecoveryIdNotFound)
		);
	}

	#[test]
	fn malformed_der_is_rejected() {
		assert!(matches!(
			assert_err!(signature_from_der(
				&[0x30, 0x01],
				&[0; 32],
				&public_key(1),
				SigningMode::RawDigest
			)),
			RecoveryError::MalformedSignature(_)
		));
	}

	#[test]
	fn raw_digest_signatures_recover_to_the_signer() {
		let digest = keccak256(b"solana digest");
		let signature = assert_ok!(signature_from_der(
			&custody_sign(3, &digest),
			&digest,
			&public_key(3),
			SigningMode::RawDigest
		));
		assert!(signature.signature[64] < 4);
		assert_eq!(signature.address, evm_address(&public_key(3)));
		assert_eq!(
			assert_ok!(recover_address(&signature.signature, &digest, SigningMode::RawDigest)),
			signature.address
		);
	}

	#[test]
	fn personal_message_signatures_recover_via_eip191() {
		let digest = keccak256(b"evm digest");
		let prehash = evm::eip191_hash(&digest);
		let signature = assert_ok!(signature_from_der(
			&custody_sign(4, &prehash),
			&digest,
			&public_key(4),
			SigningMode::PersonalMessage
		));
		assert!(matches!(signature.signature[64], 27 | 28));
		assert_eq!(
			assert_ok!(recover_address(&signature.signature, &digest, SigningMode::PersonalMessage)),
			evm_address(&public_key(4))
		);
	}

	#[test]
	fn high_s_signatures_are_normalized() {
		let digest = keccak256(b"high s");
		let der = custody_sign(5, &digest);
		let low = assert_ok!(parse_der_low_s(&der));
		let high = high_s_der(&low);
		assert_ne!(high, der);

		let from_low =
			assert_ok!(signature_from_der(&der, &digest, &public_key(5), SigningMode::RawDigest));
		let from_high =
			assert_ok!(signature_from_der(&high, &digest, &public_key(5), SigningMode::RawDigest));
		assert_eq!(from_low, from_high);
	}

	#[test]
	fn serializes_as_hex_with_checksummed_address() {
		let digest = keccak256(b"json");
		let signature = assert_ok!(signature_from_der(
			&custody_sign(6, &digest),
			&digest,
			&public_key(6),
			SigningMode::RawDigest
		));
		let json = serde_json::to_value(signature).unwrap();
		assert_eq!(json["signature"], utilities::bytes_to_hex_prefixed(signature.signature));
		assert_eq!(json["address"], evm::to_checksum_address(&signature.address));
		assert_eq!(serde_json::from_value::<Signature>(json).unwrap(), signature);
	}

	proptest! {
		#[test]
		fn exactly_one_recovery_id_matches(
			seed in any::<[u8; 32]>(),
			digest in any::<[u8; 32]>(),
		) {
			let secret_key = SecretKey::from_slice(&seed);
			prop_assume!(secret_key.is_ok());
			let secret_key = secret_key.unwrap();
			let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
			let der = SECP256K1
				.sign_ecdsa(&Message::from_digest(digest), &secret_key)
				.serialize_der()
				.to_vec();

			let low = parse_der_low_s(&der).unwrap();
			let low_ids = matching_recovery_ids(&digest, &low, &public_key);
			prop_assert_eq!(low_ids.len(), 1);
			prop_assert_eq!(
				find_recovery_id(&digest, &low, &public_key).unwrap().to_i32(),
				low_ids[0]
			);

			// Negating s mirrors R, so the un-normalized signature matches the other parity
			let high_der = high_s_der(&low);
			let high = ecdsa::Signature::from_der(&high_der).unwrap();
			let high_ids = matching_recovery_ids(&digest, &high, &public_key);
			prop_assert_eq!(high_ids.len(), 1);
			prop_assert_eq!(high_ids[0], low_ids[0] ^ 1);

			for der in [der, high_der] {
				let signature =
					signature_from_der(&der, &digest, &public_key, SigningMode::RawDigest).unwrap();
				prop_assert_eq!(i32::from(signature.signature[64]), low_ids[0]);
				prop_assert_eq!(
					recover_address(&signature.signature, &digest, SigningMode::RawDigest).unwrap(),
					evm_address(&public_key)
				);
			}
		}

		#[test]
		fn low_s_normalization_is_idempotent(
			seed in any::<[u8; 32]>(),
			digest in any::<[u8; 32]>(),
		) {
			let secret_key = SecretKey::from_slice(&seed);
			prop_assume!(secret_key.is_ok());
			let secret_key = secret_key.unwrap();
			let der = SECP256K1
				.sign_ecdsa(&Message::from_digest(digest), &secret_key)
				.serialize_der()
				.to_vec();

			let once = parse_der_low_s(&der).unwrap();
			let twice = parse_der_low_s(&once.serialize_der()).unwrap();
			prop_assert_eq!(once, twice);
			prop_assert_eq!(parse_der_low_s(&high_s_der(&once)).unwrap(), once);
		}
	}
}
