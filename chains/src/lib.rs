//! Pure, deterministic building blocks for DVN admin payloads: encoding a config change as call
//! data for each chain family, hashing it into the digest the DVN contract verifies, turning
//! custody signatures into recoverable ones and packing a quorum of them for submission.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod evm;
pub mod hash;
pub mod move_based;
pub mod quorum;
pub mod registry;
pub mod signature;
pub mod sol;

pub use quorum::{assemble, AssemblyError, QuorumPayload};
pub use registry::{ChainRegistry, RegistryError};
pub use signature::{RecoveryError, Signature, SigningMode};

pub type Digest = hash::Hash;
pub type VerifierId = u32;

/// Milliseconds since the Unix epoch after which the payload is rejected on-chain.
pub type Expiration = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
	Evm,
	Solana,
	MoveBased,
}

impl ChainFamily {
	pub fn signing_mode(&self) -> SigningMode {
		match self {
			ChainFamily::Evm => SigningMode::PersonalMessage,
			ChainFamily::Solana | ChainFamily::MoveBased => SigningMode::RawDigest,
		}
	}
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	#[default]
	Mainnet,
	Testnet,
}

impl Environment {
	pub fn as_str(&self) -> &'static str {
		match self {
			Environment::Mainnet => "mainnet",
			Environment::Testnet => "testnet",
		}
	}
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Environment {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"mainnet" => Ok(Environment::Mainnet),
			"testnet" => Ok(Environment::Testnet),
			other => Err(format!("Unknown environment '{other}', expected mainnet or testnet")),
		}
	}
}

/// The admin change a payload authorises.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
	SetQuorum { new_quorum: u64 },
	/// `signer` is an EVM address for EVM targets and a 64-byte uncompressed secp256k1 key
	/// (without the format byte) for Solana targets.
	SetSigner { signer: Vec<u8>, active: bool },
}

/// A DVN deployment resolved to everything its family needs for encoding and hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DvnTarget {
	Evm { address: evm::EvmAddress },
	Solana(sol::SolanaTarget),
	MoveBased { address: Vec<u8> },
}

impl DvnTarget {
	pub fn family(&self) -> ChainFamily {
		match self {
			DvnTarget::Evm { .. } => ChainFamily::Evm,
			DvnTarget::Solana(_) => ChainFamily::Solana,
			DvnTarget::MoveBased { .. } => ChainFamily::MoveBased,
		}
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
	#[error("{family:?} signers must be {expected} bytes, got {actual}")]
	InvalidSignerLength { family: ChainFamily, expected: usize, actual: usize },
	#[error("Quorum {0} does not fit the target's quorum type")]
	QuorumOverflow(u64),
	#[error("Expiration {0} does not fit the target's timestamp type")]
	ExpirationOverflow(Expiration),
	#[error("Signer {0} is not in the current signer set")]
	SignerNotFound(String),
	#[error("Signer {0} is already in the current signer set")]
	SignerAlreadyPresent(String),
	#[error("Failed to serialize call arguments: {0}")]
	Serialization(String),
}

/// Encodes `action` as call data for `target`'s chain family.
pub fn encode_call(action: &Action, target: &DvnTarget) -> Result<Vec<u8>, EncodingError> {
	match target {
		DvnTarget::Evm { .. } => evm::encode_call(action),
		DvnTarget::Solana(target) => target.encode_call(action),
		DvnTarget::MoveBased { .. } => move_based::encode_call(action),
	}
}

/// The digest the target's DVN contract recomputes before checking signatures.
pub fn build_digest(
	target: &DvnTarget,
	vid: VerifierId,
	expiration: Expiration,
	call_data: &[u8],
) -> Result<Digest, EncodingError> {
	match target {
		DvnTarget::Evm { address } => Ok(evm::digest(vid, address, expiration, call_data)),
		DvnTarget::Solana(target) => target.digest(vid, expiration, call_data),
		DvnTarget::MoveBased { .. } => Ok(move_based::digest(vid, expiration, call_data)),
	}
}
