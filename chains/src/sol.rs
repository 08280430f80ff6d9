use core::{fmt, str::FromStr};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
	hash::keccak256, Action, ChainFamily, Digest, EncodingError, Expiration, VerifierId,
};

/// Length of a DVN signer entry: an uncompressed secp256k1 key without its `0x04` format byte.
pub const SIGNER_LEN: usize = 64;

pub type DvnSigner = [u8; SIGNER_LEN];

const MAX_BASE58_LEN: usize = 44;

#[derive(
	BorshSerialize,
	BorshDeserialize,
	Copy,
	Clone,
	Default,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Serialize,
	Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SolAddress(pub [u8; 32]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSolAddressError {
	#[error("Solana address has the wrong size")]
	WrongSize,
	#[error("Solana address is not valid base58")]
	Invalid,
}

impl From<[u8; 32]> for SolAddress {
	fn from(from: [u8; 32]) -> Self {
		Self(from)
	}
}

impl FromStr for SolAddress {
	type Err = ParseSolAddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() > MAX_BASE58_LEN {
			return Err(ParseSolAddressError::WrongSize)
		}
		let bytes = bs58::decode(s).into_vec().map_err(|_| ParseSolAddressError::Invalid)?;
		bytes.try_into().map(Self).map_err(|_| ParseSolAddressError::WrongSize)
	}
}

impl TryFrom<String> for SolAddress {
	type Error = ParseSolAddressError;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		s.parse()
	}
}

impl From<SolAddress> for String {
	fn from(address: SolAddress) -> Self {
		address.to_string()
	}
}

impl fmt::Display for SolAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", bs58::encode(self.0).into_string())
	}
}

impl fmt::Debug for SolAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SolAddress({self})")
	}
}

/// An Anchor instruction: its data is the 8-byte method discriminator followed by the borsh
/// encoded arguments.
pub trait ProgramInstruction: BorshSerialize {
	const CALL_NAME: &'static str;
	const FN_DISCRIMINATOR_HASH: [u8; 32] = sha2_const::Sha256::new()
		.update(b"global:")
		.update(Self::CALL_NAME.as_bytes())
		.finalize();

	fn function_discriminator() -> [u8; 8] {
		let mut discriminator = [0u8; 8];
		discriminator.copy_from_slice(&Self::FN_DISCRIMINATOR_HASH[..8]);
		discriminator
	}

	fn instruction_data(&self) -> Result<Vec<u8>, EncodingError> {
		let mut data = Self::function_discriminator().to_vec();
		self.serialize(&mut data)
			.map_err(|e| EncodingError::Serialization(e.to_string()))?;
		Ok(data)
	}
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum DvnConfigParam {
	Quorum(u8),
	Signers(Vec<DvnSigner>),
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct SetConfigParams {
	pub config: DvnConfigParam,
}

impl ProgramInstruction for SetConfigParams {
	const CALL_NAME: &'static str = "set_config";
}

const DVN_CONFIG_ACCOUNT_DISCRIMINATOR_HASH: [u8; 32] =
	sha2_const::Sha256::new().update(b"account:DvnConfig").finalize();

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Multisig {
	pub signers: Vec<DvnSigner>,
	pub quorum: u8,
}

/// The leading fields of the DVN program's config account. Later fields are not needed to build
/// payloads and are left undecoded.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct DvnConfig {
	pub vid: u32,
	pub bump: u8,
	pub multisig: Multisig,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAccountError {
	#[error("Account data is {0} bytes, too short for an account discriminator")]
	TooShort(usize),
	#[error("Account is not a DvnConfig account")]
	WrongDiscriminator,
	#[error("Failed to decode DvnConfig: {0}")]
	Malformed(String),
}

impl DvnConfig {
	pub fn account_discriminator() -> [u8; 8] {
		let mut discriminator = [0u8; 8];
		discriminator.copy_from_slice(&DVN_CONFIG_ACCOUNT_DISCRIMINATOR_HASH[..8]);
		discriminator
	}

	pub fn from_account_data(data: &[u8]) -> Result<Self, ConfigAccountError> {
		if data.len() < 8 {
			return Err(ConfigAccountError::TooShort(data.len()))
		}
		let (discriminator, mut body) = data.split_at(8);
		if discriminator != Self::account_discriminator() {
			return Err(ConfigAccountError::WrongDiscriminator)
		}
		Self::deserialize(&mut body).map_err(|e| ConfigAccountError::Malformed(e.to_string()))
	}
}

#[derive(BorshSerialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountMetaRef {
	pub pubkey: SolAddress,
	pub is_writable: bool,
}

/// What the DVN program hashes when checking an `execute` instruction's signatures.
#[derive(BorshSerialize, Clone, Debug, PartialEq, Eq)]
pub struct ExecuteTransactionDigest {
	pub vid: u32,
	pub program_id: SolAddress,
	pub accounts: Vec<AccountMetaRef>,
	pub data: Vec<u8>,
	pub expiration: i64,
}

/// A Solana DVN: its config account, the program owning that account and the signer set
/// currently stored in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolanaTarget {
	pub config_account: SolAddress,
	pub program_id: SolAddress,
	pub signers: Vec<DvnSigner>,
}

impl SolanaTarget {
	pub fn encode_call(&self, action: &Action) -> Result<Vec<u8>, EncodingError> {
		let config = match action {
			Action::SetQuorum { new_quorum } => DvnConfigParam::Quorum(
				u8::try_from(*new_quorum)
					.map_err(|_| EncodingError::QuorumOverflow(*new_quorum))?,
			),
			Action::SetSigner { signer, active } => {
				let signer: DvnSigner =
					signer.as_slice().try_into().map_err(|_| EncodingError::InvalidSignerLength {
						family: ChainFamily::Solana,
						expected: SIGNER_LEN,
						actual: signer.len(),
					})?;
				DvnConfigParam::Signers(updated_signer_set(&self.signers, &signer, *active)?)
			},
		};
		SetConfigParams { config }.instruction_data()
	}

	pub fn digest(
		&self,
		vid: VerifierId,
		expiration: Expiration,
		call_data: &[u8],
	) -> Result<Digest, EncodingError> {
		let digest = ExecuteTransactionDigest {
			vid,
			program_id: self.program_id,
			accounts: vec![],
			data: call_data.to_vec(),
			expiration: i64::try_from(expiration)
				.map_err(|_| EncodingError::ExpirationOverflow(expiration))?,
		};
		let bytes =
			borsh::to_vec(&digest).map_err(|e| EncodingError::Serialization(e.to_string()))?;
		Ok(keccak256(bytes))
	}
}

/// Removing keeps the remaining signers in their current order; adding appends.
pub fn updated_signer_set(
	current: &[DvnSigner],
	signer: &DvnSigner,
	active: bool,
) -> Result<Vec<DvnSigner>, EncodingError> {
	let present = current.contains(signer);
	match (active, present) {
		(true, true) =>
			Err(EncodingError::SignerAlreadyPresent(utilities::bytes_to_hex_prefixed(signer))),
		(false, false) =>
			Err(EncodingError::SignerNotFound(utilities::bytes_to_hex_prefixed(signer))),
		(true, false) => Ok(current.iter().copied().chain(core::iter::once(*signer)).collect()),
		(false, true) => Ok(current.iter().filter(|s| *s != signer).copied().collect()),
	}
}
