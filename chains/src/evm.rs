use ethabi::{ParamType, Token};

use crate::{
	hash::{keccak256, keccak256_concat},
	Action, ChainFamily, Digest, EncodingError, Expiration, VerifierId,
};

pub type EvmAddress = [u8; 20];

pub const ADDRESS_LEN: usize = 20;

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

fn ethabi_function(name: &'static str, params: Vec<ethabi::Param>) -> ethabi::Function {
	#[allow(deprecated)]
	ethabi::Function {
		name: name.into(),
		inputs: params,
		outputs: vec![],
		constant: None,
		state_mutability: ethabi::StateMutability::NonPayable,
	}
}

fn ethabi_param(name: &'static str, param_type: ParamType) -> ethabi::Param {
	ethabi::Param { name: name.into(), kind: param_type, internal_type: None }
}

/// `setQuorum(uint64 _quorum)` on the EVM DVN contract.
pub fn set_quorum_function() -> ethabi::Function {
	ethabi_function("setQuorum", vec![ethabi_param("_quorum", ParamType::Uint(64))])
}

/// `setSigner(address _signer, bool _active)` on the EVM DVN contract.
pub fn set_signer_function() -> ethabi::Function {
	ethabi_function(
		"setSigner",
		vec![ethabi_param("_signer", ParamType::Address), ethabi_param("_active", ParamType::Bool)],
	)
}

pub fn encode_call(action: &Action) -> Result<Vec<u8>, EncodingError> {
	let (function, tokens) = match action {
		Action::SetQuorum { new_quorum } =>
			(set_quorum_function(), vec![Token::Uint((*new_quorum).into())]),
		Action::SetSigner { signer, active } => {
			let signer: EvmAddress =
				signer.as_slice().try_into().map_err(|_| EncodingError::InvalidSignerLength {
					family: ChainFamily::Evm,
					expected: ADDRESS_LEN,
					actual: signer.len(),
				})?;
			(set_signer_function(), vec![Token::Address(signer.into()), Token::Bool(*active)])
		},
	};
	function
		.encode_input(&tokens)
		.map_err(|e| EncodingError::Serialization(e.to_string()))
}

/// `keccak256(abi.encodePacked(uint32 vid, address target, uint256 expiration, bytes callData))`
pub fn digest(
	vid: VerifierId,
	target: &EvmAddress,
	expiration: Expiration,
	call_data: &[u8],
) -> Digest {
	let mut expiration_word = [0u8; 32];
	expiration_word[24..].copy_from_slice(&expiration.to_be_bytes());
	keccak256_concat(&[&vid.to_be_bytes(), target, &expiration_word, call_data])
}

/// The EIP-191 personal message hash an Ethereum wallet signs for a 32-byte message.
pub fn eip191_hash(message: &Digest) -> Digest {
	keccak256_concat(&[PERSONAL_MESSAGE_PREFIX, message])
}

/// Mixed-case EIP-55 rendering of an address.
pub fn to_checksum_address(address: &EvmAddress) -> String {
	let lower = hex::encode(address);
	let hash = keccak256(lower.as_bytes());
	let checksummed: String = lower
		.chars()
		.enumerate()
		.map(|(i, c)| {
			let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
			if nibble >= 8 {
				c.to_ascii_uppercase()
			} else {
				c
			}
		})
		.collect();
	format!("0x{checksummed}")
}

pub fn serialize_checksummed<S: serde::Serializer>(
	address: &EvmAddress,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&to_checksum_address(address))
}
