use serde::Serialize;
use thiserror::Error;

use crate::{signature::Signature, ChainFamily};

/// The signatures argument of the DVN `execute` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QuorumPayload {
	/// 65-byte signatures back to back, ordered by signer address.
	Concatenated(
		#[serde(serialize_with = "utilities::serde_helpers::hex_prefixed::serialize")] Vec<u8>,
	),
	/// One entry per signature, in signing order.
	List(
		#[serde(serialize_with = "utilities::serde_helpers::hex_prefixed_seq::serialize")]
		Vec<Vec<u8>>,
	),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
	#[error("Quorum of {required} requires more signatures than the {available} collected")]
	InsufficientSignatures { required: u64, available: usize },
}

/// Selects `quorum` signatures and packs them the way `family`'s DVN expects.
///
/// EVM and Move DVNs check signers in ascending address order, so signatures are sorted by
/// address first. Solana takes them in the order they were collected.
pub fn assemble(
	signatures: &[Signature],
	quorum: u64,
	family: ChainFamily,
) -> Result<QuorumPayload, AssemblyError> {
	let insufficient =
		|| AssemblyError::InsufficientSignatures { required: quorum, available: signatures.len() };
	let quorum = usize::try_from(quorum).map_err(|_| insufficient())?;
	if quorum > signatures.len() {
		return Err(insufficient())
	}

	Ok(match family {
		ChainFamily::Evm | ChainFamily::MoveBased => {
			let mut sorted = signatures.to_vec();
			sorted.sort_by_key(|signature| signature.address);
			QuorumPayload::Concatenated(
				sorted.iter().take(quorum).flat_map(|signature| signature.signature).collect(),
			)
		},
		ChainFamily::Solana => QuorumPayload::List(
			signatures.iter().take(quorum).map(|signature| signature.signature.to_vec()).collect(),
		),
	})
}
