use crate::{
	hash::{keccak256, keccak256_concat},
	Action, Digest, EncodingError, Expiration, VerifierId,
};

pub const SET_QUORUM: &str = "set_quorum";
pub const SET_SIGNER: &str = "set_signer";

fn bcs_bytes<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
	bcs::to_bytes(value).map_err(|e| EncodingError::Serialization(e.to_string()))
}

/// First four bytes of the Keccak-256 hash of the BCS encoded function name.
pub fn function_selector(name: &str) -> Result<[u8; 4], EncodingError> {
	let hash = keccak256(bcs_bytes(name)?);
	Ok([hash[0], hash[1], hash[2], hash[3]])
}

pub fn encode_call(action: &Action) -> Result<Vec<u8>, EncodingError> {
	let (name, args) = match action {
		Action::SetQuorum { new_quorum } => (SET_QUORUM, bcs_bytes(new_quorum)?),
		Action::SetSigner { signer, active } => (SET_SIGNER, bcs_bytes(&(signer, active))?),
	};
	let mut call_data = function_selector(name)?.to_vec();
	call_data.extend(args);
	Ok(call_data)
}

/// `keccak256(call_data ‖ vid as u32 BE ‖ expiration as u64 BE)`
pub fn digest(vid: VerifierId, expiration: Expiration, call_data: &[u8]) -> Digest {
	keccak256_concat(&[call_data, &vid.to_be_bytes(), &expiration.to_be_bytes()])
}
