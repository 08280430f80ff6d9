use tiny_keccak::{Hasher, Keccak};

pub type Hash = [u8; 32];

pub fn keccak256(data: impl AsRef<[u8]>) -> Hash {
	keccak256_concat(&[data.as_ref()])
}

/// Keccak-256 over the concatenation of `parts`, without allocating the joined buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
	let mut hasher = Keccak::v256();
	for part in parts {
		hasher.update(part);
	}
	let mut output = [0u8; 32];
	hasher.finalize(&mut output);
	output
}
