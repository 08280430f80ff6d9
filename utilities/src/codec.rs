//! Conversions between hex strings and raw bytes.
//!
//! Every byte string that leaves the engine (call data, digests, signatures) goes through these
//! helpers. Odd-length or non-hex input is rejected, never truncated.

pub fn trim_0x(str: &str) -> &str {
	str.strip_prefix("0x").unwrap_or(str)
}

pub fn ensure_0x_prefixed(str: &str) -> String {
	format!("0x{}", trim_0x(str))
}

/// Decodes a hex string, with or without the `0x` prefix.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
	hex::decode(trim_0x(hex_str))
}

pub fn bytes_to_hex(bytes: impl AsRef<[u8]>) -> String {
	hex::encode(bytes)
}

pub fn bytes_to_hex_prefixed(bytes: impl AsRef<[u8]>) -> String {
	ensure_0x_prefixed(&bytes_to_hex(bytes))
}

pub fn clean_hex_address<const LEN: usize>(address_str: &str) -> Result<[u8; LEN], &'static str> {
	let address: [u8; LEN] = hex_to_bytes(address_str)
		.map_err(|_| "Invalid hex")?
		.try_into()
		.map_err(|_| "Invalid address length")?;

	Ok(address)
}

pub fn clean_eth_address(dirty_eth_address: &str) -> Result<[u8; 20], &'static str> {
	clean_hex_address(dirty_eth_address)
}
