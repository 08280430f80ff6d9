#[macro_use]
mod macros;

pub mod codec;
pub mod serde_helpers;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use codec::*;

use anyhow::Context;
use std::path::Path;

/// Reads a file containing a hex string, stripping whitespace, quotes and any `0x` prefix before
/// passing it to `t` for decoding.
pub fn read_clean_and_decode_hex_str_file<V, T: FnOnce(&str) -> Result<V, anyhow::Error>>(
	file: &Path,
	context: &str,
	t: T,
) -> Result<V, anyhow::Error> {
	std::fs::read_to_string(file)
		.map_err(anyhow::Error::new)
		.with_context(|| format!("Failed to read {} file at {}", context, file.display()))
		.and_then(|string| {
			let mut str = string.as_str();
			str = str.trim();
			str = str.trim_matches(['"', '\''].as_ref());
			// Note if str is valid hex or not is determined by t()
			t(trim_0x(str))
		})
		.with_context(|| format!("Failed to decode {} file at {}", context, file.display()))
}
