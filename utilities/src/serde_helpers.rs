use core::fmt;
use std::path::PathBuf;

/// Serializes any byte container as a `0x`-prefixed lowercase hex string.
///
/// Use with `#[serde(with = "utilities::serde_helpers::hex_prefixed")]`.
pub mod hex_prefixed {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<T: AsRef<[u8]>, S: Serializer>(
		bytes: &T,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&crate::bytes_to_hex_prefixed(bytes))
	}

	pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
	where
		T: TryFrom<Vec<u8>>,
		D: Deserializer<'de>,
	{
		let hex_str = String::deserialize(deserializer)?;
		crate::hex_to_bytes(&hex_str)
			.map_err(serde::de::Error::custom)?
			.try_into()
			.map_err(|_| serde::de::Error::custom("Unexpected byte length"))
	}
}

/// As [hex_prefixed], for a sequence of byte containers.
pub mod hex_prefixed_seq {
	use serde::{ser::SerializeSeq, Serializer};

	pub fn serialize<T: AsRef<[u8]>, S: Serializer>(
		items: &[T],
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(items.len()))?;
		for item in items {
			seq.serialize_element(&crate::bytes_to_hex_prefixed(item))?;
		}
		seq.end()
	}
}

// We use PathBuf because the value must be Sized, Path is not Sized
pub fn deser_path<'de, D>(deserializer: D) -> std::result::Result<PathBuf, D::Error>
where
	D: serde::Deserializer<'de>,
{
	struct PathVisitor;

	impl<'de> serde::de::Visitor<'de> for PathVisitor {
		type Value = PathBuf;

		fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
			formatter.write_str("A string containing a path")
		}

		fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
		where
			E: serde::de::Error,
		{
			Ok(PathBuf::from(v))
		}
	}

	deserializer.deserialize_any(PathVisitor)
}
