use std::{
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;

const INDENT: &[u8] = b"    ";

/// Pretty prints `results` into `dir/file_name`. The file is written to a temporary file first
/// and renamed into place, so an existing file is never left half written.
pub fn write_results<T: Serialize>(
	dir: &Path,
	file_name: &str,
	results: &T,
) -> anyhow::Result<PathBuf> {
	let path = dir.join(file_name);
	let mut file = NamedTempFile::new_in(dir)
		.with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;

	let mut serializer =
		Serializer::with_formatter(file.as_file_mut(), PrettyFormatter::with_indent(INDENT));
	results.serialize(&mut serializer).context("Failed to serialize results")?;
	file.write_all(b"\n")?;
	file.as_file().sync_all()?;

	file.persist(&path)
		.with_context(|| format!("Failed to write results to {}", path.display()))?;
	Ok(path)
}
