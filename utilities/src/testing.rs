use std::{
	io::Write,
	path::{Path, PathBuf},
};

use tempfile::{self, TempDir};

pub fn with_file<C: FnOnce(&Path)>(text: &[u8], closure: C) {
	let mut tempfile = tempfile::NamedTempFile::new().unwrap();
	tempfile.write_all(text).unwrap();
	closure(tempfile.path());
}

/// Create a temp directory that will be deleted when `TempDir` is dropped.
/// Also returns the path to a non-existent file in the directory.
pub fn new_temp_directory_with_nonexistent_file() -> (TempDir, PathBuf) {
	let tempdir = tempfile::TempDir::new().unwrap();
	let tempfile = tempdir.path().to_owned().join("file");
	assert!(!tempfile.exists());
	(tempdir, tempfile)
}

/// Writes each `(name, contents)` pair into a fresh temp directory.
pub fn new_temp_directory_with_files(files: &[(&str, &str)]) -> TempDir {
	let tempdir = tempfile::TempDir::new().unwrap();
	for (name, contents) in files {
		std::fs::write(tempdir.path().join(name), contents).unwrap();
	}
	tempdir
}
