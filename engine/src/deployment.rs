//! The per-environment data files describing where the DVNs live and which keys sign for them.

use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

use anyhow::Context;
use dvn_chains::{registry::ChainEntry, ChainRegistry, Environment};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::{
	constants::{chain_registry_file, dvn_addresses_file, kms_key_ids_file, local_keys_file},
	custody::gcp_kms::GcpKmsKey,
};

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
	let contents = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read {what} file at {}", path.display()))?;
	serde_json::from_str(&contents)
		.with_context(|| format!("Failed to parse {what} file at {}", path.display()))
}

#[derive(Clone, Debug)]
pub struct Deployment {
	data_dir: PathBuf,
	environment: Environment,
	/// Chain name to DVN address, as written in the addresses file.
	pub addresses: BTreeMap<String, String>,
	pub registry: ChainRegistry,
}

impl Deployment {
	/// Reads `dvn-addresses-<env>.json` and, if present, `chain-registry-<env>.json` which adds
	/// to or replaces the built-in chain table.
	pub fn load(data_dir: &Path, environment: Environment) -> anyhow::Result<Self> {
		let addresses: BTreeMap<String, String> =
			read_json(&data_dir.join(dvn_addresses_file(environment)), "DVN addresses")?;

		let registry_overrides = data_dir.join(chain_registry_file(environment));
		let registry = if registry_overrides.exists() {
			let overrides: BTreeMap<String, ChainEntry> =
				read_json(&registry_overrides, "chain registry")?;
			info!("Loaded {} chain registry overrides", overrides.len());
			ChainRegistry::builtin(environment).with_overrides(overrides)
		} else {
			ChainRegistry::builtin(environment)
		};

		Ok(Self { data_dir: data_dir.to_owned(), environment, addresses, registry })
	}

	/// Keys from `kms-keyids-<env>.json`, in file order.
	pub fn kms_keys(&self) -> anyhow::Result<Vec<GcpKmsKey>> {
		read_json(&self.data_dir.join(kms_key_ids_file(self.environment)), "KMS key ids")
	}

	/// Key files listed in `local-keys-<env>.json`. Relative paths are relative to the data dir.
	pub fn local_key_files(&self) -> anyhow::Result<Vec<PathBuf>> {
		let files: Vec<PathBuf> =
			read_json(&self.data_dir.join(local_keys_file(self.environment)), "local keys")?;
		Ok(files.into_iter().map(|file| self.data_dir.join(file)).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dvn_chains::ChainFamily;
	use utilities::{assert_ok, testing::new_temp_directory_with_files};

	#[test]
	fn loads_addresses_and_registry_overrides() {
		let dir = new_temp_directory_with_files(&[
			(
				"dvn-addresses-testnet.json",
				r#"{ "sepolia": "0x1111111111111111111111111111111111111111", "sui-testnet": "0xab" }"#,
			),
			(
				"chain-registry-testnet.json",
				r#"{ "sui-testnet": { "family": "move_based", "endpointV2Id": 40378 } }"#,
			),
		]);

		let deployment = assert_ok!(Deployment::load(dir.path(), Environment::Testnet));
		assert_eq!(deployment.addresses.len(), 2);
		assert_eq!(assert_ok!(deployment.registry.family("sui-testnet")), ChainFamily::MoveBased);
		assert_eq!(assert_ok!(deployment.registry.vid("sepolia")), 10161);
	}

	#[test]
	fn missing_addresses_file_is_an_error() {
		let dir = new_temp_directory_with_files(&[]);
		let error = Deployment::load(dir.path(), Environment::Mainnet).unwrap_err();
		assert!(format!("{error:#}").contains("dvn-addresses-mainnet.json"));
	}

	#[test]
	fn key_files() {
		let dir = new_temp_directory_with_files(&[
			("dvn-addresses-mainnet.json", "{}"),
			("local-keys-mainnet.json", r#"["keys/a", "/abs/b"]"#),
			(
				"kms-keyids-mainnet.json",
				r#"[{ "projectId": "p", "locationId": "l", "keyRingId": "r", "keyId": "k", "keyVersion": "1" }]"#,
			),
		]);
		let deployment = assert_ok!(Deployment::load(dir.path(), Environment::Mainnet));

		assert_eq!(
			assert_ok!(deployment.local_key_files()),
			vec![dir.path().join("keys/a"), PathBuf::from("/abs/b")]
		);
		assert_eq!(assert_ok!(deployment.kms_keys())[0].key_id, "k");
	}
}
