//! Chain name lookup: which family a chain belongs to and which LayerZero ids identify it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChainFamily, Environment, VerifierId};

/// Endpoint-v2 ids of non-EVM chains are offset by multiples of this to get the verifier id.
const ENDPOINT_V2_ID_MODULUS: u32 = 30000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VersionTag {
	/// "2", the ULN v2 chain id.
	Uln2,
	/// "302", the endpoint v2 id.
	EndpointV2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
	pub family: ChainFamily,
	#[serde(default)]
	pub uln2_id: Option<u32>,
	#[serde(default)]
	pub endpoint_v2_id: Option<u32>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
	#[error("Unknown chain '{chain}' on {environment}")]
	UnknownChain { chain: String, environment: Environment },
	#[error("Chain '{chain}' has no {version:?} id on {environment}")]
	MissingId { chain: String, environment: Environment, version: VersionTag },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainRegistry {
	environment: Environment,
	chains: BTreeMap<String, ChainEntry>,
}

/// (family, ULN v2 id, endpoint v2 id)
type BuiltinIds = (ChainFamily, Option<u32>, Option<u32>);

const fn evm(uln2_id: u32, endpoint_v2_id: u32) -> BuiltinIds {
	(ChainFamily::Evm, Some(uln2_id), Some(endpoint_v2_id))
}

const fn non_evm(family: ChainFamily, endpoint_v2_id: u32) -> BuiltinIds {
	(family, None, Some(endpoint_v2_id))
}

const MAINNET: &[(&str, BuiltinIds)] = &[
	("ethereum", evm(101, 30101)),
	("bsc", evm(102, 30102)),
	("avalanche", evm(106, 30106)),
	("polygon", evm(109, 30109)),
	("arbitrum", evm(110, 30110)),
	("optimism", evm(111, 30111)),
	("base", evm(184, 30184)),
	("solana", non_evm(ChainFamily::Solana, 30168)),
	("aptos", non_evm(ChainFamily::MoveBased, 30108)),
	("movement", non_evm(ChainFamily::MoveBased, 30325)),
	("initia", non_evm(ChainFamily::MoveBased, 30326)),
];

const TESTNET: &[(&str, BuiltinIds)] = &[
	("sepolia", evm(10161, 40161)),
	("bsc-testnet", evm(10102, 40102)),
	("fuji", evm(10106, 40106)),
	("arbitrum-sepolia", evm(10231, 40231)),
	("optimism-sepolia", evm(10232, 40232)),
	("base-sepolia", evm(10245, 40245)),
	("solana", non_evm(ChainFamily::Solana, 40168)),
	("aptos", non_evm(ChainFamily::MoveBased, 40108)),
	("movement", non_evm(ChainFamily::MoveBased, 40325)),
	("initia", non_evm(ChainFamily::MoveBased, 40326)),
];

impl ChainRegistry {
	/// The chains this tool ships with for `environment`.
	pub fn builtin(environment: Environment) -> Self {
		let table = match environment {
			Environment::Mainnet => MAINNET,
			Environment::Testnet => TESTNET,
		};
		Self {
			environment,
			chains: table
				.iter()
				.map(|(name, (family, uln2_id, endpoint_v2_id))| {
					(
						name.to_string(),
						ChainEntry {
							family: *family,
							uln2_id: *uln2_id,
							endpoint_v2_id: *endpoint_v2_id,
						},
					)
				})
				.collect(),
		}
	}

	/// Adds chains, replacing built-in entries with the same name.
	pub fn with_overrides(mut self, overrides: BTreeMap<String, ChainEntry>) -> Self {
		self.chains.extend(overrides);
		self
	}

	fn entry(&self, chain: &str) -> Result<&ChainEntry, RegistryError> {
		self.chains.get(chain).ok_or_else(|| RegistryError::UnknownChain {
			chain: chain.to_string(),
			environment: self.environment,
		})
	}

	pub fn family(&self, chain: &str) -> Result<ChainFamily, RegistryError> {
		self.entry(chain).map(|entry| entry.family)
	}

	pub fn id_for(&self, chain: &str, version: VersionTag) -> Result<u32, RegistryError> {
		let entry = self.entry(chain)?;
		match version {
			VersionTag::Uln2 => entry.uln2_id,
			VersionTag::EndpointV2 => entry.endpoint_v2_id,
		}
		.ok_or_else(|| RegistryError::MissingId {
			chain: chain.to_string(),
			environment: self.environment,
			version,
		})
	}

	/// EVM DVNs are registered under their ULN v2 chain id. Other families use the endpoint v2
	/// id with the environment offset removed.
	pub fn vid(&self, chain: &str) -> Result<VerifierId, RegistryError> {
		match self.family(chain)? {
			ChainFamily::Evm => self.id_for(chain, VersionTag::Uln2),
			ChainFamily::Solana | ChainFamily::MoveBased => self
				.id_for(chain, VersionTag::EndpointV2)
				.map(|id| id % ENDPOINT_V2_ID_MODULUS),
		}
	}
}
