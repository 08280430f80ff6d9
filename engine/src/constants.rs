use std::time::Duration;

// ======= Payloads =======

/// How long a generated payload stays valid on-chain.
pub const EXPIRATION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const QUORUM_CHANGE_PAYLOADS_FILE: &str = "quorum-change-payloads.json";
pub const SIGNER_CHANGE_PAYLOADS_FILE: &str = "signer-change-payloads.json";

// ======= Settings =======

pub const DEFAULT_CONFIG_PATH: &str = "config/Default.toml";

/// Prefix of environment variables overriding settings, e.g. `DVN_SOLANA__HTTP_ENDPOINT`.
pub const CONFIG_ENV_PREFIX: &str = "DVN";

// ======= Data files =======

pub fn dvn_addresses_file(environment: dvn_chains::Environment) -> String {
	format!("dvn-addresses-{environment}.json")
}

pub fn kms_key_ids_file(environment: dvn_chains::Environment) -> String {
	format!("kms-keyids-{environment}.json")
}

pub fn local_keys_file(environment: dvn_chains::Environment) -> String {
	format!("local-keys-{environment}.json")
}

pub fn chain_registry_file(environment: dvn_chains::Environment) -> String {
	format!("chain-registry-{environment}.json")
}

// ======= Rpc Client Settings =======

/// Duration before we give up on a single HTTP request to the KMS or a Solana node
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
