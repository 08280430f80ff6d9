//! Reads the on-chain state a Solana DVN payload depends on: the program that owns the DVN
//! config account and the signer set stored in it.

pub mod rpc;
pub mod rpc_client_api;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dvn_chains::sol::{ConfigAccountError, DvnConfig, SolAddress, SolanaTarget};
use thiserror::Error;
use tracing::debug;

use self::{
	rpc::SolRpcApi,
	rpc_client_api::{CommitmentConfig, RpcAccountInfoConfig, UiAccountData, UiAccountEncoding},
};

#[derive(Error, Debug)]
pub enum StateFetchError {
	#[error("Failed to fetch account {address}: {source}")]
	Rpc {
		address: SolAddress,
		#[source]
		source: rpc::Error,
	},
	#[error("Account {0} does not exist")]
	AccountNotFound(SolAddress),
	#[error("Account {address} data is in an unexpected encoding: {encoding}")]
	UnexpectedEncoding { address: SolAddress, encoding: String },
	#[error("Failed to decode account {address} data: {reason}")]
	Decode { address: SolAddress, reason: String },
	#[error("Account {address} has an invalid owner '{owner}'")]
	InvalidOwner { address: SolAddress, owner: String },
	#[error("Account {address} is not a DVN config account: {source}")]
	Config {
		address: SolAddress,
		#[source]
		source: ConfigAccountError,
	},
}

fn decode_account_data(
	address: SolAddress,
	data: UiAccountData,
) -> Result<Vec<u8>, StateFetchError> {
	let decode_error = |reason: String| StateFetchError::Decode { address, reason };
	match data {
		UiAccountData::Binary(encoded, UiAccountEncoding::Base64) =>
			BASE64.decode(encoded).map_err(|e| decode_error(e.to_string())),
		UiAccountData::Binary(encoded, UiAccountEncoding::Base58) |
		UiAccountData::LegacyBinary(encoded) =>
			bs58::decode(encoded).into_vec().map_err(|e| decode_error(e.to_string())),
		UiAccountData::Binary(_, encoding) =>
			Err(StateFetchError::UnexpectedEncoding { address, encoding: format!("{encoding:?}") }),
		UiAccountData::Json(parsed) => Err(StateFetchError::UnexpectedEncoding {
			address,
			encoding: format!("jsonParsed ({})", parsed.program),
		}),
	}
}

/// Resolves a DVN config account into a [SolanaTarget]. The account's owner is the DVN program.
pub async fn fetch_dvn_target<Rpc: SolRpcApi + ?Sized>(
	rpc: &Rpc,
	config_account: SolAddress,
) -> Result<SolanaTarget, StateFetchError> {
	let response = rpc
		.get_account_info(
			&config_account,
			RpcAccountInfoConfig {
				encoding: Some(UiAccountEncoding::Base64),
				commitment: Some(CommitmentConfig::confirmed()),
				..Default::default()
			},
		)
		.await
		.map_err(|source| StateFetchError::Rpc { address: config_account, source })?;

	let account = response.value.ok_or(StateFetchError::AccountNotFound(config_account))?;

	let program_id: SolAddress = account.owner.parse().map_err(|_| {
		StateFetchError::InvalidOwner { address: config_account, owner: account.owner.clone() }
	})?;

	let data = decode_account_data(config_account, account.data)?;
	let config = DvnConfig::from_account_data(&data)
		.map_err(|source| StateFetchError::Config { address: config_account, source })?;

	debug!(
		%program_id,
		slot = response.context.slot,
		signers = config.multisig.signers.len(),
		quorum = config.multisig.quorum,
		"Fetched DVN config account {config_account}"
	);

	Ok(SolanaTarget { config_account, program_id, signers: config.multisig.signers })
}

#[cfg(test)]
pub mod test_utils {
	use super::{rpc_client_api::*, *};
	use dvn_chains::sol::Multisig;

	pub fn config_account_data(signers: Vec<[u8; 64]>, quorum: u8) -> Vec<u8> {
		let mut data = DvnConfig::account_discriminator().to_vec();
		data.extend(
			borsh::to_vec(&DvnConfig { vid: 168, bump: 255, multisig: Multisig { signers, quorum } })
				.unwrap(),
		);
		// Trailing fields the payload builder ignores
		data.extend([0u8; 16]);
		data
	}

	pub fn account_response(owner: SolAddress, data: Vec<u8>) -> Response<Option<UiAccount>> {
		Response {
			context: RpcResponseContext { slot: 1, api_version: None },
			value: Some(UiAccount {
				lamports: 1_454_640,
				data: UiAccountData::Binary(BASE64.encode(data), UiAccountEncoding::Base64),
				owner: owner.to_string(),
				executable: false,
				rent_epoch: u64::MAX,
				space: None,
			}),
		}
	}
}
