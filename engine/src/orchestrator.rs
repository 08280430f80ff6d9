//! Runs encode, digest, sign and assemble for every requested chain and collects the result
//! records. Chains run concurrently; the first failure aborts the whole run.

use std::collections::{BTreeMap, BTreeSet};

use dvn_chains::{
	assemble, build_digest, encode_call, sol::SolAddress, Action, AssemblyError, ChainFamily,
	ChainRegistry, Digest, DvnTarget, EncodingError, Expiration, QuorumPayload, RegistryError,
	Signature, VerifierId,
};
use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use utilities::serde_helpers::hex_prefixed;

use crate::{
	custody::KeyCustody,
	deployment::Deployment,
	signer::{SignError, SignerAdapter},
	sol::{fetch_dvn_target, rpc::SolRpcApi, StateFetchError},
};

/// The action's parameters as the operator gave them, echoed into each record for review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionInfo {
	#[serde(rename_all = "camelCase")]
	SetQuorum { old_quorum: u64, new_quorum: u64 },
	#[serde(rename_all = "camelCase")]
	SetSigner { quorum: u64, signer_address: String, should_revoke: bool },
}

/// Everything shared by all chains of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadRequest {
	pub action: Action,
	/// Signatures to include. This is the quorum in force when the payload is executed.
	pub quorum: u64,
	pub expiration: Expiration,
	pub info: ActionInfo,
}

impl PayloadRequest {
	/// The change is approved under the current quorum, so that is the payload quorum.
	pub fn set_quorum(old_quorum: u64, new_quorum: u64, expiration: Expiration) -> Self {
		Self {
			action: Action::SetQuorum { new_quorum },
			quorum: old_quorum,
			expiration,
			info: ActionInfo::SetQuorum { old_quorum, new_quorum },
		}
	}

	pub fn set_signer(
		quorum: u64,
		signer_address: &str,
		should_revoke: bool,
		expiration: Expiration,
	) -> Result<Self, hex::FromHexError> {
		Ok(Self {
			action: Action::SetSigner {
				signer: utilities::hex_to_bytes(signer_address)?,
				active: !should_revoke,
			},
			quorum,
			expiration,
			info: ActionInfo::SetSigner {
				quorum,
				signer_address: signer_address.to_string(),
				should_revoke,
			},
		})
	}
}

/// The arguments of the DVN's `execute` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordArgs {
	pub target: String,
	pub signatures: QuorumPayload,
	#[serde(serialize_with = "hex_prefixed::serialize")]
	pub call_data: Vec<u8>,
	pub expiration: Expiration,
	pub vid: VerifierId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
	/// Every collected signature, including those left out of the payload.
	pub signatures: Vec<Signature>,
	#[serde(serialize_with = "hex_prefixed::serialize")]
	pub hash_call_data: Digest,
	#[serde(flatten)]
	pub action: ActionInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
	pub args: RecordArgs,
	pub info: RecordInfo,
}

#[derive(Error, Debug)]
pub enum PipelineError {
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error("No DVN address is configured")]
	MissingAddress,
	#[error("Invalid DVN address '{address}': {reason}")]
	InvalidAddress { address: String, reason: String },
	#[error(transparent)]
	StateFetch(#[from] StateFetchError),
	#[error(transparent)]
	Encoding(#[from] EncodingError),
	#[error(transparent)]
	Sign(#[from] SignError),
	#[error(transparent)]
	Assembly(#[from] AssemblyError),
}

#[derive(Error, Debug)]
#[error("Failed to build the payload for {chain}: {source}")]
pub struct ChainError {
	pub chain: String,
	#[source]
	pub source: PipelineError,
}

pub struct Orchestrator<Rpc, C> {
	registry: ChainRegistry,
	addresses: BTreeMap<String, String>,
	sol_rpc: Rpc,
	signer: SignerAdapter<C>,
}

impl<Rpc: SolRpcApi, C: KeyCustody> Orchestrator<Rpc, C> {
	pub fn new(deployment: Deployment, sol_rpc: Rpc, signer: SignerAdapter<C>) -> Self {
		Self { registry: deployment.registry, addresses: deployment.addresses, sol_rpc, signer }
	}

	/// Builds one record per distinct chain. Nothing is returned unless every chain succeeds.
	pub async fn run(
		&self,
		chains: &[String],
		request: &PayloadRequest,
	) -> Result<BTreeMap<String, ResultRecord>, ChainError> {
		let chains: BTreeSet<&String> = chains.iter().collect();

		let records = try_join_all(chains.into_iter().map(|chain| {
			async move {
				self.build_record(chain, request)
					.await
					.map(|record| (chain.clone(), record))
					.map_err(|source| ChainError { chain: chain.clone(), source })
			}
			.instrument(info_span!("chain", chain = %chain))
		}))
		.await?;

		Ok(records.into_iter().collect())
	}

	async fn resolve_target(
		&self,
		address: &str,
		family: ChainFamily,
	) -> Result<DvnTarget, PipelineError> {
		let invalid = |reason: String| PipelineError::InvalidAddress {
			address: address.to_string(),
			reason,
		};
		Ok(match family {
			ChainFamily::Evm => DvnTarget::Evm {
				address: utilities::clean_eth_address(address)
					.map_err(|reason| invalid(reason.to_string()))?,
			},
			ChainFamily::Solana => {
				let config_account =
					address.parse::<SolAddress>().map_err(|e| invalid(e.to_string()))?;
				DvnTarget::Solana(fetch_dvn_target(&self.sol_rpc, config_account).await?)
			},
			ChainFamily::MoveBased => {
				let address =
					utilities::hex_to_bytes(address).map_err(|e| invalid(e.to_string()))?;
				if address.is_empty() {
					return Err(invalid("empty address".to_string()))
				}
				DvnTarget::MoveBased { address }
			},
		})
	}

	async fn build_record(
		&self,
		chain: &str,
		request: &PayloadRequest,
	) -> Result<ResultRecord, PipelineError> {
		let family = self.registry.family(chain)?;
		let vid = self.registry.vid(chain)?;
		let address = self.addresses.get(chain).ok_or(PipelineError::MissingAddress)?;

		let target = self.resolve_target(address, family).await?;
		let call_data = encode_call(&request.action, &target)?;
		let digest = build_digest(&target, vid, request.expiration, &call_data)?;

		let signatures = self.signer.sign(&digest, family.signing_mode()).await?;
		let payload = assemble(&signatures, request.quorum, family)?;

		info!(
			vid,
			?family,
			digest = %utilities::bytes_to_hex_prefixed(digest),
			signatures = signatures.len(),
			quorum = request.quorum,
			"Assembled payload"
		);

		Ok(ResultRecord {
			args: RecordArgs {
				target: address.clone(),
				signatures: payload,
				call_data,
				expiration: request.expiration,
				vid,
			},
			info: RecordInfo { signatures, hash_call_data: digest, action: request.info.clone() },
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		custody::{local::LocalKeys, KeyId},
		sol::{rpc::MockSolRpcApi, test_utils::*},
	};
	use dvn_chains::{
		evm, move_based,
		signature::{evm_address, recover_address},
		sol::{DvnConfigParam, ProgramInstruction, SetConfigParams},
		Environment, SigningMode,
	};
	use secp256k1::{PublicKey, SecretKey, SECP256K1};
	use utilities::{assert_err, assert_ok, testing::new_temp_directory_with_files};

	const EXPIRATION: Expiration = 1_700_000_000_000;
	const EVM_DVN: &str = "0x1111111111111111111111111111111111111111";
	const CONFIG_ACCOUNT: SolAddress = SolAddress([1; 32]);
	const PROGRAM_ID: SolAddress = SolAddress([2; 32]);

	fn deployment() -> Deployment {
		let addresses = format!(
			r#"{{ "sepolia": "{EVM_DVN}", "solana": "{CONFIG_ACCOUNT}", "aptos": "0x{}" }}"#,
			"ab".repeat(32)
		);
		let dir = new_temp_directory_with_files(&[(
			"dvn-addresses-testnet.json",
			addresses.as_str(),
		)]);
		Deployment::load(dir.path(), Environment::Testnet).unwrap()
	}

	fn secret_key(seed: u8) -> SecretKey {
		SecretKey::from_slice(&[seed; 32]).unwrap()
	}

	/// Uncompressed public key without its format byte, as stored by the Solana DVN.
	fn solana_signer(seed: u8) -> [u8; 64] {
		let mut signer = [0u8; 64];
		signer.copy_from_slice(
			&PublicKey::from_secret_key(SECP256K1, &secret_key(seed)).serialize_uncompressed()[1..],
		);
		signer
	}

	async fn orchestrator(
		seeds: &[u8],
		sol_rpc: MockSolRpcApi,
	) -> Orchestrator<MockSolRpcApi, LocalKeys> {
		let custody = LocalKeys::new(
			seeds.iter().map(|seed| (KeyId(format!("key-{seed}")), secret_key(*seed))).collect(),
		);
		Orchestrator::new(deployment(), sol_rpc, SignerAdapter::new(custody).await.unwrap())
	}

	fn solana_rpc(signers: Vec<[u8; 64]>) -> MockSolRpcApi {
		let mut rpc = MockSolRpcApi::new();
		rpc.expect_get_account_info()
			.withf(|address, _| *address == CONFIG_ACCOUNT)
			.times(1)
			.returning(move |_, _| {
				Ok(account_response(PROGRAM_ID, config_account_data(signers.clone(), 2)))
			});
		rpc
	}

	#[tokio::test]
	async fn evm_set_quorum() {
		let orchestrator = orchestrator(&[1, 2, 3], MockSolRpcApi::new()).await;
		let request = PayloadRequest::set_quorum(2, 3, EXPIRATION);

		let records = assert_ok!(orchestrator.run(&["sepolia".to_string()], &request).await);
		let record = &records["sepolia"];

		let dvn = assert_ok!(utilities::clean_eth_address(EVM_DVN));
		let call_data = assert_ok!(evm::encode_call(&Action::SetQuorum { new_quorum: 3 }));
		let digest = evm::digest(10161, &dvn, EXPIRATION, &call_data);
		assert_eq!(record.args.vid, 10161);
		assert_eq!(record.args.call_data, call_data);
		assert_eq!(record.info.hash_call_data, digest);
		assert_eq!(record.info.signatures.len(), 3);

		let QuorumPayload::Concatenated(payload) = &record.args.signatures else {
			panic!("EVM payloads are concatenated")
		};
		assert_eq!(payload.len(), 2 * 65);
		let recovered: Vec<_> = payload
			.chunks(65)
			.map(|chunk| {
				recover_address(chunk.try_into().unwrap(), &digest, SigningMode::PersonalMessage)
					.unwrap()
			})
			.collect();
		assert!(recovered[0] < recovered[1]);

		let mut addresses: Vec<_> = [1, 2, 3]
			.iter()
			.map(|seed| evm_address(&PublicKey::from_secret_key(SECP256K1, &secret_key(*seed))))
			.collect();
		addresses.sort();
		assert_eq!(recovered, addresses[..2]);
	}

	#[tokio::test]
	async fn solana_remove_signer() {
		let orchestrator = orchestrator(
			&[1, 2],
			solana_rpc(vec![solana_signer(1), solana_signer(2), solana_signer(3)]),
		)
		.await;
		let request = assert_ok!(PayloadRequest::set_signer(
			2,
			&utilities::bytes_to_hex_prefixed(solana_signer(2)),
			true,
			EXPIRATION
		));

		let records = assert_ok!(orchestrator.run(&["solana".to_string()], &request).await);
		let record = &records["solana"];

		assert_eq!(record.args.vid, 10168);
		assert_eq!(record.args.target, CONFIG_ACCOUNT.to_string());
		assert_eq!(
			record.args.call_data,
			assert_ok!(SetConfigParams {
				config: DvnConfigParam::Signers(vec![solana_signer(1), solana_signer(3)])
			}
			.instruction_data())
		);

		let QuorumPayload::List(signatures) = &record.args.signatures else {
			panic!("Solana payloads are lists")
		};
		assert_eq!(signatures.len(), 2);
		for (signature, collected) in signatures.iter().zip(&record.info.signatures) {
			assert_eq!(signature[..], collected.signature[..]);
			assert!(signature[64] < 4);
		}
	}

	#[tokio::test]
	async fn move_based_set_signer() {
		let orchestrator = orchestrator(&[4], MockSolRpcApi::new()).await;
		let request = assert_ok!(PayloadRequest::set_signer(1, "0x0102", false, EXPIRATION));

		let records = assert_ok!(orchestrator.run(&["aptos".to_string()], &request).await);
		let record = &records["aptos"];

		let call_data = assert_ok!(move_based::encode_call(&request.action));
		assert_eq!(record.args.call_data, call_data);
		assert_eq!(record.args.vid, 10108);
		assert_eq!(record.info.hash_call_data, move_based::digest(10108, EXPIRATION, &call_data));
		assert_eq!(
			record.args.signatures,
			QuorumPayload::Concatenated(record.info.signatures[0].signature.to_vec())
		);
	}

	#[tokio::test]
	async fn all_chains_in_one_run() {
		let orchestrator =
			orchestrator(&[1, 2], solana_rpc(vec![solana_signer(1), solana_signer(2)])).await;
		let request = PayloadRequest::set_quorum(2, 1, EXPIRATION);
		let chains = ["solana", "aptos", "sepolia", "aptos"].map(String::from);

		let records = assert_ok!(orchestrator.run(&chains, &request).await);
		assert_eq!(records.keys().collect::<Vec<_>>(), ["aptos", "sepolia", "solana"]);
		assert!(records.values().all(|record| record.args.expiration == EXPIRATION));
	}

	#[tokio::test]
	async fn one_failing_chain_fails_the_run() {
		let orchestrator = orchestrator(&[1, 2], MockSolRpcApi::new()).await;
		let request = PayloadRequest::set_quorum(2, 3, EXPIRATION);

		let error = assert_err!(
			orchestrator.run(&["sepolia".to_string(), "ethereum".to_string()], &request).await
		);
		assert_eq!(error.chain, "ethereum");
		assert!(matches!(error.source, PipelineError::Registry(RegistryError::UnknownChain { .. })));

		let error = assert_err!(
			orchestrator
				.run(&["sepolia".to_string()], &PayloadRequest::set_quorum(3, 4, EXPIRATION))
				.await
		);
		assert!(matches!(
			error.source,
			PipelineError::Assembly(AssemblyError::InsufficientSignatures {
				required: 3,
				available: 2
			})
		));
	}

	#[tokio::test]
	async fn missing_address() {
		let orchestrator = orchestrator(&[1], MockSolRpcApi::new()).await;
		let error = assert_err!(
			orchestrator
				.run(&["fuji".to_string()], &PayloadRequest::set_quorum(1, 2, EXPIRATION))
				.await
		);
		assert!(matches!(error.source, PipelineError::MissingAddress));
	}

	#[test]
	fn invalid_signer_hex() {
		assert!(PayloadRequest::set_signer(1, "0xzz", false, EXPIRATION).is_err());
	}

	#[tokio::test]
	async fn record_json_layout() {
		let orchestrator = orchestrator(&[1], MockSolRpcApi::new()).await;
		let request = assert_ok!(PayloadRequest::set_signer(1, EVM_DVN, false, EXPIRATION));
		let records = assert_ok!(orchestrator.run(&["sepolia".to_string()], &request).await);

		let json = serde_json::to_value(&records).unwrap();
		let record = &json["sepolia"];
		assert_eq!(record["args"]["target"], EVM_DVN);
		assert_eq!(record["args"]["expiration"], EXPIRATION);
		assert_eq!(record["args"]["vid"], 10161);
		assert!(record["args"]["callData"].as_str().unwrap().starts_with("0x"));
		assert!(record["args"]["signatures"].as_str().unwrap().starts_with("0x"));
		assert!(record["info"]["hashCallData"].as_str().unwrap().starts_with("0x"));
		assert_eq!(record["info"]["quorum"], 1);
		assert_eq!(record["info"]["signerAddress"], EVM_DVN);
		assert_eq!(record["info"]["shouldRevoke"], false);
		assert!(record["info"]["signatures"][0]["address"].is_string());

		let info = PayloadRequest::set_quorum(2, 3, EXPIRATION).info;
		assert_eq!(
			serde_json::to_value(info).unwrap(),
			serde_json::json!({ "oldQuorum": 2, "newQuorum": 3 })
		);
	}
}
