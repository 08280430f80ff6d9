use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use dvn_chains::Expiration;
use dvn_engine::{
	constants::EXPIRATION_WINDOW,
	custody::{gcp_kms::GcpKmsClient, local::LocalKeys, KeyCustody},
	deployment::Deployment,
	logging::init_logging,
	orchestrator::{Orchestrator, PayloadRequest},
	result_sink::write_results,
	settings::{AdminCommand, CommandLineOptions, Settings, SigningBackend},
	signer::SignerAdapter,
	sol::rpc::SolRpcClient,
};
use tracing::info;

fn payload_request(cmd: &AdminCommand, expiration: Expiration) -> anyhow::Result<PayloadRequest> {
	Ok(match cmd {
		AdminCommand::SetQuorum { old_quorum, new_quorum } =>
			PayloadRequest::set_quorum(*old_quorum, *new_quorum, expiration),
		AdminCommand::SetSigner { quorum, signer_address, should_revoke } =>
			PayloadRequest::set_signer(*quorum, signer_address, *should_revoke, expiration)
				.with_context(|| format!("Signer address {signer_address} is not valid hex"))?,
	})
}

async fn run_with_custody<C: KeyCustody>(
	custody: C,
	settings: &Settings,
	deployment: Deployment,
	opts: &CommandLineOptions,
	request: PayloadRequest,
) -> anyhow::Result<()> {
	let signer = SignerAdapter::new(custody).await.context("Failed to resolve the signing keys")?;
	let sol_rpc = SolRpcClient::new(&settings.solana.http_endpoint)?;

	let results = Orchestrator::new(deployment, sol_rpc, signer).run(&opts.chains, &request).await?;

	let path = write_results(&settings.output_dir, opts.cmd.output_file_name(), &results)?;
	info!("Results written to: {}", path.display());
	Ok(())
}

async fn start(opts: CommandLineOptions) -> anyhow::Result<()> {
	let settings = Settings::new(opts.clone()).context("Error reading settings")?;
	let deployment = Deployment::load(&settings.data_dir, opts.environment)?;

	// Shared by every chain so all payloads of a run expire together
	let expires_at = Utc::now() + chrono::Duration::from_std(EXPIRATION_WINDOW)?;
	let expiration = Expiration::try_from(expires_at.timestamp_millis())
		.context("Expiration is before the Unix epoch")?;
	let request = payload_request(&opts.cmd, expiration)?;

	info!(
		environment = %opts.environment,
		chains = ?opts.chains,
		backend = settings.signing.backend.as_str(),
		expiration,
		"Creating payloads expiring at {expires_at}"
	);

	match settings.signing.backend {
		SigningBackend::GcpKms => {
			let custody = GcpKmsClient::from_token_file(
				&settings.kms.endpoint,
				&settings.kms.access_token_file,
				&deployment.kms_keys()?,
			)?;
			run_with_custody(custody, &settings, deployment, &opts, request).await
		},
		SigningBackend::Local => {
			let custody = LocalKeys::from_files(&deployment.local_key_files()?)?;
			run_with_custody(custody, &settings, deployment, &opts, request).await
		},
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let opts = CommandLineOptions::parse();
	init_logging(opts.json_logs)?;

	start(opts).await
}
