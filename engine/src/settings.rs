use std::{collections::HashMap, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, Environment as EnvSource, File, Source, Value};
use dvn_chains::Environment;
use serde::Deserialize;
use url::Url;
use utilities::serde_helpers::deser_path;

use crate::constants::{
	CONFIG_ENV_PREFIX, DEFAULT_CONFIG_PATH, QUORUM_CHANGE_PAYLOADS_FILE,
	SIGNER_CHANGE_PAYLOADS_FILE,
};

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Solana {
	pub http_endpoint: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Kms {
	pub endpoint: String,
	#[serde(deserialize_with = "deser_path")]
	pub access_token_file: PathBuf,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SigningBackend {
	GcpKms,
	Local,
}

impl SigningBackend {
	pub fn as_str(&self) -> &'static str {
		match self {
			SigningBackend::GcpKms => "gcp_kms",
			SigningBackend::Local => "local",
		}
	}
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Signing {
	pub backend: SigningBackend,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
	#[serde(deserialize_with = "deser_path")]
	pub data_dir: PathBuf,
	#[serde(deserialize_with = "deser_path")]
	pub output_dir: PathBuf,
	pub solana: Solana,
	pub kms: Kms,
	pub signing: Signing,
}

#[derive(Parser, Clone, Debug)]
#[clap(version, about = "Creates quorum-signed admin payloads for DVN contracts")]
pub struct CommandLineOptions {
	#[clap(long = "config-path")]
	pub config_path: Option<String>,

	#[clap(short = 'e', long = "environment", default_value_t = Environment::Mainnet)]
	pub environment: Environment,

	#[clap(
		short = 'c',
		long = "chains",
		value_delimiter = ',',
		required = true,
		help = "Comma separated list of chain names"
	)]
	pub chains: Vec<String>,

	#[clap(long = "json-logs", help = "Emit logs as JSON")]
	pub json_logs: bool,

	#[clap(flatten)]
	pub settings_opts: SettingsOptions,

	#[clap(subcommand)]
	pub cmd: AdminCommand,
}

/// Overrides for individual [Settings] fields.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsOptions {
	#[clap(long = "data_dir")]
	pub data_dir: Option<PathBuf>,
	#[clap(long = "output_dir")]
	pub output_dir: Option<PathBuf>,
	#[clap(long = "solana.http_endpoint")]
	pub solana_http_endpoint: Option<String>,
	#[clap(long = "kms.endpoint")]
	pub kms_endpoint: Option<String>,
	#[clap(long = "kms.access_token_file")]
	pub kms_access_token_file: Option<PathBuf>,
	#[clap(long = "signing.backend", value_parser = signing_backend_parser)]
	pub signing_backend: Option<SigningBackend>,
}

impl SettingsOptions {
	pub fn insert_all(&self, map: &mut HashMap<String, Value>) {
		insert_command_line_option_path(map, "data_dir", &self.data_dir);
		insert_command_line_option_path(map, "output_dir", &self.output_dir);
		insert_command_line_option(map, "solana.http_endpoint", &self.solana_http_endpoint);
		insert_command_line_option(map, "kms.endpoint", &self.kms_endpoint);
		insert_command_line_option_path(
			map,
			"kms.access_token_file",
			&self.kms_access_token_file,
		);
		insert_command_line_option(
			map,
			"signing.backend",
			&self.signing_backend.map(|backend| backend.as_str().to_string()),
		);
	}
}

fn insert_command_line_option(
	map: &mut HashMap<String, Value>,
	setting_str: &str,
	option: &Option<String>,
) {
	if let Some(value) = option {
		map.insert(setting_str.to_string(), Value::from(value.clone()));
	}
}

fn insert_command_line_option_path(
	map: &mut HashMap<String, Value>,
	setting_str: &str,
	option: &Option<PathBuf>,
) {
	insert_command_line_option(
		map,
		setting_str,
		&option.as_ref().map(|path| path.to_string_lossy().into_owned()),
	);
}

impl Source for CommandLineOptions {
	fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
		Box::new((*self).clone())
	}

	fn collect(&self) -> Result<config::Map<String, Value>, ConfigError> {
		let mut map: HashMap<String, Value> = HashMap::new();

		self.settings_opts.insert_all(&mut map);

		Ok(map)
	}
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
	#[clap(about = "Change the number of signatures the DVN requires")]
	SetQuorum {
		#[clap(long, help = "The quorum currently configured on the DVN")]
		old_quorum: u64,
		#[clap(long, help = "The quorum to switch to")]
		new_quorum: u64,
	},
	#[clap(about = "Add a signer to, or remove a signer from, the DVN")]
	SetSigner {
		#[clap(short = 'q', long, help = "Number of signatures required for quorum")]
		quorum: u64,
		#[clap(
			long,
			help = "Hex encoded signer: an address for EVM chains, a public key for Solana"
		)]
		signer_address: String,
		#[clap(
			long,
			required = true,
			action = clap::ArgAction::Set,
			value_parser = should_revoke_parser,
			help = "1 to remove the signer, 0 to add it"
		)]
		should_revoke: bool,
	},
}

impl AdminCommand {
	pub fn output_file_name(&self) -> &'static str {
		match self {
			AdminCommand::SetQuorum { .. } => QUORUM_CHANGE_PAYLOADS_FILE,
			AdminCommand::SetSigner { .. } => SIGNER_CHANGE_PAYLOADS_FILE,
		}
	}
}

// Numeric rather than a flag so that the operator has to state the intent either way.
fn should_revoke_parser(s: &str) -> Result<bool, String> {
	match s {
		"0" => Ok(false),
		"1" => Ok(true),
		_ => Err(format!("{s} is not valid, should-revoke must be 0 or 1")),
	}
}

fn signing_backend_parser(s: &str) -> Result<SigningBackend, String> {
	match s.to_lowercase().as_str() {
		"gcp_kms" | "gcp-kms" | "kms" => Ok(SigningBackend::GcpKms),
		"local" => Ok(SigningBackend::Local),
		_ => Err(format!("{s} is not a valid signing backend. Use 'gcp_kms' or 'local'")),
	}
}

impl Settings {
	/// New settings loaded from the `config_path` in the `CommandLineOptions` or
	/// "config/Default.toml" if none, with overridden values from the environment and
	/// `CommandLineOptions`
	pub fn new(opts: CommandLineOptions) -> Result<Self, ConfigError> {
		let config_path =
			opts.config_path.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
		Self::load_settings_from_all_sources(&config_path, opts)
	}

	pub fn load_settings_from_all_sources(
		config_path: &str,
		opts: CommandLineOptions,
	) -> Result<Self, ConfigError> {
		let settings: Self = Config::builder()
			.add_source(File::with_name(config_path))
			.add_source(
				EnvSource::with_prefix(CONFIG_ENV_PREFIX).prefix_separator("_").separator("__"),
			)
			.add_source(opts)
			.build()?
			.try_deserialize()?;

		settings.validate_settings()?;

		Ok(settings)
	}

	pub fn validate_settings(&self) -> Result<(), ConfigError> {
		parse_http_url(&self.solana.http_endpoint)
			.map_err(|e| ConfigError::Message(format!("solana.http_endpoint: {e}")))?;
		parse_http_url(&self.kms.endpoint)
			.map_err(|e| ConfigError::Message(format!("kms.endpoint: {e}")))?;
		Ok(())
	}
}

/// Parse the URL and check that it is a valid http(s) url
pub fn parse_http_url(url: &str) -> anyhow::Result<Url> {
	let parsed = Url::parse(url)?;
	if parsed.scheme() != "http" && parsed.scheme() != "https" {
		return Err(anyhow::Error::msg(format!("Wrong scheme '{}'", parsed.scheme())))
	}
	if parsed.host().is_none() || parsed.cannot_be_a_base() || parsed.fragment().is_some() {
		return Err(anyhow::Error::msg("Invalid URL data"))
	}
	Ok(parsed)
}
