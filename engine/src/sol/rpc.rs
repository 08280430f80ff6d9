use async_trait::async_trait;
use dvn_chains::sol::SolAddress;
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::{from_value, json};
use thiserror::Error;
use tracing::trace;

#[cfg(test)]
use mockall::automock;

use super::rpc_client_api::*;
use crate::constants::HTTP_REQUEST_TIMEOUT;

#[derive(Error, Debug)]
pub enum Error {
	#[error("Transport error: {0}")]
	Transport(#[source] reqwest::Error),
	#[error("Rpc error {}: {}", .0.code, .0.message)]
	Rpc(RpcError),
	#[error("Failed to parse the response: {0}")]
	Json(#[source] serde_json::Error),
}

#[derive(Clone)]
pub struct SolRpcClient {
	// Internally the Client is Arc'd
	client: Client,
	endpoint: String,
}

impl SolRpcClient {
	pub fn new(endpoint: &str) -> anyhow::Result<Self> {
		Ok(Self {
			client: Client::builder().timeout(HTTP_REQUEST_TIMEOUT).build()?,
			endpoint: endpoint.to_string(),
		})
	}

	async fn call_rpc(
		&self,
		method: &str,
		params: Option<serde_json::Value>,
	) -> Result<serde_json::Value, Error> {
		call_rpc_raw(&self.client, &self.endpoint, method, params).await
	}
}

fn request_body(method: &str, params: Option<serde_json::Value>) -> serde_json::Value {
	json!({
		"jsonrpc": "2.0",
		"id": 0,
		"method": method,
		"params": params.unwrap_or_else(|| json!([]))
	})
}

/// Splits a JSON-RPC response into its `result` or its `error`.
fn parse_response(mut json: serde_json::Value) -> Result<serde_json::Value, Error> {
	if json["error"].is_object() {
		return Err(Error::Rpc(from_value(json["error"].take()).map_err(Error::Json)?))
	}
	Ok(json["result"].take())
}

async fn call_rpc_raw(
	client: &Client,
	endpoint: &str,
	method: &str,
	params: Option<serde_json::Value>,
) -> Result<serde_json::Value, Error> {
	let request_body = request_body(method, params);
	trace!("Solana rpc request: {request_body}");

	let response = client
		.post(endpoint)
		.header(CONTENT_TYPE, "application/json")
		.json(&request_body)
		.send()
		.await
		.map_err(Error::Transport)?;

	let json = response.json::<serde_json::Value>().await.map_err(Error::Transport)?;
	parse_response(json)
}

// We use a trait so we can inject a mock in the tests
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SolRpcApi: Send + Sync {
	async fn get_account_info(
		&self,
		address: &SolAddress,
		config: RpcAccountInfoConfig,
	) -> Result<Response<Option<UiAccount>>, Error>;
}

#[async_trait]
impl SolRpcApi for SolRpcClient {
	async fn get_account_info(
		&self,
		address: &SolAddress,
		config: RpcAccountInfoConfig,
	) -> Result<Response<Option<UiAccount>>, Error> {
		let response = self
			.call_rpc("getAccountInfo", Some(json!([address.to_string(), json!(config)])))
			.await?;
		from_value(response).map_err(Error::Json)
	}
}
