//! JSON-RPC over HTTP POST, shared by the source-chain and hub clients.

use crate::error::{RelayError, Result};
use serde_json::{json, Value};

/// Reqwest client that does not consult system proxy settings.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().no_proxy().build()?)
}

/// JSON-RPC 2.0 call. A non-null `error` member becomes [RelayError::Rpc] with its text.
pub async fn http_json_rpc(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value> {
    let resp = post(client, url, method, params, id).await?;
    match resp.get("error") {
        None | Some(Value::Null) => {}
        Some(err) => return Err(RelayError::Rpc(error_text(err))),
    }
    resp.get("result")
        .cloned()
        .ok_or_else(|| RelayError::Decode(format!("{method}: missing result")))
}

/// POST the request envelope and return the raw response body.
pub(crate) async fn post(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    });
    let resp = client.post(url).json(&body).send().await?;
    Ok(resp.json().await?)
}

/// Prefer the `message`/`data` members of an error object over its JSON rendering.
pub(crate) fn error_text(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            let message = obj.get("message").and_then(Value::as_str).unwrap_or("");
            match obj.get("data").and_then(Value::as_str) {
                Some(data) if !data.is_empty() => format!("{message}: {data}"),
                _ if !message.is_empty() => message.to_string(),
                _ => err.to_string(),
            }
        }
        other => other.to_string(),
    }
}
