use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::constants::JSONRPC_VERSION;
use crate::constants::RPC_NOT_FOUND_CODE;
use crate::error::NodeClientError;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    pub jsonrpc: &'a str,
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> RpcRequest<'a> {
    pub fn new(
        method: &'a str,
        params: Option<Value>,
    ) -> Self {
        Self {
            method,
            jsonrpc: JSONRPC_VERSION,
            id: rand::rng().random_range(0..99_999),
            params,
        }
    }

    /// POST the call and unwrap the envelope. `Ok(None)` covers both a null
    /// result and the node's not-found code.
    pub async fn send(
        &self,
        http: &reqwest::Client,
        address: &str,
    ) -> Result<Option<Value>, NodeClientError> {
        let response = http.post(address).json(self).send().await.map_err(|e| NodeClientError::Transport {
            method: self.method.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let envelope: RpcResponse = response.json().await.map_err(|e| NodeClientError::Transport {
            method: self.method.to_string(),
            message: format!("unreadable response with status {}: {}", status, e),
        })?;

        envelope.into_result(self.method)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn into_result(
        self,
        method: &str,
    ) -> Result<Option<Value>, NodeClientError> {
        match self.error {
            Some(error) if error.code == RPC_NOT_FOUND_CODE => Ok(None),
            Some(error) => Err(NodeClientError::Upstream {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.filter(|value| !value.is_null())),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_omits_absent_params() {
        let request = RpcRequest::new("block_height", None);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["method"], "block_height");
        assert_eq!(body["jsonrpc"], "2.0");
        assert!(body.get("params").is_none());
        assert!(request.id < 99_999);
    }

    #[test]
    fn request_carries_params_when_present() {
        let request = RpcRequest::new("block_get", Some(json!({"height": 12})));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["params"], json!({"height": 12}));
    }

    #[test]
    fn not_found_code_becomes_none() {
        let response: RpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -100, "message": "not_found"}}))
                .unwrap();
        assert_eq!(response.into_result("block_get").unwrap(), None);
    }

    #[test]
    fn other_codes_surface_as_upstream_errors() {
        let response: RpcResponse =
            serde_json::from_value(json!({"error": {"code": -32603, "message": "internal error"}})).unwrap();
        let err = response.into_result("block_get").unwrap_err();
        assert!(matches!(
            err,
            NodeClientError::Upstream { code: -32603, ref message, .. } if message == "internal error"
        ));
    }

    #[test]
    fn null_result_is_none() {
        let response: RpcResponse = serde_json::from_value(json!({"result": null})).unwrap();
        assert_eq!(response.into_result("block_get").unwrap(), None);
    }
}
