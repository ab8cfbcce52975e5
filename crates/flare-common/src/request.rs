use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Single execution request: run `function_name` from `code` once, against
/// one serialized args/kwargs pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub function_id: String,
    pub code: String,
    pub function_name: String,
    /// Serialized positional arguments, hex-encoded. Opaque to the worker.
    pub args: String,
    /// Serialized keyword arguments, hex-encoded. Opaque to the worker.
    pub kwargs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Environment variables exported into the session before user code runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

impl ExecuteRequest {
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.function_id.is_empty() {
            return Err(ExecError::RequestMalformed("function_id is empty".into()));
        }
        if self.code.is_empty() {
            return Err(ExecError::RequestMalformed("code is empty".into()));
        }
        if self.function_name.is_empty() {
            return Err(ExecError::RequestMalformed("function_name is empty".into()));
        }
        validate_hex("args", &self.args)?;
        validate_hex("kwargs", &self.kwargs)?;
        validate_timeout(self.timeout)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// Batch execution request: run `function_name` once per item, each item an
/// opaque hex payload holding one serialized argument.
///
/// `items[i]` corresponds to `results[i]` in the response; concurrency never
/// reorders outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteBatchRequest {
    pub function_id: String,
    pub code: String,
    pub function_name: String,
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_containers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ExecuteBatchRequest {
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.function_id.is_empty() {
            return Err(ExecError::RequestMalformed("function_id is empty".into()));
        }
        if self.code.is_empty() {
            return Err(ExecError::RequestMalformed("code is empty".into()));
        }
        if self.function_name.is_empty() {
            return Err(ExecError::RequestMalformed("function_name is empty".into()));
        }
        if let Some(c) = self.max_containers {
            if c == 0 {
                return Err(ExecError::RequestMalformed(
                    "max_containers must be >= 1".into(),
                ));
            }
        }
        for (idx, item) in self.items.iter().enumerate() {
            validate_hex(&format!("items[{idx}]"), item)?;
        }
        validate_timeout(self.timeout)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_containers.unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// Payloads are inlined into the generated wrapper script, so anything
/// that is not plain hex must be rejected at the boundary. Empty payloads
/// are valid (no arguments).
fn validate_hex(field: &str, payload: &str) -> Result<(), ExecError> {
    if payload.len() % 2 != 0 || !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ExecError::RequestMalformed(format!(
            "{field} is not a hex payload"
        )));
    }
    Ok(())
}

fn validate_timeout(timeout: Option<u64>) -> Result<(), ExecError> {
    if let Some(t) = timeout {
        if t == 0 || t > MAX_TIMEOUT_SECS {
            return Err(ExecError::RequestMalformed(format!(
                "timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> ExecuteRequest {
        ExecuteRequest {
            function_id: "double_abc12345".into(),
            code: "def double(x):\n    return x * 2\n".into(),
            function_name: "double".into(),
            args: "80049502".into(),
            kwargs: "80047d94".into(),
            timeout: None,
            env: None,
        }
    }

    fn batch() -> ExecuteBatchRequest {
        ExecuteBatchRequest {
            function_id: "double_abc12345".into(),
            code: "def double(x):\n    return x * 2\n".into(),
            function_name: "double".into(),
            items: vec!["01".into(), "02".into()],
            max_containers: None,
            timeout: None,
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(single().timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(batch().max_concurrency(), DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn valid_requests_pass() {
        assert!(single().validate().is_ok());
        assert!(batch().validate().is_ok());
    }

    #[test]
    fn zero_max_containers_rejected() {
        let mut req = batch();
        req.max_containers = Some(0);
        assert!(matches!(
            req.validate(),
            Err(ExecError::RequestMalformed(_))
        ));
    }

    #[test]
    fn timeout_bounds_enforced() {
        let mut req = single();
        req.timeout = Some(0);
        assert!(req.validate().is_err());
        req.timeout = Some(MAX_TIMEOUT_SECS + 1);
        assert!(req.validate().is_err());
        req.timeout = Some(MAX_TIMEOUT_SECS);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_fields_rejected() {
        let mut req = single();
        req.function_name = String::new();
        assert!(req.validate().is_err());

        let mut req = batch();
        req.code = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_items_is_valid() {
        let mut req = batch();
        req.items.clear();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn non_hex_payloads_rejected() {
        let mut req = single();
        req.args = "\" + __import__('os').system('id') + \"".into();
        assert!(matches!(
            req.validate(),
            Err(ExecError::RequestMalformed(msg)) if msg.contains("args")
        ));

        let mut req = single();
        req.kwargs = "zz".into();
        assert!(req.validate().is_err());

        let mut req = batch();
        req.items[1] = "0g".into();
        assert!(matches!(
            req.validate(),
            Err(ExecError::RequestMalformed(msg)) if msg.contains("items[1]")
        ));
    }

    #[test]
    fn odd_length_hex_rejected() {
        let mut req = single();
        req.args = "abc".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_payloads_are_valid_hex() {
        let mut req = single();
        req.args = String::new();
        req.kwargs = String::new();
        assert!(req.validate().is_ok());
    }
}
