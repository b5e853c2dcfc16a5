use crate::config::{GridEndpoint, WapiOptions};
use crate::error::WapiError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct WapiResponse {
    pub status: u16,
    pub body: Value,
}

impl WapiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn first_object(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            Value::Array(items) => items.first().and_then(Value::as_object),
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> ApiDiagnostic {
        if let Value::String(text) = &self.body {
            return ApiDiagnostic {
                code: None,
                text: Some(text.clone()).filter(|t| !t.trim().is_empty()),
            };
        }
        let Some(obj) = self.first_object() else {
            return ApiDiagnostic::default();
        };
        let field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        ApiDiagnostic {
            code: field("code"),
            text: field("text").or_else(|| field("Error")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiDiagnostic {
    pub code: Option<String>,
    pub text: Option<String>,
}

impl fmt::Display for ApiDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [self.code.as_deref(), self.text.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            write!(f, "no diagnostic")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

pub fn return_fields(fields: &[&str]) -> String {
    fields.join(",")
}

#[async_trait]
pub trait GridClient: Send + Sync {
    fn set_endpoint(&mut self, endpoint: GridEndpoint);

    fn endpoint(&self) -> &GridEndpoint;

    async fn connect(&mut self, username: &str, password: &str) -> Result<(), WapiError>;

    async fn get(&self, resource: &str, query: &[(&str, &str)]) -> Result<WapiResponse, WapiError>;
}

pub struct WapiClient {
    http: reqwest::Client,
    endpoint: GridEndpoint,
    connected: bool,
}

impl WapiClient {
    pub fn new(options: &WapiOptions) -> Result<Self, WapiError> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!options.verify_tls);
        if options.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(options.timeout_ms));
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: GridEndpoint::default(),
            connected: false,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.base_url(),
            resource.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl GridClient for WapiClient {
    fn set_endpoint(&mut self, endpoint: GridEndpoint) {
        self.endpoint = endpoint;
        self.connected = false;
    }

    fn endpoint(&self) -> &GridEndpoint {
        &self.endpoint
    }

    async fn connect(&mut self, username: &str, password: &str) -> Result<(), WapiError> {
        if self.endpoint.grid_address.trim().is_empty() {
            return Err(WapiError::MissingAddress);
        }
        self.connected = false;
        let url = self.url("grid");
        debug!(url = %url, user = %username, "wapi login");
        let resp = self
            .http
            .get(&url)
            .query(&[("_return_fields", "name")])
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(grid = %self.endpoint.grid_address, status = status.as_u16(), "wapi login refused");
            return Err(WapiError::Auth(status.to_string()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(WapiError::Rejected {
                status: status.as_u16(),
                text,
            });
        }
        self.connected = true;
        info!(grid = %self.endpoint.grid_address, version = %self.endpoint.wapi_version, "wapi session established");
        Ok(())
    }

    async fn get(&self, resource: &str, query: &[(&str, &str)]) -> Result<WapiResponse, WapiError> {
        if !self.connected {
            return Err(WapiError::NotConnected);
        }
        let url = self.url(resource);
        debug!(url = %url, "wapi get");
        let resp = self.http.get(&url).query(query).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(WapiResponse { status, body })
    }
}
