pub mod client;
pub mod config;
pub mod error;

pub use client::{return_fields, ApiDiagnostic, GridClient, WapiClient, WapiResponse};
pub use config::{GridEndpoint, WapiOptions, DEFAULT_WAPI_VERSION};
pub use error::WapiError;
