pub const DEFAULT_WAPI_VERSION: &str = "2.13";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridEndpoint {
    pub grid_address: String,
    pub wapi_version: String,
}

impl GridEndpoint {
    pub fn new(grid_address: impl Into<String>, wapi_version: impl Into<String>) -> Self {
        Self {
            grid_address: grid_address.into(),
            wapi_version: wapi_version.into(),
        }
    }

    pub fn base_url(&self) -> String {
        let host = self.grid_address.trim().trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            format!("{}/wapi/v{}", host, self.wapi_version)
        } else {
            format!("https://{}/wapi/v{}", host, self.wapi_version)
        }
    }
}

#[derive(Clone, Debug)]
pub struct WapiOptions {
    pub verify_tls: bool,
    pub timeout_ms: u64,
}

impl Default for WapiOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout_ms: 30000,
        }
    }
}
