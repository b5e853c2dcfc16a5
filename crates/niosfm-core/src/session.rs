use crate::error::CoreError;
use crate::events::{Event, EventBus};
use niosfm_wapi::{return_fields, GridClient, GridEndpoint, WapiError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

pub const NOT_CONNECTED: &str = "Not Connected";

const GRID_RESOURCE: &str = "grid";
const GRID_FIELDS: &[&str] = &["name", "service_status"];

pub type ClientFactory = Arc<dyn Fn() -> Result<Box<dyn GridClient>, WapiError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub grid_address: String,
    pub wapi_version: String,
    pub username: Option<String>,
}

impl Session {
    fn disconnected(wapi_version: &str) -> Self {
        Self {
            state: SessionState::Disconnected,
            grid_address: String::new(),
            wapi_version: wapi_version.to_string(),
            username: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridInfo {
    pub name: String,
    pub service_status: Option<String>,
}

impl GridInfo {
    fn from_object(obj: &serde_json::Map<String, Value>) -> Self {
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let service_status = match obj.get("service_status") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        Self {
            name,
            service_status,
        }
    }

    pub fn render(&self, grid_address: &str) -> String {
        format!(
            "Infoblox Grid: {}\nGrid Manager: {}\nService Status: {}",
            self.name,
            grid_address,
            self.service_status.as_deref().unwrap_or("unknown")
        )
    }
}

pub struct ConnectionManager {
    factory: ClientFactory,
    wapi_version: String,
    session: Session,
    client: Option<Box<dyn GridClient>>,
    bus: EventBus,
}

impl ConnectionManager {
    pub fn new(factory: ClientFactory, wapi_version: impl Into<String>, bus: EventBus) -> Self {
        let wapi_version = wapi_version.into();
        Self {
            factory,
            session: Session::disconnected(&wapi_version),
            wapi_version,
            client: None,
            bus,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn is_connected(&self) -> bool {
        self.session.state == SessionState::Connected && self.client.is_some()
    }

    pub fn client(&self) -> Option<&dyn GridClient> {
        if self.session.state != SessionState::Connected {
            return None;
        }
        self.client.as_deref()
    }

    pub async fn connect(
        &mut self,
        grid_address: &str,
        username: &str,
        password: Zeroizing<String>,
    ) -> Result<(), CoreError> {
        // any previous session is dropped before the new handshake starts
        self.client = None;
        self.session = Session {
            state: SessionState::Connecting,
            grid_address: grid_address.to_string(),
            wapi_version: self.wapi_version.clone(),
            username: Some(username.to_string()),
        };
        self.publish_state();
        info!(grid = %grid_address, user = %username, version = %self.wapi_version, "grid connect start");

        let result = match (self.factory)() {
            Ok(mut client) => {
                client.set_endpoint(GridEndpoint::new(grid_address, self.wapi_version.clone()));
                let outcome = client.connect(username, password.as_str()).await;
                outcome.map(|()| client)
            }
            Err(err) => Err(err),
        };
        drop(password);

        match result {
            Ok(client) => {
                self.client = Some(client);
                self.session.state = SessionState::Connected;
                self.publish_state();
                info!(grid = %grid_address, user = %username, "grid connected");
                self.bus
                    .text(format!("Connected to {} as {}", grid_address, username));
                let _ = self.refresh_grid_info().await;
                Ok(())
            }
            Err(err) => {
                error!(grid = %grid_address, error = %err, "grid connect failed");
                self.session = Session::disconnected(&self.wapi_version);
                self.publish_state();
                self.bus.text(format!("Connect failed: {}", err));
                self.bus.grid_info(NOT_CONNECTED);
                Err(CoreError::Wapi(err))
            }
        }
    }

    pub async fn refresh_grid_info(&self) -> Result<Option<GridInfo>, CoreError> {
        let Some(client) = self.client() else {
            self.bus.grid_info(NOT_CONNECTED);
            return Ok(None);
        };
        let fields = return_fields(GRID_FIELDS);
        let resp = match client
            .get(GRID_RESOURCE, &[("_return_fields", fields.as_str())])
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "grid info read failed");
                self.bus.grid_info(format!("Grid info unavailable: {}", err));
                return Err(CoreError::Wapi(err));
            }
        };
        if !resp.is_ok() {
            let diag = resp.diagnostic();
            warn!(status = resp.status, diagnostic = %diag, "grid info rejected");
            self.bus.grid_info(format!(
                "{} {} {}",
                resp.status,
                diag.code.as_deref().unwrap_or("-"),
                diag.text.as_deref().unwrap_or("-")
            ));
            return Ok(None);
        }
        let Some(info) = resp.first_object().map(GridInfo::from_object) else {
            let err = CoreError::Invalid("grid info reply carries no object".to_string());
            warn!(error = %err, "grid info unreadable");
            self.bus.grid_info(format!("Grid info unavailable: {}", err));
            return Err(err);
        };
        self.bus.grid_info(info.render(&self.session.grid_address));
        Ok(Some(info))
    }

    fn publish_state(&self) {
        self.bus.send(Event::SessionStateChanged {
            state: self.session.state,
        });
    }
}
