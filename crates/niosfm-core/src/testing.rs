use crate::events::{Event, Output, Table};
use crate::session::ClientFactory;
use async_trait::async_trait;
use niosfm_wapi::{GridClient, GridEndpoint, WapiError, WapiResponse};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::Receiver;

// Shared by every client the factory hands out.
#[derive(Clone)]
pub(crate) struct FakeGrid {
    inner: Arc<Mutex<FakeState>>,
}

struct FakeState {
    accept_login: bool,
    grid: WapiResponse,
    listing: WapiResponse,
    read_failure: Option<String>,
    built: usize,
    connects: usize,
    endpoints: Vec<GridEndpoint>,
    gets: Vec<String>,
}

impl FakeGrid {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                accept_login: true,
                grid: WapiResponse::new(
                    200,
                    json!([{ "_ref": "grid/b25lLmNsdXN0ZXIkMA:Infoblox", "name": "Infoblox", "service_status": "WORKING" }]),
                ),
                listing: WapiResponse::new(200, json!([])),
                read_failure: None,
                built: 0,
                connects: 0,
                endpoints: Vec::new(),
                gets: Vec::new(),
            })),
        }
    }

    pub(crate) fn rejecting() -> Self {
        let grid = Self::new();
        grid.set_accept_login(false);
        grid
    }

    pub(crate) fn with_grid(self, resp: WapiResponse) -> Self {
        self.set_grid(resp);
        self
    }

    pub(crate) fn set_grid(&self, resp: WapiResponse) {
        self.inner.lock().unwrap().grid = resp;
    }

    pub(crate) fn fail_reads(&self, detail: &str) {
        self.inner.lock().unwrap().read_failure = Some(detail.to_string());
    }

    pub(crate) fn restore_reads(&self) {
        self.inner.lock().unwrap().read_failure = None;
    }

    pub(crate) fn with_listing(self, resp: WapiResponse) -> Self {
        self.set_listing(resp);
        self
    }

    pub(crate) fn set_listing(&self, resp: WapiResponse) {
        self.inner.lock().unwrap().listing = resp;
    }

    pub(crate) fn set_accept_login(&self, accept: bool) {
        self.inner.lock().unwrap().accept_login = accept;
    }

    pub(crate) fn factory(&self) -> ClientFactory {
        let grid = self.clone();
        Arc::new(move || {
            grid.inner.lock().unwrap().built += 1;
            Ok(Box::new(FakeClient {
                grid: grid.clone(),
                endpoint: GridEndpoint::default(),
                connected: false,
            }) as Box<dyn GridClient>)
        })
    }

    pub(crate) fn built(&self) -> usize {
        self.inner.lock().unwrap().built
    }

    pub(crate) fn connects(&self) -> usize {
        self.inner.lock().unwrap().connects
    }

    pub(crate) fn endpoints(&self) -> Vec<GridEndpoint> {
        self.inner.lock().unwrap().endpoints.clone()
    }

    pub(crate) fn gets(&self) -> Vec<String> {
        self.inner.lock().unwrap().gets.clone()
    }
}

struct FakeClient {
    grid: FakeGrid,
    endpoint: GridEndpoint,
    connected: bool,
}

#[async_trait]
impl GridClient for FakeClient {
    fn set_endpoint(&mut self, endpoint: GridEndpoint) {
        self.endpoint = endpoint;
    }

    fn endpoint(&self) -> &GridEndpoint {
        &self.endpoint
    }

    async fn connect(&mut self, _username: &str, _password: &str) -> Result<(), WapiError> {
        let mut state = self.grid.inner.lock().unwrap();
        state.connects += 1;
        state.endpoints.push(self.endpoint.clone());
        if state.accept_login {
            self.connected = true;
            Ok(())
        } else {
            Err(WapiError::Auth("401 Unauthorized".to_string()))
        }
    }

    async fn get(&self, resource: &str, _query: &[(&str, &str)]) -> Result<WapiResponse, WapiError> {
        if !self.connected {
            return Err(WapiError::NotConnected);
        }
        let mut state = self.grid.inner.lock().unwrap();
        state.gets.push(resource.to_string());
        if let Some(detail) = &state.read_failure {
            return Err(WapiError::Transport(detail.clone()));
        }
        match resource {
            "grid" => Ok(state.grid.clone()),
            _ => Ok(state.listing.clone()),
        }
    }
}

pub(crate) fn file(name: &str, reference: &str, last_modify: i64) -> serde_json::Value {
    json!({ "_ref": reference, "name": name, "type": "FILE", "last_modify": last_modify })
}

pub(crate) fn directory(name: &str, reference: &str) -> serde_json::Value {
    json!({ "_ref": reference, "name": name, "type": "DIRECTORY", "last_modify": 1700000000 })
}

pub(crate) fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub(crate) fn texts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Output(Output::Text(text)) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn tables(events: &[Event]) -> Vec<Table> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Output(Output::Table(table)) => Some(table.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn grid_info_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::GridInfo(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}
