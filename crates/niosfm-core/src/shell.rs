use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::listing::{FileRef, ListingCache};
use crate::router::{self, HandlerFuture, Route};
use crate::selection::{DownloadHook, SelectionOutcome, SelectionWorkflow};
use crate::session::{ConnectionManager, Session};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

pub const NEEDS_SESSION: &str =
    "list requires a live session. Run: connect <grid_mgr> <username> <password>";
pub const NO_FILES: &str = "No files loaded yet. Run your list command first.";
pub const SELECTION_PENDING: &str = "A file selection is open. Pick a file or cancel it first.";
pub const CANCELLED: &str = "Download cancelled.";

pub struct GridShell {
    connection: ConnectionManager,
    listing: ListingCache,
    selection: SelectionWorkflow,
    download: Arc<dyn DownloadHook>,
    bus: EventBus,
}

impl GridShell {
    pub fn new(
        connection: ConnectionManager,
        listing: ListingCache,
        download: Arc<dyn DownloadHook>,
        bus: EventBus,
    ) -> Self {
        Self {
            connection,
            listing,
            selection: SelectionWorkflow::new(),
            download,
            bus,
        }
    }

    pub fn session(&self) -> &Session {
        self.connection.session()
    }

    pub fn listing(&self) -> &ListingCache {
        &self.listing
    }

    pub fn selection(&self) -> &SelectionWorkflow {
        &self.selection
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn submit(&mut self, raw: &str) {
        let route = router::route(raw);
        if route == Route::Empty {
            return;
        }
        if self.selection.is_active() {
            self.bus.text(SELECTION_PENDING);
            return;
        }
        match route {
            Route::Empty => {}
            Route::Reject(message) => self.bus.text(message),
            Route::Dispatch { command, args } => {
                debug!(command = command.name, args = args.len(), "dispatch");
                (command.handler)(self, args).await;
            }
        }
    }

    pub fn pick(&mut self, reference: &FileRef) -> Result<(), CoreError> {
        self.selection.pick(reference, &self.listing)
    }

    pub fn cancel_selection(&mut self) -> Result<(), CoreError> {
        self.selection.cancel()
    }

    fn cmd_help(&self) {
        self.bus.text(router::help_text());
    }

    async fn cmd_connect(&mut self, args: Vec<String>) {
        let [grid_mgr, username, password]: [String; 3] = match args.try_into() {
            Ok(args) => args,
            Err(_) => {
                self.bus.text(connect_usage());
                return;
            }
        };
        let password = Zeroizing::new(password);
        if grid_mgr.trim().is_empty() {
            self.bus
                .text(format!("grid_mgr cannot be empty. {}", connect_usage()));
            return;
        }
        if username.trim().is_empty() || password.is_empty() {
            self.bus.text(format!(
                "Username/password cannot be empty. {}",
                connect_usage()
            ));
            return;
        }
        self.listing.clear();
        if let Err(err) = self
            .connection
            .connect(grid_mgr.trim(), username.trim(), password)
            .await
        {
            debug!(error = %err, "connect reported to user");
        }
    }

    async fn cmd_list(&mut self) {
        let Some(client) = self.connection.client() else {
            self.bus.text(NEEDS_SESSION);
            return;
        };
        if let Err(err) = self.listing.refresh(client, &self.bus).await {
            debug!(error = %err, "list reported to user");
        }
    }

    fn cmd_download(&mut self) {
        if self.listing.is_empty() {
            self.bus.text(NO_FILES);
            return;
        }
        let bus = self.bus.clone();
        let download = self.download.clone();
        let completion = Box::new(move |outcome: SelectionOutcome| {
            match outcome {
                SelectionOutcome::Selected(entry) => {
                    bus.text(format!("Selected {} ({})", entry.name, entry.reference));
                    download.download(&entry);
                }
                SelectionOutcome::Cancelled => bus.text(CANCELLED),
            }
            bus.send(Event::SelectionClosed);
        });
        match self.selection.begin(self.listing.files(), completion) {
            Ok(options) => {
                self.bus.text(format!(
                    "Select a file to download ({} available).",
                    options.len()
                ));
                self.bus.send(Event::SelectionOpened { options });
            }
            Err(err) => self.bus.text(format!("Download unavailable: {}", err)),
        }
    }
}

pub(crate) fn handle_help(shell: &mut GridShell, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move { shell.cmd_help() })
}

pub(crate) fn handle_connect(shell: &mut GridShell, args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(shell.cmd_connect(args))
}

pub(crate) fn handle_list(shell: &mut GridShell, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(shell.cmd_list())
}

pub(crate) fn handle_download(shell: &mut GridShell, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move { shell.cmd_download() })
}

fn connect_usage() -> String {
    router::lookup("connect")
        .map(router::usage)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::FileEntry;
    use crate::session::SessionState;
    use crate::testing::{directory, drain, file, grid_info_lines, tables, texts, FakeGrid};
    use niosfm_wapi::WapiResponse;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDownload {
        seen: Mutex<Vec<FileEntry>>,
    }

    impl DownloadHook for RecordingDownload {
        fn download(&self, entry: &FileEntry) {
            self.seen.lock().unwrap().push(entry.clone());
        }
    }

    fn listing() -> WapiResponse {
        WapiResponse::new(
            200,
            json!([
                file("ipxe.efi", "tftpfiledir/1:FILE/ipxe.efi", 1700000000),
                directory("images", "tftpfiledir/2:DIRECTORY/images"),
                file("ipxe.efi", "tftpfiledir/3:FILE/images/ipxe.efi", 1700000500),
            ]),
        )
    }

    fn shell(grid: &FakeGrid) -> (GridShell, Arc<RecordingDownload>) {
        let bus = EventBus::new(256);
        let hook = Arc::new(RecordingDownload::default());
        let connection = ConnectionManager::new(grid.factory(), "2.13", bus.clone());
        let shell = GridShell::new(connection, ListingCache::new("/"), hook.clone(), bus);
        (shell, hook)
    }

    #[tokio::test]
    async fn connect_scenario_reports_session_and_grid_info() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("connect gridmgr.example.com admin secret").await;

        assert_eq!(shell.session().state, SessionState::Connected);
        let events = drain(&mut rx);
        assert_eq!(
            texts(&events),
            vec!["Connected to gridmgr.example.com as admin".to_string()]
        );
        assert!(grid_info_lines(&events)[0].starts_with("Infoblox Grid: "));
    }

    #[tokio::test]
    async fn wrong_arity_connect_makes_no_network_call() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("connect gridmgr.example.com admin").await;
        shell.submit("connect a b c d").await;

        assert_eq!(grid.built(), 0);
        assert_eq!(grid.connects(), 0);
        assert_eq!(
            texts(&drain(&mut rx)),
            vec![
                "Usage: connect <grid_mgr> <username> <password>".to_string(),
                "Usage: connect <grid_mgr> <username> <password>".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn blank_connect_fields_are_rejected_locally() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit(r#"connect "  " admin secret"#).await;
        shell.submit(r#"connect gm.example.com " " secret"#).await;
        shell.submit(r#"connect gm.example.com admin """#).await;

        assert_eq!(grid.built(), 0);
        let out = texts(&drain(&mut rx));
        assert_eq!(out.len(), 3);
        assert!(out[0].starts_with("grid_mgr cannot be empty."));
        assert!(out[1].starts_with("Username/password cannot be empty."));
        assert!(out[2].starts_with("Username/password cannot be empty."));
        assert!(out.iter().all(|m| m.contains("Usage: connect")));
    }

    #[tokio::test]
    async fn failed_connect_leaves_session_disconnected() {
        let grid = FakeGrid::rejecting();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("connect gm.example.com admin wrong").await;

        assert_eq!(shell.session().state, SessionState::Disconnected);
        let events = drain(&mut rx);
        assert!(texts(&events)[0].starts_with("Connect failed:"));
        assert_eq!(grid_info_lines(&events), vec!["Not Connected".to_string()]);
        assert!(grid.gets().is_empty());
    }

    #[tokio::test]
    async fn list_without_session_needs_connect() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("list").await;

        assert_eq!(grid.built(), 0);
        assert!(grid.gets().is_empty());
        let out = texts(&drain(&mut rx));
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("requires a live session"));
    }

    #[tokio::test]
    async fn download_before_list_opens_nothing() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("download").await;

        let events = drain(&mut rx);
        assert_eq!(texts(&events), vec![NO_FILES.to_string()]);
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::SelectionOpened { .. })));
        assert!(!shell.selection().is_active());
    }

    #[tokio::test]
    async fn list_twice_keeps_file_subset_size() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, _) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        let mut rx = shell.bus().subscribe();

        shell.submit("list").await;
        let first = shell.listing().files().len();
        shell.submit("LIST").await;
        let second = shell.listing().files().len();

        assert_eq!(first, 2);
        assert_eq!(second, 2);
        let tables = tables(&drain(&mut rx));
        assert_eq!(tables.len(), 2);
        assert!(tables.iter().all(|t| t.len() == 3));
    }

    #[tokio::test]
    async fn selection_picks_by_reference_and_invokes_hook() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, hook) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        shell.submit("list").await;
        let mut rx = shell.bus().subscribe();

        shell.submit("download").await;
        let events = drain(&mut rx);
        let options = events
            .iter()
            .find_map(|e| match e {
                Event::SelectionOpened { options } => Some(options.clone()),
                _ => None,
            })
            .expect("selection opened");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, options[1].label);

        shell.pick(&options[1].reference).unwrap();

        let seen = hook.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reference.as_str(), "tftpfiledir/3:FILE/images/ipxe.efi");
        let events = drain(&mut rx);
        assert_eq!(
            texts(&events),
            vec!["Selected ipxe.efi (tftpfiledir/3:FILE/images/ipxe.efi)".to_string()]
        );
        assert!(matches!(events.last(), Some(Event::SelectionClosed)));
    }

    #[tokio::test]
    async fn cancel_never_downloads() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, hook) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        shell.submit("list").await;
        shell.submit("download").await;
        let mut rx = shell.bus().subscribe();

        shell.cancel_selection().unwrap();

        assert!(hook.seen.lock().unwrap().is_empty());
        let events = drain(&mut rx);
        assert_eq!(texts(&events), vec![CANCELLED.to_string()]);
        assert!(matches!(events.last(), Some(Event::SelectionClosed)));
        assert!(!shell.selection().is_active());
    }

    #[tokio::test]
    async fn pipeline_is_suspended_while_selecting() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, _) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        shell.submit("list").await;
        shell.submit("download").await;
        let gets_before = grid.gets().len();
        let mut rx = shell.bus().subscribe();

        shell.submit("list").await;
        shell.submit("").await;

        assert_eq!(grid.gets().len(), gets_before);
        assert_eq!(texts(&drain(&mut rx)), vec![SELECTION_PENDING.to_string()]);
        assert!(shell.selection().is_active());
    }

    #[tokio::test]
    async fn failed_list_after_success_keeps_previous_files() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, _) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        shell.submit("list").await;

        grid.set_listing(WapiResponse::new(
            401,
            json!({ "Error": "AdmConProtoError: session expired", "code": "Client.Ibap.Auth" }),
        ));
        let mut rx = shell.bus().subscribe();
        shell.submit("list").await;

        assert_eq!(shell.listing().files().len(), 2);
        assert_eq!(shell.session().state, SessionState::Connected);
        assert_eq!(
            texts(&drain(&mut rx)),
            vec!["401 AdmConProtoError: session expired".to_string()]
        );
    }

    #[tokio::test]
    async fn reconnect_forgets_previous_listing() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, hook) = shell(&grid);
        shell.submit("connect gm1.example.com admin secret").await;
        shell.submit("list").await;
        assert_eq!(shell.listing().files().len(), 2);
        let generation = shell.listing().generation();

        shell.submit("connect gm2.example.com admin secret").await;
        assert!(shell.listing().is_empty());
        assert!(shell.listing().generation() > generation);

        let mut rx = shell.bus().subscribe();
        shell.submit("download").await;
        assert_eq!(texts(&drain(&mut rx)), vec![NO_FILES.to_string()]);
        assert!(!shell.selection().is_active());
        assert!(hook.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_reconnect_forgets_previous_listing() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, _) = shell(&grid);
        shell.submit("connect gm1.example.com admin secret").await;
        shell.submit("list").await;

        grid.set_accept_login(false);
        shell.submit("connect gm2.example.com admin wrong").await;

        assert_eq!(shell.session().state, SessionState::Disconnected);
        let mut rx = shell.bus().subscribe();
        shell.submit("download").await;
        assert_eq!(texts(&drain(&mut rx)), vec![NO_FILES.to_string()]);
    }

    #[tokio::test]
    async fn list_transport_failure_is_reported_and_keeps_state() {
        let grid = FakeGrid::new().with_listing(listing());
        let (mut shell, _) = shell(&grid);
        shell.submit("connect gm.example.com admin secret").await;
        shell.submit("list").await;
        let before = shell.listing().files().to_vec();
        let generation = shell.listing().generation();

        grid.fail_reads("operation timed out");
        let mut rx = shell.bus().subscribe();
        shell.submit("list").await;

        let events = drain(&mut rx);
        assert_eq!(
            texts(&events),
            vec!["List failed: transport error: operation timed out".to_string()]
        );
        assert!(tables(&events).is_empty());
        assert_eq!(shell.session().state, SessionState::Connected);
        assert_eq!(shell.listing().files(), before.as_slice());
        assert_eq!(shell.listing().generation(), generation);

        grid.restore_reads();
        shell.submit("list").await;
        assert_eq!(shell.listing().generation(), generation + 1);
    }

    #[tokio::test]
    async fn grid_info_transport_failure_is_reported_after_connect() {
        let grid = FakeGrid::new();
        grid.fail_reads("connection reset by peer");
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("connect gm.example.com admin secret").await;

        assert_eq!(shell.session().state, SessionState::Connected);
        let events = drain(&mut rx);
        assert_eq!(
            texts(&events),
            vec!["Connected to gm.example.com as admin".to_string()]
        );
        assert_eq!(
            grid_info_lines(&events),
            vec!["Grid info unavailable: transport error: connection reset by peer".to_string()]
        );
        assert!(shell.listing().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_malformed_lines_get_one_message_each() {
        let grid = FakeGrid::new();
        let (mut shell, _) = shell(&grid);
        let mut rx = shell.bus().subscribe();

        shell.submit("frobnicate").await;
        shell.submit("connect \"gm admin secret").await;
        shell.submit("   ").await;
        shell.submit("Help").await;

        let out = texts(&drain(&mut rx));
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "Unknown command: 'frobnicate' (try: help)");
        assert!(out[1].starts_with("Parse error:"));
        assert!(out[2].starts_with("Commands:"));
    }
}
