pub mod error;
pub mod events;
pub mod listing;
pub mod router;
pub mod selection;
pub mod session;
pub mod shell;

#[cfg(test)]
mod testing;

pub use error::CoreError;
pub use events::{Event, EventBus, Output, Table};
pub use listing::{FileEntry, FileKind, FileRef, ListingCache};
pub use router::{Command, CommandSpec, Handler, Route, COMMANDS};
pub use selection::{
    Completion, DownloadHook, LogOnlyDownload, SelectionOption, SelectionOutcome,
    SelectionWorkflow,
};
pub use session::{ClientFactory, ConnectionManager, GridInfo, Session, SessionState};
pub use shell::GridShell;
