use crate::error::CoreError;
use crate::listing::{FileEntry, FileRef, ListingCache};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionOption {
    pub label: String,
    pub reference: FileRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected(FileEntry),
    Cancelled,
}

pub type Completion = Box<dyn FnOnce(SelectionOutcome) + Send>;

pub trait DownloadHook: Send + Sync {
    fn download(&self, entry: &FileEntry);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogOnlyDownload;

impl DownloadHook for LogOnlyDownload {
    fn download(&self, entry: &FileEntry) {
        info!(file = %entry.name, reference = %entry.reference, "download requested");
    }
}

struct ActiveSelection {
    options: Vec<SelectionOption>,
    completion: Completion,
}

#[derive(Default)]
pub struct SelectionWorkflow {
    active: Option<ActiveSelection>,
}

impl SelectionWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn options(&self) -> &[SelectionOption] {
        self.active
            .as_ref()
            .map(|a| a.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn begin(
        &mut self,
        candidates: &[FileEntry],
        completion: Completion,
    ) -> Result<Vec<SelectionOption>, CoreError> {
        if self.active.is_some() {
            return Err(CoreError::SelectionActive);
        }
        if candidates.is_empty() {
            return Err(CoreError::NoFiles);
        }
        let options: Vec<SelectionOption> = candidates
            .iter()
            .map(|entry| SelectionOption {
                label: entry.name.clone(),
                reference: entry.reference.clone(),
            })
            .collect();
        debug!(candidates = options.len(), "selection opened");
        self.active = Some(ActiveSelection {
            options: options.clone(),
            completion,
        });
        Ok(options)
    }

    pub fn pick(&mut self, reference: &FileRef, cache: &ListingCache) -> Result<(), CoreError> {
        let active = self.active.as_ref().ok_or(CoreError::NoSelection)?;
        if !active.options.iter().any(|o| &o.reference == reference) {
            return Err(CoreError::NotFound);
        }
        let entry = cache.resolve(reference).cloned().ok_or(CoreError::NotFound)?;
        if let Some(active) = self.active.take() {
            (active.completion)(SelectionOutcome::Selected(entry));
        }
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CoreError> {
        let active = self.active.take().ok_or(CoreError::NoSelection)?;
        debug!("selection cancelled");
        (active.completion)(SelectionOutcome::Cancelled);
        Ok(())
    }
}
