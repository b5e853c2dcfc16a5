use crate::selection::SelectionOption;
use crate::session::SessionState;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    Text(String),
    Table(Table),
}

#[derive(Clone, Debug)]
pub enum Event {
    Output(Output),
    GridInfo(String),
    SessionStateChanged { state: SessionState },
    SelectionOpened { options: Vec<SelectionOption> },
    SelectionClosed,
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn text(&self, text: impl Into<String>) {
        self.send(Event::Output(Output::Text(text.into())));
    }

    pub fn table(&self, table: Table) {
        self.send(Event::Output(Output::Table(table)));
    }

    pub fn grid_info(&self, text: impl Into<String>) {
        self.send(Event::GridInfo(text.into()));
    }
}
