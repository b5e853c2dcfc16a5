use crate::shell::{self, GridShell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub type Handler = for<'a> fn(&'a mut GridShell, Vec<String>) -> HandlerFuture<'a>;

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub arity: usize,
    pub handler: Handler,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CommandSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CommandSpec {}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        usage: "help",
        arity: 0,
        handler: shell::handle_help,
    },
    CommandSpec {
        name: "connect",
        usage: "connect <grid_mgr> <username> <password>",
        arity: 3,
        handler: shell::handle_connect,
    },
    CommandSpec {
        name: "list",
        usage: "list",
        arity: 0,
        handler: shell::handle_list,
    },
    CommandSpec {
        name: "download",
        usage: "download",
        arity: 0,
        handler: shell::handle_download,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

pub fn usage(spec: &CommandSpec) -> String {
    format!("Usage: {}", spec.usage)
}

pub fn help_text() -> String {
    let mut out = String::from("Commands:");
    for spec in COMMANDS {
        out.push_str("\n- ");
        out.push_str(spec.usage);
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(raw: &str) -> Result<Option<Self>, shell_words::ParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let mut parts = shell_words::split(raw)?.into_iter();
        Ok(parts.next().map(|name| Command {
            name,
            args: parts.collect(),
        }))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Empty,
    Dispatch {
        command: &'static CommandSpec,
        args: Vec<String>,
    },
    Reject(String),
}

pub fn route(raw: &str) -> Route {
    let command = match Command::parse(raw) {
        Ok(Some(command)) => command,
        Ok(None) => return Route::Empty,
        Err(err) => return Route::Reject(format!("Parse error: {}", err)),
    };
    let Some(spec) = lookup(&command.name) else {
        return Route::Reject(format!("Unknown command: '{}' (try: help)", command.name));
    };
    if command.args.len() != spec.arity {
        return Route::Reject(usage(spec));
    }
    Route::Dispatch {
        command: spec,
        args: command.args,
    }
}

pub fn redact(raw: &str) -> String {
    let trimmed = raw.trim();
    let tokens = shell_words::split(trimmed)
        .unwrap_or_else(|_| trimmed.split_whitespace().map(str::to_string).collect());
    match tokens.split_first() {
        Some((name, args)) if name.eq_ignore_ascii_case("connect") && args.len() > 2 => {
            format!("{} {} {} ****", name, args[0], args[1])
        }
        _ => trimmed.to_string(),
    }
}
