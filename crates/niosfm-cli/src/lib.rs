use clap::{Parser, Subcommand};
use niosfm_config::{AppConfigLayer, GridConfigLayer, LoggingConfigLayer};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "niosfm", version, about = "niosfm NIOS grid file manager")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub wapi_version: Option<String>,

    /// Skip TLS certificate verification for the grid manager.
    #[arg(long)]
    pub insecure: bool,

    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

impl Cli {
    pub fn overrides(&self) -> AppConfigLayer {
        let grid = if self.wapi_version.is_some() || self.insecure {
            Some(GridConfigLayer {
                wapi_version: self.wapi_version.clone(),
                verify_tls: self.insecure.then_some(false),
                ..Default::default()
            })
        } else {
            None
        };
        let logging = self.log_level.as_ref().map(|level| LoggingConfigLayer {
            level: Some(level.clone()),
            ..Default::default()
        });
        AppConfigLayer {
            grid,
            logging,
            ..Default::default()
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.command.is_none()
    }
}
