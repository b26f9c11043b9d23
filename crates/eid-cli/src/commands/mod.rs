pub mod certs;
pub mod dump;
pub mod info;
pub mod photo;
pub mod readers;
pub mod wait;

use std::error::Error;

use eid_card::{CardProfile, SessionManager};

use crate::config::AppConfig;
use crate::formatters::FormatMode;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// State shared by every subcommand
pub struct RunContext {
    pub manager: SessionManager,
    pub config: AppConfig,
    pub profile: CardProfile,
    pub format: FormatMode,
    pub verbose: bool,
}

impl RunContext {
    pub fn new(config: AppConfig, format: FormatMode, verbose: bool) -> Self {
        let profile = config.profile();
        Self {
            manager: SessionManager::new(),
            config,
            profile,
            format,
            verbose,
        }
    }

    /// Configured reader, or the first one PC/SC reports
    pub fn reader(&self) -> Result<String, Box<dyn Error>> {
        match &self.config.reader {
            Some(name) => Ok(name.clone()),
            None => Ok(self.manager.default_reader()?),
        }
    }
}
