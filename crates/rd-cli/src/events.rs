use std::fs;
use std::path::Path;

use rd_core::error::SinkError;
use rd_core::interceptor::NavigationCommandSink;
use rd_core::types::{NavigationCommand, NavigationEvent};

use crate::error::CliError;

/// Parse newline-delimited JSON events. Blank lines and `#` comments are skipped.
pub fn parse_events(text: &str) -> Result<Vec<NavigationEvent>, CliError> {
    let mut events = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event = serde_json::from_str(line).map_err(|source| CliError::Event {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }

    Ok(events)
}

pub fn read_events(path: &Path) -> Result<Vec<NavigationEvent>, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_events(&text)
}

/// Prints each command instead of navigating a real tab.
pub struct PrintSink;

impl NavigationCommandSink for PrintSink {
    fn navigate(&self, command: &NavigationCommand) -> Result<(), SinkError> {
        println!("redirect tab {} -> {}", command.tab_id, command.url);
        Ok(())
    }
}
