// src/exec/command.rs

use std::fmt;

use crate::errors::{Result, SupervisorError};

/// Program path followed by its arguments.
///
/// Always holds at least the program. Arguments are passed to the OS as-is;
/// nothing here interprets or escapes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    parts: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(SupervisorError::EmptyCommand);
        }
        Ok(Self { parts })
    }

    pub fn program(&self) -> &str {
        &self.parts[0]
    }

    pub fn args(&self) -> &[String] {
        &self.parts[1..]
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(" "))
    }
}
