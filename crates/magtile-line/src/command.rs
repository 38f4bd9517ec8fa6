use std::fmt;

use crate::error::{FramingError, Result};

/// A single outbound request: a verb followed by space-separated arguments.
///
/// Tokens are sent verbatim. There is no escaping on the wire, so a token must
/// be non-empty and free of whitespace; [`validate`](Self::validate) enforces
/// that before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<String>,
}

impl Command {
    /// Create a command with no arguments.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// Create a command from a verb and an ordered argument list.
    pub fn with_args<I, T>(verb: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self {
            verb: verb.into(),
            args: args.into_iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Check every token can be sent unambiguously.
    pub fn validate(&self) -> Result<()> {
        std::iter::once(&self.verb)
            .chain(&self.args)
            .try_for_each(|token| validate_token(token))
    }

    /// Parse a wire line (with or without its trailing newline).
    ///
    /// Tokens are separated by single spaces, so `Command::parse` undoes
    /// [`encode_command`](crate::encode_command) exactly.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut tokens = line.split(' ');
        // split always yields at least one item
        let verb = tokens.next().unwrap_or_default().to_string();
        let command = Self {
            verb,
            args: tokens.map(str::to_string).collect(),
        };
        command.validate()?;
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.verb)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(FramingError::InvalidToken(token.to_string()));
    }
    Ok(())
}
