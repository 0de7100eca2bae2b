//! Tokenizing of user command lines.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use super::types::{FtpError, Result};

lazy_static! {
    // A quoted token runs to the next quote not preceded by a backslash.
    static ref QUOTED_RE: Regex = Regex::new(r#"^"((?:[^"\\]|\\.)*)""#).unwrap();

    // A bare token runs to the next space.
    static ref BARE_RE: Regex = Regex::new(r"^[^ ]+").unwrap();

    static ref ESCAPE_RE: Regex = Regex::new(r"\\(.)").unwrap();
}

/// The commands a logged in session can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    ChangeDirectory,
    MakeDirectory,
    Remove,
    Get,
    Put,
}

impl Verb {
    /// The keyword typed by the user.
    pub fn keyword(&self) -> &'static str {
        match *self {
            Verb::List => "ls",
            Verb::ChangeDirectory => "cd",
            Verb::MakeDirectory => "mkdir",
            Verb::Remove => "rm",
            Verb::Get => "get",
            Verb::Put => "put",
        }
    }
}

impl FromStr for Verb {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Verb> {
        match s.to_lowercase().as_str() {
            "ls" => Ok(Verb::List),
            "cd" => Ok(Verb::ChangeDirectory),
            "mkdir" => Ok(Verb::MakeDirectory),
            "rm" => Ok(Verb::Remove),
            "get" => Ok(Verb::Get),
            "put" => Ok(Verb::Put),
            _ => Err(FtpError::InvalidCommand(format!("unknown command: {}", s))),
        }
    }
}

/// A parsed user command. Argument counts are checked by the session, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    pub verb: Verb,
    pub arguments: Vec<String>,
}

impl ClientCommand {
    /// Splits `line` into a verb and its quote aware arguments.
    ///
    /// ```
    /// use activeftp::command::{ClientCommand, Verb};
    ///
    /// let cmd = ClientCommand::parse(r#"mkdir "a b""#).unwrap();
    /// assert_eq!(cmd.verb, Verb::MakeDirectory);
    /// assert_eq!(cmd.arguments, vec!["a b".to_string()]);
    /// ```
    pub fn parse(line: &str) -> Result<ClientCommand> {
        let line = line.trim();
        let (verb, mut rest) = match line.find(' ') {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };
        let verb: Verb = verb.parse()?;

        let mut arguments = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }

            if rest.starts_with('"') {
                let caps = QUOTED_RE.captures(rest).ok_or_else(|| {
                    FtpError::InvalidCommand(format!("unterminated quote in: {}", line))
                })?;
                arguments.push(ESCAPE_RE.replace_all(&caps[1], "$1").into_owned());
                rest = &rest[caps[0].len()..];
            } else {
                // rest is non-empty and does not start with a space
                let end = BARE_RE.find(rest).map_or(rest.len(), |m| m.end());
                arguments.push(rest[..end].to_owned());
                rest = &rest[end..];
            }
        }

        Ok(ClientCommand { verb, arguments })
    }

    pub(crate) fn expect_arguments(&self, min: usize, max: usize) -> Result<()> {
        let count = self.arguments.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("{}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(FtpError::InvalidCommand(format!(
                "{} takes {} argument(s), got {}",
                self.verb.keyword(),
                expected,
                count
            )));
        }
        Ok(())
    }
}

impl FromStr for ClientCommand {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Self> {
        ClientCommand::parse(s)
    }
}

/// Renders the command back into a line that parses to the same value.
impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.verb.keyword())?;
        for arg in &self.arguments {
            if arg.is_empty() || arg.contains(' ') || arg.starts_with('"') {
                write!(f, " \"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
