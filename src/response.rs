//! Parsing of single control channel lines.

use std::fmt;
use std::str::FromStr;

use super::status;
use super::types::{FtpError, Result};

/// One status line read from the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub code: u32,
    pub message: String,
}

impl ControlResponse {
    /// Parses a line without its trailing newline. The code is everything up
    /// to the first space and must be a recognised status code.
    pub fn parse(line: &str) -> Result<ControlResponse> {
        let (code, message) = match line.find(' ') {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };

        let code: u32 = code.parse().map_err(|err| {
            FtpError::InvalidResponse(format!("could not parse reply code in {:?}: {}", line, err))
        })?;

        if !status::is_known(code) {
            return Err(FtpError::InvalidResponse(format!("unknown reply code {}", code)));
        }

        Ok(ControlResponse {
            code,
            message: message.to_owned(),
        })
    }

    pub fn is(&self, code: u32) -> bool {
        self.code == code
    }
}

impl FromStr for ControlResponse {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Self> {
        ControlResponse::parse(s)
    }
}

impl fmt::Display for ControlResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message)
        }
    }
}
