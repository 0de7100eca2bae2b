#![crate_name = "activeftp"]
#![crate_type = "lib"]

//! activeftp is the protocol engine of a simple FTP client. Transfers run in
//! active mode: the client listens and the server opens the data connection.
//!
//! ### Usage
//!
//! ```rust,no_run
//! use activeftp::{FtpSession, LoginStatus, Outcome};
//!
//! let mut session = FtpSession::connect("127.0.0.1", 6788, 6789).unwrap();
//! if session.login_with_username("alice").unwrap() == LoginStatus::PasswordRequired {
//!     session.login_with_password("secret").unwrap();
//! }
//! match session.execute("get notes.txt").unwrap() {
//!     Outcome::Success => println!("downloaded"),
//!     other => println!("{:?}", other),
//! }
//! session.close();
//! ```
//!

#[macro_use]
extern crate lazy_static;

mod control;
mod data_stream;
mod ftp;
pub mod command;
pub mod config;
pub mod response;
pub mod status;
pub mod types;

pub use self::command::{ClientCommand, Verb};
pub use self::config::SessionConfig;
pub use self::ftp::{FtpSession, SessionState};
pub use self::response::ControlResponse;
pub use self::types::{FtpError, LoginStatus, Outcome, PendingUpload, Result};
