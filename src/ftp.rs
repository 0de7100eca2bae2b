//! FTP session module.

use std::fs::{self, File};
use std::net::TcpStream;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::command::{ClientCommand, Verb};
use super::config::SessionConfig;
use super::control::{self, ControlChannel};
use super::data_stream::{self, DataListener, Direction, Reconciliation, Transfer};
use super::response::ControlResponse;
use super::status;
use super::types::{FtpError, LoginStatus, Outcome, PendingUpload, Result};

/// Where a session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no username sent yet.
    Disconnected,
    /// `USER` sent, reply pending.
    AwaitingUsername,
    AwaitingPassword,
    LoggedIn,
    /// Terminal. The control channel is gone.
    Closed,
}

/// A client session over one control connection. Commands are executed one
/// at a time; data transfers use active mode.
#[derive(Debug)]
pub struct FtpSession {
    control: ControlChannel,
    state: SessionState,
    config: SessionConfig,
    host: String,
    port: u16,
    username: Option<String>,
    remote_dir: String,
    connected_at: DateTime<Utc>,
    termination: Option<String>,
}

impl FtpSession {
    /// Connects with default settings, listening for data on `data_port`.
    pub fn connect(host: &str, control_port: u16, data_port: u16) -> Result<FtpSession> {
        FtpSession::connect_with(host, control_port, SessionConfig::default().with_data_port(data_port))
    }

    /// Connects with explicit settings.
    pub fn connect_with(host: &str, control_port: u16, config: SessionConfig) -> Result<FtpSession> {
        config.validate()?;
        let control = ControlChannel::connect((host, control_port))?;
        info!("connected to {}:{}", host, control_port);
        Ok(FtpSession {
            control,
            state: SessionState::Disconnected,
            config,
            host: host.to_owned(),
            port: control_port,
            username: None,
            remote_dir: "/".to_owned(),
            connected_at: Utc::now(),
            termination: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn && self.control.is_open()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Why the session was terminated, if it was.
    pub fn termination_reason(&self) -> Option<&str> {
        self.termination.as_deref()
    }

    /// Prompt text, e.g. `alice@localhost:6788 /docs`.
    pub fn status_header(&self) -> String {
        format!(
            "{}@{}:{} {}",
            self.username.as_deref().unwrap_or("-"),
            self.host,
            self.port,
            self.remote_dir
        )
    }

    /// Sends `USER`. Any reply other than 230 or 331 closes the session.
    pub fn login_with_username(&mut self, name: &str) -> Result<LoginStatus> {
        match self.state {
            SessionState::Disconnected | SessionState::AwaitingPassword => {}
            SessionState::LoggedIn => {
                return Err(FtpError::InvalidCommand("already logged in".to_owned()))
            }
            _ => return Err(self.closed_error()),
        }
        control::check_line(name)?;

        self.state = SessionState::AwaitingUsername;
        let resp = self.command(&format!("USER {}", name))?;
        match resp.code {
            status::LOGGED_IN => {
                self.username = Some(name.to_owned());
                self.logged_in();
                Ok(LoginStatus::LoggedIn)
            }
            status::NEED_PASSWORD => {
                self.username = Some(name.to_owned());
                self.state = SessionState::AwaitingPassword;
                Ok(LoginStatus::PasswordRequired)
            }
            _ => Err(self.login_failed(resp)),
        }
    }

    /// Sends `PASS`. Only valid after the server asked for a password.
    pub fn login_with_password(&mut self, password: &str) -> Result<LoginStatus> {
        match self.state {
            SessionState::AwaitingPassword => {}
            SessionState::LoggedIn => {
                return Err(FtpError::InvalidCommand("already logged in".to_owned()))
            }
            SessionState::Disconnected | SessionState::AwaitingUsername => {
                return Err(FtpError::InvalidCommand("no username submitted".to_owned()))
            }
            SessionState::Closed => return Err(self.closed_error()),
        }
        control::check_line(password)?;

        let resp = self.command(&format!("PASS {}", password))?;
        match resp.code {
            status::LOGGED_IN => {
                self.logged_in();
                Ok(LoginStatus::LoggedIn)
            }
            _ => Err(self.login_failed(resp)),
        }
    }

    /// Parses and runs one user command.
    ///
    /// User visible failures come back as `Ok(Outcome::Failure(_))`. An `Err`
    /// is either caller misuse (`InvalidCommand`), a data connection that
    /// could not be accepted, or a fatal error after which the session is
    /// closed (see `FtpError::is_fatal`).
    pub fn execute(&mut self, line: &str) -> Result<Outcome> {
        self.ensure_logged_in()?;
        let cmd = ClientCommand::parse(line)?;
        for arg in &cmd.arguments {
            control::check_line(arg)?;
        }

        match cmd.verb {
            Verb::List => {
                cmd.expect_arguments(0, 1)?;
                self.list(cmd.arguments.first().map(String::as_str))
            }
            Verb::ChangeDirectory => {
                cmd.expect_arguments(0, 1)?;
                let path = cmd.arguments.first().map(String::as_str);
                let request = match path {
                    Some(path) => format!("CWD {}", path),
                    None => "CWD".to_owned(),
                };
                let outcome = self.file_action(&request)?;
                if outcome == Outcome::Success {
                    self.remote_dir = change_dir(&self.remote_dir, path);
                }
                Ok(outcome)
            }
            Verb::MakeDirectory => {
                cmd.expect_arguments(1, 1)?;
                self.file_action(&format!("MKD {}", cmd.arguments[0]))
            }
            Verb::Remove => {
                cmd.expect_arguments(1, 1)?;
                self.file_action(&format!("DELE {}", cmd.arguments[0]))
            }
            Verb::Get => {
                cmd.expect_arguments(1, 2)?;
                let remote = &cmd.arguments[0];
                let local = cmd.arguments.get(1).map_or_else(|| file_name(remote), String::as_str);
                self.get(remote, local)
            }
            Verb::Put => {
                cmd.expect_arguments(1, 2)?;
                let local = &cmd.arguments[0];
                let remote = cmd.arguments.get(1).map_or_else(|| file_name(local), String::as_str);
                self.put(local, remote)
            }
        }
    }

    /// Finishes an upload that stopped with `Outcome::ConfirmationRequired`.
    /// Declining sends nothing; accepting overwrites the remote file.
    pub fn resume_upload(&mut self, pending: PendingUpload, overwrite: bool) -> Result<Outcome> {
        self.ensure_logged_in()?;
        if !overwrite {
            info!("overwrite of {} declined", pending.remote);
            return Ok(Outcome::Cancelled);
        }

        let source = match File::open(&pending.local) {
            Ok(file) => file,
            Err(err) => return Ok(local_open_failure(&pending.local, err)),
        };
        self.store(source, &pending.local, &pending.remote, true)
    }

    /// Logs out and releases the control connection. Never fails.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!("closing session to {}:{}", self.host, self.port);
        }
        self.control.close();
        self.state = SessionState::Closed;
    }

    /// The one way a session dies on a protocol or transport failure.
    fn terminate(&mut self, err: FtpError) -> FtpError {
        warn!("terminating session to {}:{}: {}", self.host, self.port, err);
        self.control.close();
        self.state = SessionState::Closed;
        self.termination = Some(err.to_string());
        err
    }

    /// Terminates on a reply that has no place in the current exchange.
    fn unexpected(&mut self, resp: ControlResponse, context: &str) -> FtpError {
        let err = if resp.is(status::NOT_AVAILABLE) {
            FtpError::ForcedLogout(resp.message)
        } else {
            FtpError::ProtocolViolation(format!("unexpected reply to {}: {}", context, resp))
        };
        self.terminate(err)
    }

    fn login_failed(&mut self, resp: ControlResponse) -> FtpError {
        if resp.is(status::NOT_AVAILABLE) {
            return self.unexpected(resp, "login");
        }
        self.terminate(FtpError::LoginRejected(resp.to_string()))
    }

    fn logged_in(&mut self) {
        info!(
            "logged in as {} on {}:{}",
            self.username.as_deref().unwrap_or("-"),
            self.host,
            self.port
        );
        self.state = SessionState::LoggedIn;
    }

    fn closed_error(&self) -> FtpError {
        FtpError::ChannelTerminated(match self.termination {
            Some(ref reason) => format!("session is closed ({})", reason),
            None => "session is closed".to_owned(),
        })
    }

    fn ensure_logged_in(&self) -> Result<()> {
        match self.state {
            SessionState::LoggedIn => Ok(()),
            SessionState::Closed => Err(self.closed_error()),
            _ => Err(FtpError::InvalidCommand("not logged in".to_owned())),
        }
    }

    fn receive(&mut self) -> Result<ControlResponse> {
        self.control.receive().map_err(|err| self.terminate(err))
    }

    fn command(&mut self, request: &str) -> Result<ControlResponse> {
        self.control.send(request).map_err(|err| {
            if err.is_fatal() {
                self.terminate(err)
            } else {
                err
            }
        })?;
        self.receive()
    }

    /// `CWD`, `MKD` and `DELE`: 250 or a 451 message.
    fn file_action(&mut self, request: &str) -> Result<Outcome> {
        let resp = self.command(request)?;
        match resp.code {
            status::REQUESTED_FILE_ACTION_OK => Ok(Outcome::Success),
            status::ACTION_ABORTED => Ok(Outcome::Failure(resp.message)),
            _ => Err(self.unexpected(resp, request)),
        }
    }

    /// Binds the data listener and advertises it with `PORT`.
    fn open_data_listener(&mut self) -> Result<DataListener> {
        let ip = self.control.local_ip().map_err(|err| self.terminate(err))?;
        let listener = DataListener::bind(ip, self.config.data_port, self.config.accept_timeout())?;
        let port = listener.local_addr()?.port();
        data_stream::negotiate_port(&mut self.control, ip, port).map_err(|err| self.terminate(err))?;
        Ok(listener)
    }

    /// Accepts the server's data connection. On failure the server's pending
    /// reply is collected so the control channel stays in step.
    fn accept_data(&mut self, listener: DataListener) -> Result<TcpStream> {
        match listener.accept() {
            Ok(stream) => Ok(stream),
            Err(err) => {
                let timeout = self.config.accept_timeout();
                let resp = self
                    .control
                    .receive_within(timeout)
                    .map_err(|err| self.terminate(err))?;
                if resp.is(status::NOT_AVAILABLE) {
                    return Err(self.unexpected(resp, "data connection"));
                }
                warn!("{}; server replied {}", err, resp);
                Err(err)
            }
        }
    }

    fn list(&mut self, path: Option<&str>) -> Result<Outcome> {
        let listener = self.open_data_listener()?;
        let request = match path {
            Some(path) => format!("LIST {}", path),
            None => "LIST".to_owned(),
        };
        let resp = self.command(&request)?;
        match resp.code {
            status::ABOUT_TO_SEND => {}
            status::REQUEST_FILE_ACTION_IGNORED | status::ACTION_ABORTED => {
                return Ok(Outcome::Failure(resp.message))
            }
            _ => return Err(self.unexpected(resp, &request)),
        }

        let data = self.accept_data(listener)?;
        let mut listing = Vec::new();
        let transfer = data_stream::receive_into(data, &mut listing, self.config.chunk_size);
        let reply = self.receive()?;

        match data_stream::reconcile(&transfer, &reply) {
            Reconciliation::Completed => Ok(Outcome::Output(String::from_utf8_lossy(&listing).into_owned())),
            Reconciliation::LocalError(msg) | Reconciliation::ServerError(msg) => Ok(Outcome::Failure(msg)),
            Reconciliation::ForcedLogout(_) | Reconciliation::Unexpected => Err(self.unexpected(reply, &request)),
        }
    }

    fn get(&mut self, remote: &str, local_name: &str) -> Result<Outcome> {
        let local = self.config.local_path(local_name);
        let listener = self.open_data_listener()?;
        let request = format!("RETR {}", remote);
        let resp = self.command(&request)?;
        match resp.code {
            status::ABOUT_TO_SEND => {}
            status::REQUEST_FILE_ACTION_IGNORED | status::ACTION_ABORTED => {
                return Ok(Outcome::Failure(resp.message))
            }
            _ => return Err(self.unexpected(resp, &request)),
        }

        let data = self.accept_data(listener)?;
        let mut created = false;
        let transfer = match File::create(&local) {
            Ok(mut file) => {
                created = true;
                data_stream::receive_into(data, &mut file, self.config.chunk_size)
            }
            Err(err) => Transfer::failed(Direction::Download, err),
        };

        let reply = match self.receive() {
            Ok(reply) => reply,
            Err(err) => {
                if created {
                    remove_partial(&local);
                }
                return Err(err);
            }
        };

        let reconciliation = data_stream::reconcile(&transfer, &reply);
        if reconciliation != Reconciliation::Completed && created {
            remove_partial(&local);
        }
        match reconciliation {
            Reconciliation::Completed => Ok(Outcome::Success),
            Reconciliation::LocalError(msg) | Reconciliation::ServerError(msg) => Ok(Outcome::Failure(msg)),
            Reconciliation::ForcedLogout(_) | Reconciliation::Unexpected => Err(self.unexpected(reply, &request)),
        }
    }

    fn put(&mut self, local_name: &str, remote: &str) -> Result<Outcome> {
        let local = self.config.local_path(local_name);
        let source = match File::open(&local) {
            Ok(file) => file,
            Err(err) => return Ok(local_open_failure(&local, err)),
        };
        self.store(source, &local, remote, false)
    }

    /// `STOU` (or `STORE` when overwriting) followed by the upload.
    fn store(&mut self, mut source: File, local: &Path, remote: &str, overwrite: bool) -> Result<Outcome> {
        let listener = self.open_data_listener()?;
        let request = if overwrite {
            format!("STORE {}", remote)
        } else {
            format!("STOU {}", remote)
        };
        let resp = self.command(&request)?;
        match resp.code {
            status::ABOUT_TO_SEND => {}
            status::REQUEST_FILE_ACTION_IGNORED if !overwrite => {
                info!("{} already exists on the server", remote);
                return Ok(Outcome::ConfirmationRequired(PendingUpload {
                    local: local.to_path_buf(),
                    remote: remote.to_owned(),
                }));
            }
            status::REQUEST_FILE_ACTION_IGNORED | status::ACTION_ABORTED => {
                return Ok(Outcome::Failure(resp.message))
            }
            _ => return Err(self.unexpected(resp, &request)),
        }

        let data = self.accept_data(listener)?;
        let transfer = data_stream::send_from(&mut source, data, self.config.chunk_size);
        drop(source);
        let reply = self.receive()?;

        match data_stream::reconcile(&transfer, &reply) {
            Reconciliation::Completed => Ok(Outcome::Success),
            Reconciliation::LocalError(msg) | Reconciliation::ServerError(msg) => {
                self.delete_corrupt_upload(remote)?;
                Ok(Outcome::Failure(msg))
            }
            Reconciliation::ForcedLogout(_) | Reconciliation::Unexpected => Err(self.unexpected(reply, &request)),
        }
    }

    /// Removes a remote file the server holds in an unknown state.
    fn delete_corrupt_upload(&mut self, remote: &str) -> Result<()> {
        warn!("deleting incomplete upload {}", remote);
        let request = format!("DELE {}", remote);
        let resp = self.command(&request)?;
        match resp.code {
            status::REQUESTED_FILE_ACTION_OK => Ok(()),
            status::REQUEST_FILE_ACTION_IGNORED | status::ACTION_ABORTED => {
                warn!("could not delete incomplete upload {}: {}", remote, resp);
                Ok(())
            }
            _ => Err(self.unexpected(resp, &request)),
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        self.control.close();
    }
}

fn local_open_failure(path: &Path, err: std::io::Error) -> Outcome {
    Outcome::Failure(format!("cannot open {}: {}", path.display(), err))
}

fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!("could not remove partial file {}: {}", path.display(), err);
    }
}

/// Last path component, used when no target name is given.
fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}

/// Remote directory after a successful `cd`.
fn change_dir(current: &str, path: Option<&str>) -> String {
    let path = match path {
        None => return "/".to_owned(),
        Some(path) => path,
    };

    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        current.split('/').filter(|p| !p.is_empty()).collect()
    };
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}
