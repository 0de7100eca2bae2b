//! Active mode data connections: we listen, the server connects, bytes flow
//! until end of stream, and the control channel has the last word.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::control::ControlChannel;
use super::response::ControlResponse;
use super::status;
use super::types::{FtpError, Result};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A listening socket good for exactly one inbound connection.
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
    timeout: Duration,
}

impl DataListener {
    /// Binds `ip:port`. Port 0 lets the OS pick.
    pub fn bind(ip: IpAddr, port: u16, timeout: Duration) -> Result<DataListener> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).map_err(|err| {
            FtpError::DataConnectionFailed(format!("could not listen on {}:{}: {}", ip, port, err))
        })?;
        debug!("data listener bound on {:?}", listener.local_addr());
        Ok(DataListener { listener, timeout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|err| FtpError::DataConnectionFailed(err.to_string()))
    }

    /// Waits for the server to connect. The listener is consumed, so it is
    /// closed whether or not a connection arrives.
    pub fn accept(self) -> Result<TcpStream> {
        self.listener
            .set_nonblocking(true)
            .map_err(|err| FtpError::DataConnectionFailed(err.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("data connection accepted from {}", peer);
                    stream
                        .set_nonblocking(false)
                        .map_err(|err| FtpError::DataConnectionFailed(err.to_string()))?;
                    return Ok(stream);
                }
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(FtpError::DataConnectionFailed(format!(
                            "no data connection within {}s",
                            self.timeout.as_secs_f32()
                        )));
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(FtpError::DataConnectionFailed(format!("accept failed: {}", err)))
                }
            }
        }
    }
}

/// Sends `PORT <ip> <port>` and expects 200.
pub fn negotiate_port(control: &mut ControlChannel, ip: IpAddr, port: u16) -> Result<()> {
    control.send(&format!("PORT {} {}", ip, port))?;
    let resp = control.receive()?;
    match resp.code {
        status::COMMAND_OK => Ok(()),
        status::NOT_AVAILABLE => Err(FtpError::ForcedLogout(resp.message)),
        _ => Err(FtpError::ProtocolViolation(format!("unexpected reply to PORT: {}", resp))),
    }
}

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// What happened on our side of a transfer. I/O errors end the transfer
/// but are only recorded, so the server's verdict can still be read.
#[derive(Debug)]
pub struct Transfer {
    pub direction: Direction,
    pub bytes: u64,
    pub error: Option<io::Error>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl Transfer {
    /// A transfer that never moved a byte.
    pub fn failed(direction: Direction, error: io::Error) -> Transfer {
        let now = Utc::now();
        Transfer {
            direction,
            bytes: 0,
            error: Some(error),
            started: now,
            finished: now,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished.signed_duration_since(self.started)
    }
}

/// Copies `reader` into `writer` in `chunk_size` pieces until end of stream
/// or the first error.
pub fn pump<R, W>(direction: Direction, reader: &mut R, writer: &mut W, chunk_size: usize) -> Transfer
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let started = Utc::now();
    let mut buf = vec![0u8; chunk_size];
    let mut bytes = 0u64;
    let mut error = None;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(err) = writer.write_all(&buf[..n]) {
                    error = Some(err);
                    break;
                }
                bytes += n as u64;
            }
            Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }

    if error.is_none() {
        error = writer.flush().err();
    }

    let transfer = Transfer {
        direction,
        bytes,
        error,
        started,
        finished: Utc::now(),
    };
    match transfer.error {
        None => info!(
            "{:?} of {} bytes finished in {} ms",
            direction,
            bytes,
            transfer.elapsed().num_milliseconds()
        ),
        Some(ref err) => warn!("{:?} stopped after {} bytes: {}", direction, bytes, err),
    }
    transfer
}

/// Streams the data connection into `sink`. The connection is closed on return.
pub fn receive_into<W: Write + ?Sized>(mut data: TcpStream, sink: &mut W, chunk_size: usize) -> Transfer {
    pump(Direction::Download, &mut data, sink, chunk_size)
}

/// Streams `source` over the data connection, then closes it so the server
/// sees end of stream.
pub fn send_from<R: Read + ?Sized>(source: &mut R, mut data: TcpStream, chunk_size: usize) -> Transfer {
    let transfer = pump(Direction::Upload, source, &mut data, chunk_size);
    let _ = data.shutdown(Shutdown::Write);
    transfer
}

/// How a finished transfer and the server's final reply fit together.
#[derive(Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// No local error and the server said 226.
    Completed,
    /// Our side failed. Reported even when the server claims success.
    LocalError(String),
    /// Our side succeeded but the server reports an error.
    ServerError(String),
    /// The server answered 421.
    ForcedLogout(String),
    /// A reply that has no meaning at the end of this transfer.
    Unexpected,
}

/// Decides the outcome of a transfer. Success needs both a clean local side
/// and a 226 from the server.
pub fn reconcile(transfer: &Transfer, reply: &ControlResponse) -> Reconciliation {
    if reply.is(status::NOT_AVAILABLE) {
        return Reconciliation::ForcedLogout(reply.message.clone());
    }

    if let Some(ref err) = transfer.error {
        if reply.is(status::CLOSING_DATA_CONNECTION) {
            warn!("server reported success for a transfer that failed locally");
        }
        return Reconciliation::LocalError(format!(
            "transfer failed after {} bytes: {}",
            transfer.bytes, err
        ));
    }

    match (transfer.direction, reply.code) {
        (_, status::CLOSING_DATA_CONNECTION) => Reconciliation::Completed,
        (Direction::Download, status::TRANSFER_ABORTED) | (Direction::Upload, _) => {
            Reconciliation::ServerError(server_message(reply))
        }
        (Direction::Download, _) => Reconciliation::Unexpected,
    }
}

fn server_message(reply: &ControlResponse) -> String {
    if reply.message.is_empty() {
        format!("server reported {}", reply.code)
    } else {
        reply.message.clone()
    }
}
