//! The control channel: one persistent connection carrying request lines
//! and status replies.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, warn};

use super::response::ControlResponse;
use super::types::{FtpError, Result};

/// Longest reply line accepted, terminator included.
pub const MAX_LINE_LENGTH: usize = 8192;

/// Rejects text that would split into more than one control line.
pub fn check_line(text: &str) -> Result<()> {
    if text.contains(&['\r', '\n'][..]) {
        return Err(FtpError::InvalidCommand(format!(
            "line break in request: {:?}",
            text
        )));
    }
    Ok(())
}

/// Owns the control socket. Once closed, every call fails with
/// `ChannelTerminated`.
#[derive(Debug)]
pub struct ControlChannel {
    reader: Option<BufReader<TcpStream>>,
}

impl ControlChannel {
    /// Connects to the server. No greeting is expected.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<ControlChannel> {
        TcpStream::connect(addr)
            .map_err(FtpError::ConnectionError)
            .map(|stream| ControlChannel {
                reader: Some(BufReader::new(stream)),
            })
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Address of our end of the control connection. The data listener is
    /// advertised on this address.
    pub fn local_ip(&self) -> Result<IpAddr> {
        self.stream()?
            .local_addr()
            .map(|addr| addr.ip())
            .map_err(|err| FtpError::ChannelTerminated(format!("control socket: {}", err)))
    }

    /// Writes `request` followed by CRLF. A request containing CR or LF is
    /// refused with `InvalidCommand` and nothing is written.
    pub fn send(&mut self, request: &str) -> Result<()> {
        check_line(request)?;
        if request.starts_with("PASS ") {
            debug!("CMD PASS ****");
        } else {
            debug!("CMD {}", request);
        }

        let reader = self.reader_mut()?;
        let stream = reader.get_mut();
        stream
            .write_all(format!("{}\r\n", request).as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|err| FtpError::ChannelTerminated(format!("could not send request: {}", err)))
    }

    /// Reads one status line. Any read or parse failure, or a line longer
    /// than `MAX_LINE_LENGTH`, closes the channel.
    pub fn receive(&mut self) -> Result<ControlResponse> {
        let mut line = String::new();
        let read = self
            .reader_mut()?
            .by_ref()
            .take(MAX_LINE_LENGTH as u64)
            .read_line(&mut line);

        let result = match read {
            Ok(0) => Err(FtpError::ChannelTerminated(
                "connection closed by server".to_owned(),
            )),
            Ok(n) if n >= MAX_LINE_LENGTH && !line.ends_with('\n') => Err(
                FtpError::ChannelTerminated(format!("reply line longer than {} bytes", MAX_LINE_LENGTH)),
            ),
            Ok(_) => {
                let line = line.trim_end_matches(&['\r', '\n'][..]);
                debug!("FTP {}", line);
                ControlResponse::parse(line).map_err(|err| {
                    FtpError::ChannelTerminated(format!("malformed response: {}", err))
                })
            }
            Err(err) => Err(FtpError::ChannelTerminated(format!(
                "could not read response: {}",
                err
            ))),
        };

        if let Err(ref err) = result {
            warn!("closing control channel: {}", err);
            self.close();
        }
        result
    }

    /// Like `receive` but gives up after `timeout`. The channel is closed if
    /// nothing arrives in time.
    pub fn receive_within(&mut self, timeout: Duration) -> Result<ControlResponse> {
        self.set_read_timeout(Some(timeout))?;
        let result = self.receive();
        if result.is_ok() {
            self.set_read_timeout(None)?;
        }
        result
    }

    /// Sends `QUIT` and releases the socket. Never fails; closing a closed
    /// channel does nothing.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            debug!("CMD QUIT");
            let stream = reader.get_mut();
            let _ = stream.write_all(b"QUIT\r\n");
            let _ = stream.flush();
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream()?
            .set_read_timeout(timeout)
            .map_err(|err| FtpError::ChannelTerminated(format!("control socket: {}", err)))
    }

    fn stream(&self) -> Result<&TcpStream> {
        self.reader
            .as_ref()
            .map(|reader| reader.get_ref())
            .ok_or_else(closed)
    }

    fn reader_mut(&mut self) -> Result<&mut BufReader<TcpStream>> {
        self.reader.as_mut().ok_or_else(closed)
    }
}

fn closed() -> FtpError {
    FtpError::ChannelTerminated("control channel is closed".to_owned())
}
