//! Single-client HTTP responder.
//!
//! The request is never parsed. Bytes are consumed until the blank line that
//! ends the headers, then the prepared page is written back whole.

use std::{
    io::{self, ErrorKind, Read, Write},
    net::{TcpListener, TcpStream},
    time::Duration,
};

/// Finds the blank line that terminates the request headers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestScanner {
    line_blank: bool,
}

impl RequestScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the request has ended. `\r` is ignored, so both
    /// `\n\n` and `\r\n\r\n` terminate.
    pub fn feed(&mut self, byte: u8) -> bool {
        match byte {
            b'\n' if self.line_blank => true,
            b'\n' => {
                self.line_blank = true;
                false
            }
            b'\r' => false,
            _ => {
                self.line_blank = false;
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The page was written once.
    Responded,
    /// The client went away before finishing its request.
    Disconnected,
}

/// Reads one request from `stream` and answers it with `page`.
pub fn serve_client<S: Read + Write>(stream: &mut S, page: &[u8]) -> io::Result<ServeOutcome> {
    let mut scanner = RequestScanner::new();
    let mut buf = [0_u8; 64];

    loop {
        let read = match stream.read(&mut buf) {
            Ok(0) => return Ok(ServeOutcome::Disconnected),
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        if buf[..read].iter().any(|&byte| scanner.feed(byte)) {
            stream.write_all(page)?;
            stream.flush()?;
            return Ok(ServeOutcome::Responded);
        }
    }
}

/// Source of client connections that never blocks waiting for one.
pub trait Connections {
    type Stream: Read + Write;

    fn poll_accept(&mut self) -> io::Result<Option<Self::Stream>>;
}

/// A non-blocking listener whose accepted clients are read with blocking
/// calls, bounded by an optional timeout.
#[derive(Debug)]
pub struct TcpConnections {
    listener: TcpListener,
    client_timeout: Option<Duration>,
}

impl TcpConnections {
    pub fn new(listener: TcpListener, client_timeout: Option<Duration>) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            client_timeout,
        })
    }

    pub fn bind(port: u16, client_timeout: Option<Duration>) -> io::Result<Self> {
        Self::new(TcpListener::bind(("0.0.0.0", port))?, client_timeout)
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }
}

impl Connections for TcpConnections {
    type Stream = TcpStream;

    fn poll_accept(&mut self) -> io::Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("client connected from {peer}");
                stream.set_nonblocking(false)?;
                stream.set_read_timeout(self.client_timeout)?;
                Ok(Some(stream))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}
