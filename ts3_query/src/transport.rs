use crate::protocol::{is_status_line, QueryError, Response};
use log::{debug, trace};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Socket timeouts applied to every ClientQuery connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(3),
            write: Duration::from_secs(3),
        }
    }
}

/// Newline-delimited TCP connection to the ClientQuery plugin
pub struct LineConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    address: String,
    alive: bool,
}

impl LineConnection {
    /// Dial the endpoint. Any dial failure is reported as `Unavailable`.
    pub fn connect(address: &str, timeouts: Timeouts) -> Result<Self, QueryError> {
        debug!("📡 Connecting to ClientQuery at {}", address);

        let unavailable = |source: io::Error| QueryError::Unavailable {
            address: address.to_string(),
            source,
        };

        let socket_addr = resolve(address).map_err(unavailable)?;
        let stream =
            TcpStream::connect_timeout(&socket_addr, timeouts.connect).map_err(unavailable)?;
        stream.set_read_timeout(Some(timeouts.read))?;
        stream.set_write_timeout(Some(timeouts.write))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(LineConnection {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            address: address.to_string(),
            alive: true,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Send one command line
    pub fn write_line(&mut self, line: &str) -> Result<(), QueryError> {
        if !self.alive {
            return Err(QueryError::ConnectionLost(io::Error::new(
                ErrorKind::NotConnected,
                "connection already closed",
            )));
        }

        trace!("➡️ {}", line);
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        self.check(result)?;
        Ok(())
    }

    /// Read one complete, non-empty line with terminators stripped
    pub fn read_line(&mut self) -> Result<String, QueryError> {
        if !self.alive {
            return Err(QueryError::ConnectionLost(io::Error::new(
                ErrorKind::NotConnected,
                "connection already closed",
            )));
        }

        loop {
            let mut buf = Vec::new();
            let read = self.reader.read_until(b'\n', &mut buf);
            let count = self.check(read)?;

            if count == 0 || buf.last() != Some(&b'\n') {
                // EOF, possibly in the middle of a line
                self.alive = false;
                return Err(QueryError::ConnectionLost(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "ClientQuery closed the connection",
                )));
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_matches(|c| c == '\r' || c == '\n');
            if line.is_empty() {
                continue;
            }

            trace!("⬅️ {}", line);
            return Ok(line.to_string());
        }
    }

    /// Read body lines up to and including the status line
    pub fn read_response(&mut self) -> Result<Response, QueryError> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line()?;
            if is_status_line(&line) {
                return Ok(Response::from_lines(body, Some(line)));
            }
            if line.starts_with("notify") {
                debug!("🔔 Ignoring event line: {}", line);
                continue;
            }
            body.push(line);
        }
    }

    /// Mark the connection dead on any I/O failure
    fn check<T>(&mut self, result: io::Result<T>) -> Result<T, QueryError> {
        result.map_err(|e| {
            self.alive = false;
            QueryError::ConnectionLost(e)
        })
    }
}

fn resolve(address: &str) -> io::Result<SocketAddr> {
    address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            ErrorKind::AddrNotAvailable,
            format!("no socket address for {}", address),
        )
    })
}
