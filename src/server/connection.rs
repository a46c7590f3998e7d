use crate::error::ServerError;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// A byte stream the server can read a request from and write a response to.
///
/// Implemented for `TcpStream`; tests implement it for in-memory streams.
pub trait Connection: Read + Write {
    /// Bound the next blocking read. `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// One deadline shared by every read made for a single request.
///
/// Per-read socket timeouts alone let a client trickle one byte per interval
/// forever; this caps the total.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    /// Read once into `buf`, failing with `Timeout` when the deadline passed.
    pub fn read<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        buf: &mut [u8],
    ) -> Result<usize, ServerError> {
        let remaining = self.remaining().ok_or(ServerError::Timeout)?;
        conn.set_read_timeout(Some(remaining))?;
        loop {
            match conn.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
