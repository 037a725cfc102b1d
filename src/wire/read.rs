//! Pulling bytes (and, for Unix sockets, out-of-band file descriptors) off a
//! transport and feeding them to an [`Unmarshaller`](crate::wire::Unmarshaller).

use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use nix::sys::uio::IoSliceMut;

/// A source of message bytes, optionally carrying file descriptors alongside
/// them. `refill` performs one read and reports how many bytes (and fds)
/// landed; it does not loop until a whole message is available; the caller
/// drives that loop against an [`Unmarshaller`](crate::wire::Unmarshaller).
pub trait MessageReader {
    /// Read once, appending any new bytes to `out_bytes` and any new fds to
    /// `out_fds`. Returns the number of bytes read; `0` means EOF.
    fn refill(&mut self, out_bytes: &mut Vec<u8>, out_fds: &mut Vec<u32>) -> io::Result<usize>;
}

/// A reader over any byte stream with no fd-passing support.
pub struct StreamReader<R> {
    inner: R,
    chunk: [u8; Self::CHUNK_SIZE],
}

impl<R: Read> StreamReader<R> {
    const CHUNK_SIZE: usize = 4096;

    pub fn new(inner: R) -> Self {
        StreamReader {
            inner,
            chunk: [0u8; Self::CHUNK_SIZE],
        }
    }
}

impl<R: Read> MessageReader for StreamReader<R> {
    fn refill(&mut self, out_bytes: &mut Vec<u8>, _out_fds: &mut Vec<u32>) -> io::Result<usize> {
        let n = self.inner.read(&mut self.chunk)?;
        out_bytes.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }
}

/// A reader over a Unix domain socket, decoding `SCM_RIGHTS` ancillary data
/// into plain descriptor numbers as they arrive.
pub struct SocketReader<S> {
    stream: S,
    chunk: [u8; Self::CHUNK_SIZE],
}

impl<S: AsRawFd> SocketReader<S> {
    const CHUNK_SIZE: usize = 4096;
    /// Up to this many fds may be carried in a single `recvmsg` call's
    /// ancillary data, per the D-Bus transport's SCM_RIGHTS convention.
    const MAX_FDS_PER_READ: usize = 16;

    pub fn new(stream: S) -> Self {
        SocketReader {
            stream,
            chunk: [0u8; Self::CHUNK_SIZE],
        }
    }
}

impl<S: AsRawFd> MessageReader for SocketReader<S> {
    fn refill(&mut self, out_bytes: &mut Vec<u8>, out_fds: &mut Vec<u32>) -> io::Result<usize> {
        let mut iov = [IoSliceMut::new(&mut self.chunk)];
        let mut cmsg_buffer = nix::cmsg_space!([RawFd; Self::MAX_FDS_PER_READ]);
        let flags = MsgFlags::empty();

        let msg = recvmsg::<()>(
            self.stream.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_buffer),
            flags,
        )
        .map_err(io::Error::from)?;

        for cmsg in msg.cmsgs() {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                out_fds.extend(fds.into_iter().map(|fd| fd as u32));
            }
        }

        let n = msg.bytes;
        out_bytes.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }
}
