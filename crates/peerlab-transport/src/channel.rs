//! Framed channel over a raw pipe file descriptor.
//!
//! Each channel is one direction of one pipe: a [`ReadChannel`] owns the
//! read end, a [`WriteChannel`] owns the write end. Messages are framed —
//! header first, then exactly `payload_len` payload bytes — so a reader can
//! always tell where one message ends and the next begins without
//! buffering across calls.

use std::os::unix::io::RawFd;

use peerlab_core::error::ChannelError;
use peerlab_core::message::{Message, MessageHeader, HEADER_LEN};

/// Outcome of a non-blocking read attempt.
#[derive(Debug)]
pub enum NonBlockingRead {
    /// A complete message was read.
    Ok(Message),
    /// No header bytes were available; nothing was consumed.
    Empty,
    /// The write end was closed (zero-byte read before any header bytes).
    Closed,
}

fn raw_read(fd: RawFd, buf: &mut [u8]) -> Result<isize, std::io::Error> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err);
    }
}

/// Like `raw_read`, but spins past `WouldBlock` instead of surfacing it.
/// The blocking API is built on top of the non-blocking one (same trick
/// the reference lab uses: `read_blocking` is `read_non_blocking` in a
/// loop), which lets channels that have been switched to `O_NONBLOCK` for
/// `receive_any` still serve ordinary blocking `receive` calls.
fn raw_read_blocking(fd: RawFd, buf: &mut [u8]) -> Result<isize, std::io::Error> {
    loop {
        match raw_read(fd, buf) {
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::yield_now();
                continue;
            }
            other => return other,
        }
    }
}

fn raw_write(fd: RawFd, buf: &[u8]) -> Result<(), ChannelError> {
    let mut written = 0;
    while written < buf.len() {
        let n = unsafe {
            libc::write(
                fd,
                buf[written..].as_ptr() as *const libc::c_void,
                buf.len() - written,
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ChannelError::Io(err));
        }
        written += n as usize;
    }
    Ok(())
}

fn set_nonblocking(fd: RawFd, nonblocking: bool) -> std::io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let new_flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Read half of a framed channel: one peer's pipe read end.
#[derive(Debug)]
pub struct ReadChannel {
    fd: RawFd,
    peer: i8,
}

impl ReadChannel {
    pub fn new(fd: RawFd, peer: i8) -> Self {
        Self { fd, peer }
    }

    pub fn peer(&self) -> i8 {
        self.peer
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        set_nonblocking(self.fd, nonblocking)
    }

    /// Read a complete message, blocking until it's fully available.
    /// A premature end-of-stream is a failure.
    pub fn read_blocking(&self) -> Result<Message, ChannelError> {
        let mut header_buf = [0u8; HEADER_LEN];
        self.fill_blocking(&mut header_buf)?;
        let header = MessageHeader::from_bytes(&header_buf)?;
        let mut payload = vec![0u8; header.payload_len as usize];
        if !payload.is_empty() {
            self.fill_blocking(&mut payload)?;
        }
        Ok(Message { header, payload })
    }

    fn fill_blocking(&self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = raw_read_blocking(self.fd, &mut buf[filled..])?;
            if n == 0 {
                return Err(ChannelError::ClosedMidMessage { peer: self.peer });
            }
            filled += n as usize;
        }
        Ok(())
    }

    /// Attempt a non-blocking read. The channel must already be in
    /// non-blocking mode (see [`ReadChannel::set_nonblocking`]). Once any
    /// header byte has been consumed, the rest of the header and the
    /// payload are read in blocking fashion — a framed message, once
    /// started, is always completed.
    pub fn read_nonblocking(&self) -> Result<NonBlockingRead, ChannelError> {
        let mut header_buf = [0u8; HEADER_LEN];
        let n = match raw_read(self.fd, &mut header_buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Ok(NonBlockingRead::Empty)
            }
            Err(e) => return Err(ChannelError::Io(e)),
        };
        if n == 0 {
            return Ok(NonBlockingRead::Closed);
        }
        let mut filled = n as usize;
        while filled < HEADER_LEN {
            let n = raw_read_blocking(self.fd, &mut header_buf[filled..])?;
            if n == 0 {
                return Err(ChannelError::ClosedMidMessage { peer: self.peer });
            }
            filled += n as usize;
        }
        let header = MessageHeader::from_bytes(&header_buf)?;
        let mut payload = vec![0u8; header.payload_len as usize];
        if !payload.is_empty() {
            self.fill_blocking(&mut payload)?;
        }
        Ok(NonBlockingRead::Ok(Message { header, payload }))
    }
}

/// Write half of a framed channel: one peer's pipe write end.
#[derive(Debug)]
pub struct WriteChannel {
    fd: RawFd,
}

impl WriteChannel {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Write a complete message, looping until every byte is handed to the
    /// OS. Fails only on an unrecoverable write error; partial writes are
    /// transparent to the caller.
    pub fn write(&self, msg: &Message) -> Result<(), ChannelError> {
        raw_write(self.fd, &msg.header.to_bytes())?;
        if !msg.payload.is_empty() {
            raw_write(self.fd, &msg.payload)?;
        }
        Ok(())
    }
}

impl Drop for ReadChannel {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for WriteChannel {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlab_core::message::MessageType;

    fn open_pair(peer: i8) -> (ReadChannel, WriteChannel) {
        let mut fds: [libc::c_int; 2] = [0, 0];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        (ReadChannel::new(fds[0], peer), WriteChannel::new(fds[1]))
    }

    #[test]
    fn message_round_trips_byte_for_byte() {
        let (read, write) = open_pair(1);
        let msg = Message::text(MessageType::Started, 7, "0: process started");
        write.write(&msg).unwrap();
        let got = read.read_blocking().unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn closed_write_end_is_reported_mid_message() {
        let (read, write) = open_pair(2);
        drop(write);
        let err = read.read_blocking().unwrap_err();
        assert!(matches!(err, ChannelError::ClosedMidMessage { peer: 2 }));
    }

    #[test]
    fn nonblocking_read_reports_empty_with_nothing_consumed() {
        let (read, _write) = open_pair(3);
        read.set_nonblocking(true).unwrap();
        match read.read_nonblocking().unwrap() {
            NonBlockingRead::Empty => {}
            other => panic!("expected Empty, got {other:?}"),
        }
    }

    #[test]
    fn nonblocking_read_returns_full_message_once_available() {
        let (read, write) = open_pair(4);
        read.set_nonblocking(true).unwrap();
        let msg = Message::empty(MessageType::Ack, 3);
        write.write(&msg).unwrap();
        match read.read_nonblocking().unwrap() {
            NonBlockingRead::Ok(got) => assert_eq!(got, msg),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn nonblocking_read_reports_closed_on_eof() {
        let (read, write) = open_pair(5);
        read.set_nonblocking(true).unwrap();
        drop(write);
        match read.read_nonblocking().unwrap() {
            NonBlockingRead::Closed => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}
