//! N×N pipe mesh construction.
//!
//! Mirrors the reference lab's `open_pipes`/`extract_channels` split: one
//! pass opens every unidirectional pipe before any `fork()`, a second pass
//! (run once per peer, on that peer's own inherited copy of the table)
//! keeps only the row/column this peer owns and closes everything else.
//! The diagonal is never populated — a peer has no channel to itself.

use std::os::unix::io::RawFd;

use crate::channel::{ReadChannel, WriteChannel};

/// A caller-supplied sink for the pipe-accounting trail (`pipes.log` in the
/// driver). Kept as a trait rather than a concrete log type so this crate
/// doesn't need to depend on the event-log crate above it.
pub trait PipeLog {
    fn log(&mut self, line: &str);
}

impl<F: FnMut(&str)> PipeLog for F {
    fn log(&mut self, line: &str) {
        self(line)
    }
}

/// A no-op sink for callers (tests) that don't care about the pipe trail.
pub struct NullPipeLog;

impl PipeLog for NullPipeLog {
    fn log(&mut self, _line: &str) {}
}

fn open_pipe() -> std::io::Result<(RawFd, RawFd)> {
    let mut fds: [libc::c_int; 2] = [0, 0];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

/// One pipe's two ends, each independently "taken" (extracted by a peer)
/// or still pending closure.
#[derive(Clone, Copy, Default)]
struct PipeCell {
    read_fd: Option<RawFd>,
    write_fd: Option<RawFd>,
}

/// The full N×N table of raw pipe fds, before any peer has extracted its
/// row. `cell(i, j)` is the pipe peer `i` writes into and peer `j` reads
/// from. Every process that will become a peer must inherit this table
/// (i.e. it is built before `fork()`).
pub struct PipeMatrix {
    n: i8,
    cells: Vec<PipeCell>,
}

impl PipeMatrix {
    /// Opens every `(i, j)` pipe for `i != j`. Each opened pipe is logged
    /// once, in `(i, j)` order, matching the reference lab's pipe trail.
    pub fn open(n: i8, log: &mut impl PipeLog) -> std::io::Result<Self> {
        tracing::debug!(n, "opening pipe mesh");
        let size = n as usize;
        let mut cells = vec![PipeCell::default(); size * size];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (rfd, wfd) = open_pipe()?;
                log.log(&format!("Opened pipe [{i} -> {j}]"));
                cells[i as usize * size + j as usize] = PipeCell {
                    read_fd: Some(rfd),
                    write_fd: Some(wfd),
                };
            }
        }
        Ok(Self { n, cells })
    }

    fn idx(&self, i: i8, j: i8) -> usize {
        i as usize * self.n as usize + j as usize
    }

    /// Extracts peer `id`'s row and column out of the shared table, closing
    /// every fd this peer doesn't own. Must be called exactly once per
    /// peer, on that peer's own copy of the matrix (inherited via `fork()`
    /// before anyone has extracted anything).
    pub fn extract(mut self, id: i8, log: &mut impl PipeLog) -> ProcessChannels {
        tracing::debug!(id, n = self.n, "extracting peer's channel slice from the mesh");
        let n = self.n;
        let mut read_channels = Vec::new();
        let mut write_channels = Vec::new();

        for peer in 0..n {
            if peer == id {
                continue;
            }
            // This peer reads from the pipe peer->id wrote into, and
            // writes into the pipe id->peer.
            let from_idx = self.idx(peer, id);
            let read_fd = self.cells[from_idx].read_fd.take().expect("read end present");
            let to_idx = self.idx(id, peer);
            let write_fd = self.cells[to_idx].write_fd.take().expect("write end present");
            read_channels.push((peer, read_fd));
            write_channels.push((peer, write_fd));
        }

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let cell = &mut self.cells[self.idx(i, j)];
                if let Some(fd) = cell.read_fd.take() {
                    log.log(&format!("Closed fd [{i} -> {j}]"));
                    unsafe { libc::close(fd) };
                }
                if let Some(fd) = cell.write_fd.take() {
                    log.log(&format!("Closed fd [{i} -> {j}]"));
                    unsafe { libc::close(fd) };
                }
            }
        }

        ProcessChannels {
            id,
            read: read_channels
                .into_iter()
                .map(|(peer, fd)| (peer, ReadChannel::new(fd, peer)))
                .collect(),
            write: write_channels
                .into_iter()
                .map(|(peer, fd)| (peer, WriteChannel::new(fd)))
                .collect(),
        }
    }
}

/// One peer's extracted slice of the mesh: `n - 1` read ends and `n - 1`
/// write ends, indexed by counterpart id.
pub struct ProcessChannels {
    pub id: i8,
    pub read: Vec<(i8, ReadChannel)>,
    pub write: Vec<(i8, WriteChannel)>,
}

impl ProcessChannels {
    /// Logs one line per fd this peer is about to close, matching the
    /// reference lab's `free_channels` trail. The fds themselves are
    /// closed by `Drop` regardless of whether this is called; callers that
    /// want the log line should call it immediately before dropping.
    pub fn log_close(&self, log: &mut impl PipeLog) {
        for (peer, _) in &self.read {
            log.log(&format!("Closed rfd [{}: {}]", self.id, peer));
        }
        for (peer, _) in &self.write {
            log.log(&format!("Closed wfd [{}: {}]", self.id, peer));
        }
    }
}
