//! Event log sink: formats well-defined protocol event kinds to two
//! append-only files (`events.log`, `pipes.log`), mirroring the former to
//! standard output.
//!
//! This is a thin text-formatting layer, deliberately separate from the
//! `tracing` diagnostics the driver emits — those are for a human
//! debugging a run; this is the spec-mandated line-for-line protocol
//! record the lab assignment grades against.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use peerlab_transport::mesh::PipeLog;

/// The two append-only log files a run writes to, plus a stdout mirror for
/// `events.log` lines.
pub struct EventLog {
    events: File,
    pipes: File,
}

impl EventLog {
    /// Opens (creating if needed, appending if present) `events.log` and
    /// `pipes.log` under `dir`.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        tracing::debug!(dir = %dir.display(), "opening event log files");
        let events = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.log"))?;
        let pipes = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("pipes.log"))?;
        Ok(Self { events, pipes })
    }

    fn write_event(&mut self, line: &str) {
        print!("{line}");
        let _ = std::io::stdout().flush();
        let _ = self.events.write_all(line.as_bytes());
        let _ = self.events.flush();
    }

    pub fn started(&mut self, id: i8, pid: u32, parent_pid: u32) {
        self.write_event(&format!("{id}: process started, pid {pid}, parent {parent_pid}\n"));
    }

    pub fn received_all_started(&mut self, id: i8) {
        self.write_event(&format!("{id}: received all STARTED messages\n"));
    }

    pub fn done(&mut self, id: i8, message: &str) {
        self.write_event(&format!("{id}: done. {message}\n"));
    }

    pub fn received_all_done(&mut self, id: i8) {
        self.write_event(&format!("{id}: received all DONE messages\n"));
    }

    pub fn transfer_out(&mut self, src: i8, dst: i8, amount: i16) {
        self.write_event(&format!("{src}: transfer out to {dst} amount {amount}\n"));
    }

    pub fn transfer_in(&mut self, dst: i8, src: i8, amount: i16) {
        self.write_event(&format!("{dst}: transfer in from {src} amount {amount}\n"));
    }

    pub fn loop_operation(&mut self, id: i8, op_index: u32, time: i16) {
        self.write_event(&format!("{id}: loop operation {op_index} at time {time}\n"));
    }
}

impl PipeLog for EventLog {
    fn log(&mut self, line: &str) {
        let _ = writeln!(self.pipes, "{line}");
        let _ = self.pipes.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_and_pipes_go_to_separate_files() {
        let dir = std::env::temp_dir().join(format!("peerlab-eventlog-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut log = EventLog::open(&dir).unwrap();
        log.started(1, 100, 1);
        log.log("Opened pipe [0 -> 1]");
        let events = std::fs::read_to_string(dir.join("events.log")).unwrap();
        let pipes = std::fs::read_to_string(dir.join("pipes.log")).unwrap();
        assert!(events.contains("process started"));
        assert!(pipes.contains("Opened pipe [0 -> 1]"));
        assert!(!events.contains("Opened pipe"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
