//! Packed payload encodings for TRANSFER and BALANCE_HISTORY.
//!
//! Same approach as [`crate::message`]: fixed layout, hand-rolled
//! `to_bytes`/`from_bytes`, no generic codec. Both payloads ride inside a
//! [`crate::message::Message`], so their length is whatever
//! `payload_len` says it is rather than self-describing.

use crate::error::FramingError;

/// One balance-history sample: the balance after the event at `time`, plus
/// any amount credited but not yet reflected (always 0 after
/// reconciliation fills a hole).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub balance: i16,
    pub time: i16,
    pub pending_in: i16,
}

impl HistoryEntry {
    pub const WIRE_LEN: usize = 6;

    pub fn to_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&self.balance.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.time.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.pending_in.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            balance: i16::from_ne_bytes(buf[0..2].try_into().unwrap()),
            time: i16::from_ne_bytes(buf[2..4].try_into().unwrap()),
            pending_in: i16::from_ne_bytes(buf[4..6].try_into().unwrap()),
        }
    }
}

/// A bank order: debit `amount` from `src`, credit it to `dst`. Issued by
/// the coordinator to `src`; forwarded by `src` to `dst` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub src: i8,
    pub dst: i8,
    pub amount: i16,
}

impl Transfer {
    pub const WIRE_LEN: usize = 4;

    pub fn to_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = self.src as u8;
        buf[1] = self.dst as u8;
        buf[2..4].copy_from_slice(&self.amount.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() != Self::WIRE_LEN {
            return Err(FramingError::BadPayload);
        }
        Ok(Self {
            src: buf[0] as i8,
            dst: buf[1] as i8,
            amount: i16::from_ne_bytes(buf[2..4].try_into().unwrap()),
        })
    }
}

/// A child's complete balance history, reported to the coordinator at DONE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceHistory {
    pub owner: i8,
    pub entries: Vec<HistoryEntry>,
}

impl BalanceHistory {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.entries.len() * HistoryEntry::WIRE_LEN);
        buf.push(self.owner as u8);
        buf.push(self.entries.len() as u8);
        for entry in &self.entries {
            buf.extend_from_slice(&entry.to_bytes());
        }
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < 2 {
            return Err(FramingError::BadPayload);
        }
        let owner = buf[0] as i8;
        let len = buf[1] as usize;
        let expected = 2 + len * HistoryEntry::WIRE_LEN;
        if buf.len() != expected {
            return Err(FramingError::BadPayload);
        }
        let mut entries = Vec::with_capacity(len);
        for chunk in buf[2..].chunks_exact(HistoryEntry::WIRE_LEN) {
            entries.push(HistoryEntry::from_bytes(chunk));
        }
        Ok(Self { owner, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_round_trips() {
        let t = Transfer { src: 1, dst: 2, amount: 500 };
        let bytes = t.to_bytes();
        assert_eq!(Transfer::from_bytes(&bytes).unwrap(), t);
    }

    #[test]
    fn balance_history_round_trips() {
        let history = BalanceHistory {
            owner: 3,
            entries: vec![
                HistoryEntry { balance: 100, time: 0, pending_in: 0 },
                HistoryEntry { balance: 80, time: 2, pending_in: 20 },
            ],
        };
        let bytes = history.to_bytes();
        assert_eq!(BalanceHistory::from_bytes(&bytes).unwrap(), history);
    }

    #[test]
    fn truncated_history_payload_is_rejected() {
        let buf = [3u8, 2u8, 0, 0]; // claims 2 entries, only room for fewer bytes
        assert!(BalanceHistory::from_bytes(&buf).is_err());
    }
}
