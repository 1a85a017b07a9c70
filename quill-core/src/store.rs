//! Persistent per-name history index on top of `sled`. One tree maps each
//! raw name to the SCALE encoding of its [`NameHistory`]; the last record
//! of a history is the name's current state.

use crate::ledger::LedgerView;
use crate::name_op::decode_name_tx;
use crate::types::{BlockNumber, NameHistory, NameRecord, StoreError, TxPosition};
use crate::LOG_TARGET;
use parity_scale_codec::{Decode, Encode};
use sled::transaction::{ConflictableTransactionError, TransactionError};

const NAME_TREE: &str = "name-index";

pub struct NameStore {
    tree: sled::Tree,
}

fn decode_history(name: &[u8], bytes: &[u8]) -> Result<NameHistory, StoreError> {
    NameHistory::decode(&mut &bytes[..])
        .map_err(|_| StoreError::Corrupt(String::from_utf8_lossy(name).into_owned()))
}

impl NameStore {
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(NameStore {
            tree: db.open_tree(NAME_TREE)?,
        })
    }

    /// The full recorded history of `name`, oldest first. Unknown names
    /// have an empty history.
    pub fn history(&self, name: &[u8]) -> Result<NameHistory, StoreError> {
        match self.tree.get(name)? {
            Some(bytes) => decode_history(name, &bytes),
            None => Ok(Vec::new()),
        }
    }

    pub fn current_record(&self, name: &[u8]) -> Result<Option<NameRecord>, StoreError> {
        Ok(self.history(name)?.pop())
    }

    /// Height of the last operation on `name`, whether or not it is still
    /// live at the tip.
    pub fn height_of(&self, name: &[u8]) -> Result<Option<BlockNumber>, StoreError> {
        Ok(self.current_record(name)?.map(|record| record.height))
    }

    /// Append one record to the history of `name`.
    pub fn append(&self, name: &[u8], record: NameRecord) -> Result<(), StoreError> {
        let mut history = self.history(name)?;
        history.push(record);
        self.tree.insert(name, history.encode())?;
        Ok(())
    }

    /// Undo the last append for `name`, but only when the stored tip came
    /// from `expected_pos`. A mismatch means this store never recorded the
    /// operation being disconnected, and the history is left alone.
    pub fn rollback_last(&self, name: &[u8], expected_pos: &TxPosition) -> Result<(), StoreError> {
        let mut history = self.history(name)?;
        match history.last() {
            Some(record) if record.pos == *expected_pos => {
                history.pop();
                self.tree.insert(name, history.encode())?;
            }
            Some(record) => {
                log::warn!(
                    target: LOG_TARGET,
                    "rollback of {:?} skipped: stored tip at {}, disconnecting {}",
                    String::from_utf8_lossy(name),
                    record.pos,
                    expected_pos,
                );
            }
            None => {}
        }
        Ok(())
    }

    /// Iterate names at or after `start`, in lexicographic order, yielding
    /// each name with its current record. Names whose history was fully
    /// rolled back are skipped.
    pub fn scan(&self, start: &[u8]) -> ScanIter {
        ScanIter {
            inner: self.tree.range(start.to_vec()..),
        }
    }

    /// The first `max` scan results starting at `start`.
    pub fn scan_from(
        &self,
        start: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, NameRecord)>, StoreError> {
        self.scan(start).take(max).collect()
    }

    /// Rebuild the index from the chain, one storage transaction per
    /// block. A `start` of 0 throws the index away and replays from
    /// genesis; a positive `start` resumes an interrupted rebuild from
    /// that height on top of whatever earlier blocks already committed
    /// (the caller tracks the last fully-committed height). Returns the
    /// number of records written.
    pub fn rebuild(&self, ledger: &dyn LedgerView, start: BlockNumber) -> Result<u64, StoreError> {
        if start == 0 {
            self.tree.clear()?;
        }
        let mut written: u64 = 0;
        for height in start.max(1)..=ledger.tip_height() {
            let block = match ledger.block_transactions(height) {
                Some(block) => block,
                None => continue,
            };
            let appended = self
                .tree
                .transaction(|t| {
                    let mut count: u64 = 0;
                    for (tx, pos) in &block {
                        if !tx.is_name_version() {
                            continue;
                        }
                        let (_, op) = match decode_name_tx(tx) {
                            Ok(Some(found)) => found,
                            _ => continue,
                        };
                        let name = match op.name() {
                            Some(name) => name,
                            // Commitments carry no name and are not
                            // indexed.
                            None => continue,
                        };
                        let mut history = match t.get(name)? {
                            Some(bytes) => decode_history(name, &bytes)
                                .map_err(ConflictableTransactionError::Abort)?,
                            None => Vec::new(),
                        };
                        history.push(NameRecord {
                            height,
                            value: op.value().unwrap_or_default().to_vec(),
                            pos: *pos,
                        });
                        t.insert(name, history.encode())?;
                        count += 1;
                    }
                    Ok(count)
                })
                .map_err(|e| match e {
                    TransactionError::Abort(e) => e,
                    TransactionError::Storage(e) => StoreError::Backend(e),
                })?;
            written += appended;
        }
        log::info!(
            target: LOG_TARGET,
            "rebuilt name index: {} records up to height {}",
            written,
            ledger.tip_height(),
        );
        Ok(written)
    }

    /// Read every history and report what fails to decode or is out of
    /// order. Never repairs anything.
    pub fn verify(&self) -> Result<VerifyReport, StoreError> {
        let mut report = VerifyReport::default();
        for entry in self.tree.iter() {
            let (key, bytes) = entry?;
            report.names += 1;
            let history = match decode_history(&key, &bytes) {
                Ok(history) => history,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "verify: {}", e);
                    report.failures += 1;
                    continue;
                }
            };
            report.records += history.len() as u64;
            log::debug!(
                target: LOG_TARGET,
                "verify: {:?} has {} records, heights {}..{}",
                String::from_utf8_lossy(&key),
                history.len(),
                history.first().map(|r| r.height).unwrap_or(0),
                history.last().map(|r| r.height).unwrap_or(0),
            );
            if history.windows(2).any(|w| w[0].height > w[1].height) {
                log::warn!(
                    target: LOG_TARGET,
                    "verify: history of {:?} is not height-ordered",
                    String::from_utf8_lossy(&key),
                );
                report.failures += 1;
            }
        }
        Ok(report)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub names: u64,
    pub records: u64,
    pub failures: u64,
}

pub struct ScanIter {
    inner: sled::Iter,
}

impl Iterator for ScanIter {
    type Item = Result<(Vec<u8>, NameRecord), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Err(e) => return Some(Err(e.into())),
                Ok((key, bytes)) => {
                    let history = match decode_history(&key, &bytes) {
                        Ok(history) => history,
                        Err(e) => return Some(Err(e)),
                    };
                    if let Some(record) = history.last() {
                        return Some(Ok((key.to_vec(), record.clone())));
                    }
                }
            }
        }
    }
}
