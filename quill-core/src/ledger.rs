//! The validator's window onto the chain. [`LedgerView`] is the seam
//! between name validation and whatever node or test harness hosts it;
//! [`MemoryLedger`] is the in-process implementation used by the test
//! suites and by index rebuilds from synthetic chains.

use crate::types::{BlockNumber, OutPoint, Transaction, TxOut, TxPosition, Txid};
use std::collections::HashMap;

pub trait LedgerView {
    /// Height of the best block.
    fn tip_height(&self) -> BlockNumber;

    /// The output a given input spends, whether its transaction is
    /// confirmed or still in the pool.
    fn prev_output(&self, outpoint: &OutPoint) -> Option<TxOut>;

    /// Where `txid` is stored on disk, if it is confirmed.
    fn confirmed_position(&self, txid: &Txid) -> Option<TxPosition>;

    /// The height of the block holding the transaction at `pos`.
    fn position_height(&self, pos: &TxPosition) -> Option<BlockNumber>;

    fn read_transaction(&self, pos: &TxPosition) -> Option<Transaction>;

    /// All transactions of the block at `height`, in block order.
    fn block_transactions(&self, height: BlockNumber) -> Option<Vec<(Transaction, TxPosition)>>;
}

/// A chain held entirely in memory. Block 0 is an empty genesis;
/// positions are assigned as `0:<monotonic offset>`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    blocks: Vec<Vec<(Transaction, TxPosition)>>,
    by_txid: HashMap<Txid, TxPosition>,
    by_pos: HashMap<TxPosition, (BlockNumber, usize)>,
    unconfirmed: HashMap<Txid, Transaction>,
    next_offset: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger {
            blocks: vec![Vec::new()],
            ..Default::default()
        }
    }

    /// Append a block of `txs`, assigning each a position. Returns the
    /// positioned transactions, in the shape block connection expects.
    pub fn push_block(&mut self, txs: Vec<Transaction>) -> Vec<(Transaction, TxPosition)> {
        let height = self.blocks.len() as BlockNumber;
        let mut block = Vec::with_capacity(txs.len());
        for (index, tx) in txs.into_iter().enumerate() {
            let pos = TxPosition {
                file: 0,
                offset: self.next_offset,
            };
            self.next_offset += 1;
            let txid = tx.txid();
            self.unconfirmed.remove(&txid);
            self.by_txid.insert(txid, pos);
            self.by_pos.insert(pos, (height, index));
            block.push((tx, pos));
        }
        self.blocks.push(block.clone());
        block
    }

    /// Extend the chain with empty blocks until the tip reaches `height`.
    pub fn mine_until(&mut self, height: BlockNumber) {
        while self.tip_height() < height {
            self.push_block(vec![]);
        }
    }

    /// Drop the tip block. Its transactions are forgotten, not returned
    /// to the pool.
    pub fn pop_block(&mut self) -> Option<Vec<(Transaction, TxPosition)>> {
        if self.blocks.len() <= 1 {
            return None;
        }
        let block = self.blocks.pop()?;
        for (tx, pos) in &block {
            self.by_txid.remove(&tx.txid());
            self.by_pos.remove(pos);
        }
        Some(block)
    }

    /// Make `tx` visible to pool-time input resolution.
    pub fn add_unconfirmed(&mut self, tx: Transaction) -> Txid {
        let txid = tx.txid();
        self.unconfirmed.insert(txid, tx);
        txid
    }

    pub fn remove_unconfirmed(&mut self, txid: &Txid) {
        self.unconfirmed.remove(txid);
    }

    fn transaction_by_txid(&self, txid: &Txid) -> Option<&Transaction> {
        if let Some(pos) = self.by_txid.get(txid) {
            let (height, index) = self.by_pos.get(pos)?;
            return self
                .blocks
                .get(*height as usize)
                .and_then(|block| block.get(*index))
                .map(|(tx, _)| tx);
        }
        self.unconfirmed.get(txid)
    }
}

impl LedgerView for MemoryLedger {
    fn tip_height(&self) -> BlockNumber {
        (self.blocks.len() - 1) as BlockNumber
    }

    fn prev_output(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.transaction_by_txid(&outpoint.txid)
            .and_then(|tx| tx.outputs.get(outpoint.vout as usize))
            .cloned()
    }

    fn confirmed_position(&self, txid: &Txid) -> Option<TxPosition> {
        self.by_txid.get(txid).copied()
    }

    fn position_height(&self, pos: &TxPosition) -> Option<BlockNumber> {
        self.by_pos.get(pos).map(|(height, _)| *height)
    }

    fn read_transaction(&self, pos: &TxPosition) -> Option<Transaction> {
        let (height, index) = self.by_pos.get(pos)?;
        self.blocks
            .get(*height as usize)
            .and_then(|block| block.get(*index))
            .map(|(tx, _)| tx.clone())
    }

    fn block_transactions(&self, height: BlockNumber) -> Option<Vec<(Transaction, TxPosition)>> {
        self.blocks.get(height as usize).cloned()
    }
}
