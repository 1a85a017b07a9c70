//! The registration state machine. Ties the codec, the history store and
//! the pending index together: context-free transaction checks, full
//! validation against chain state, and the history mutations applied when
//! blocks connect or disconnect.
//!
//! A name moves through Free, Reserved (an unrevealed commitment) and
//! Active. None of these is stored; each is derived on demand from the
//! current record, the tip height and the previous output's operation.

use crate::ledger::LedgerView;
use crate::name_op::{burn_total, commitment_hash, decode_name_script, decode_name_tx, NameOp};
use crate::pending::PendingIndex;
use crate::policy::Policy;
use crate::store::NameStore;
use crate::types::{
    BlockNumber, NameError, NameRecord, OutPoint, StoreError, Transaction, TxPosition, Txid,
    COMMITMENT_LENGTH, MAX_NAME_LENGTH, MAX_REVEAL_LENGTH, MAX_VALUE_LENGTH,
    MIN_FIRSTUPDATE_DEPTH,
};
use crate::LOG_TARGET;
use std::collections::BTreeSet;

/// What the transaction is being validated for. The consensus-only rules
/// (registration fee, commitment maturity) apply to `Miner` and `Block`
/// but not to plain pool acceptance.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Acceptance into the unconfirmed pool.
    Pool,
    /// Inclusion in a candidate block whose already-selected transactions
    /// are `template`.
    Miner { template: &'a BTreeSet<Txid> },
    /// Connection as part of a mined block.
    Block,
}

impl Mode<'_> {
    fn is_consensus(&self) -> bool {
        !matches!(self, Mode::Pool)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    Accept,
    /// Valid but not yet minable, typically an immature commitment. Keep
    /// the transaction around and retry later.
    Defer,
}

/// One unconfirmed name operation, as reported to listing callers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PendingNameOp {
    pub name: Vec<u8>,
    pub txid: Txid,
    pub mine: bool,
}

/// Context-free checks: at most one well-formed name operation, with its
/// arguments inside the protocol limits. `Ok(None)` means `tx` does not
/// carry the name version tag and takes no part in the registry.
pub fn check_transaction(tx: &Transaction) -> Result<Option<(usize, NameOp)>, NameError> {
    if !tx.is_name_version() {
        return Ok(None);
    }
    let (vout, op) = decode_name_tx(tx)?.ok_or(NameError::MissingNameOutput)?;
    if let Some(name) = op.name() {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(NameError::NameLength);
        }
    }
    if let Some(value) = op.value() {
        if value.len() > MAX_VALUE_LENGTH {
            return Err(NameError::ValueTooLong);
        }
    }
    if let NameOp::New { commitment } = &op {
        if commitment.len() != COMMITMENT_LENGTH {
            return Err(NameError::CommitmentLength);
        }
    }
    if let NameOp::FirstUpdate { reveal, .. } = &op {
        if reveal.len() > MAX_REVEAL_LENGTH {
            return Err(NameError::RevealTooLong);
        }
    }
    Ok(Some((vout, op)))
}

/// Owns the history store and the pending index, and serializes all name
/// validation and mutation. The caller provides the exclusion guarantee:
/// no two block connects/disconnects run concurrently, and pool mutation
/// never interleaves with them.
pub struct Registry {
    store: NameStore,
    pending: PendingIndex,
    policy: Box<dyn Policy>,
}

impl Registry {
    pub fn new(store: NameStore, policy: Box<dyn Policy>) -> Self {
        Registry {
            store,
            pending: PendingIndex::new(),
            policy,
        }
    }

    pub fn open(db: &sled::Db, policy: Box<dyn Policy>) -> Result<Self, StoreError> {
        Ok(Self::new(NameStore::open(db)?, policy))
    }

    pub fn store(&self) -> &NameStore {
        &self.store
    }

    pub fn pending(&self) -> &PendingIndex {
        &self.pending
    }

    /// First height at which `record` no longer counts as live.
    pub fn expires_at(&self, record: &NameRecord) -> BlockNumber {
        record.height + self.policy.expiration_depth(record.height)
    }

    fn is_live(&self, record: &NameRecord, at: BlockNumber) -> bool {
        at.saturating_sub(record.height) < self.policy.expiration_depth(record.height)
    }

    /// The single name input of `tx`: the input whose previous output
    /// carries a name operation.
    fn name_input(
        &self,
        ledger: &dyn LedgerView,
        tx: &Transaction,
    ) -> Result<Option<(OutPoint, NameOp)>, NameError> {
        let mut found = None;
        for input in &tx.inputs {
            let prev = match ledger.prev_output(&input.prevout) {
                Some(prev) => prev,
                None => continue,
            };
            if let Ok(op) = decode_name_script(&prev.script) {
                if found.is_some() {
                    return Err(NameError::MultipleNameInputs);
                }
                found = Some((input.prevout.clone(), op));
            }
        }
        Ok(found)
    }

    /// Validate one transaction against chain state at `height` (the
    /// height the transaction would confirm at; pass tip + 1 for pool and
    /// miner checks).
    pub fn validate(
        &self,
        ledger: &dyn LedgerView,
        tx: &Transaction,
        height: BlockNumber,
        mode: Mode,
    ) -> Result<Verdict, NameError> {
        let name_input = self.name_input(ledger, tx)?;

        if !tx.is_name_version() {
            if name_input.is_some() {
                return Err(NameError::UntaggedNameSpend);
            }
            let smuggled = tx
                .outputs
                .iter()
                .any(|out| decode_name_script(&out.script).is_ok());
            if smuggled {
                // Historical tolerance covers already-mined blocks only;
                // the pool and the miner never admit a smuggled output.
                match mode {
                    Mode::Block if height < self.policy.tag_enforcement_height() => {
                        log::warn!(
                            target: LOG_TARGET,
                            "tolerating untagged name output in {} below enforcement height",
                            tx.txid(),
                        );
                    }
                    _ => return Err(NameError::UntaggedNameOutput),
                }
            }
            return Ok(Verdict::Accept);
        }

        let (_, op) = check_transaction(tx)?.ok_or(NameError::MissingNameOutput)?;
        match op {
            NameOp::New { .. } => {
                if name_input.is_some() {
                    return Err(NameError::NewSpendsName);
                }
                Ok(Verdict::Accept)
            }
            NameOp::FirstUpdate {
                name,
                reveal,
                value: _,
            } => self.validate_first_update(ledger, tx, height, mode, &name, &reveal, name_input),
            NameOp::Update { name, value: _ } => {
                self.validate_update(ledger, height, mode, &name, name_input)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_first_update(
        &self,
        ledger: &dyn LedgerView,
        tx: &Transaction,
        height: BlockNumber,
        mode: Mode,
        name: &[u8],
        reveal: &[u8],
        name_input: Option<(OutPoint, NameOp)>,
    ) -> Result<Verdict, NameError> {
        if mode.is_consensus() {
            let want = self.policy.registration_fee(height);
            let got = burn_total(tx);
            if got < want {
                return Err(NameError::FeeTooLow { got, want });
            }
        }

        let (prevout, prev_op) = name_input.ok_or(NameError::MissingCommitment)?;
        let commitment = match prev_op {
            NameOp::New { commitment } => commitment,
            _ => return Err(NameError::MissingCommitment),
        };
        if commitment_hash(reveal, name).as_bytes() != commitment.as_slice() {
            return Err(NameError::HashMismatch);
        }

        if let Some(record) = self.store.current_record(name)? {
            if self.is_live(&record, height) {
                return Err(NameError::NotFree);
            }
        }

        if mode.is_consensus() {
            match ledger
                .confirmed_position(&prevout.txid)
                .and_then(|pos| ledger.position_height(&pos))
            {
                None => return Ok(Verdict::Defer),
                Some(prev_height) => {
                    let depth = height.saturating_sub(prev_height);
                    if depth < MIN_FIRSTUPDATE_DEPTH {
                        return Ok(Verdict::Defer);
                    }
                    if matches!(mode, Mode::Miner { .. })
                        && depth >= self.policy.expiration_depth(prev_height)
                    {
                        return Err(NameError::CommitmentExpired);
                    }
                }
            }
        }

        // First come first served within one candidate block: once an
        // operation on this name is in the template, later ones wait.
        if let Mode::Miner { template } = mode {
            if let Some(set) = self.pending.pending_set(name) {
                let own = tx.txid();
                if set.iter().any(|txid| *txid != own && template.contains(txid)) {
                    return Ok(Verdict::Defer);
                }
            }
        }

        Ok(Verdict::Accept)
    }

    fn validate_update(
        &self,
        ledger: &dyn LedgerView,
        height: BlockNumber,
        mode: Mode,
        name: &[u8],
        name_input: Option<(OutPoint, NameOp)>,
    ) -> Result<Verdict, NameError> {
        let (prevout, prev_op) = name_input.ok_or(NameError::MissingPrevUpdate)?;
        match &prev_op {
            NameOp::FirstUpdate {
                name: prev_name, ..
            }
            | NameOp::Update {
                name: prev_name, ..
            } => {
                if prev_name.as_slice() != name {
                    return Err(NameError::NameMismatch);
                }
            }
            NameOp::New { .. } => return Err(NameError::MissingPrevUpdate),
        }

        let current = self.store.current_record(name)?;
        let prev_pos = ledger.confirmed_position(&prevout.txid);

        match &current {
            Some(record) if self.is_live(record, height) => {}
            Some(_) => return Err(NameError::Expired),
            // Nothing recorded yet: tolerable only while the previous
            // operation is itself still waiting in the pool.
            None if !mode.is_consensus() && prev_pos.is_none() => {}
            None => return Err(NameError::Expired),
        }

        if let (Some(record), Some(pos)) = (&current, prev_pos) {
            if record.pos != pos {
                // Historical chains contain updates whose input is not the
                // indexed tip of the name; inside a block this stays
                // tolerated below the strict-position activation height.
                let strict = match mode {
                    Mode::Block => height >= self.policy.strict_position_height(),
                    _ => true,
                };
                if strict {
                    return Err(NameError::PositionMismatch);
                }
                log::warn!(
                    target: LOG_TARGET,
                    "tolerating position mismatch on {:?}: input {} vs indexed {}",
                    String::from_utf8_lossy(name),
                    pos,
                    record.pos,
                );
            }
        }

        Ok(Verdict::Accept)
    }

    /// Validate and admit `tx` into the unconfirmed pool, marking its name
    /// pending.
    pub fn accept_to_pool(
        &mut self,
        ledger: &dyn LedgerView,
        tx: &Transaction,
    ) -> Result<(), NameError> {
        let height = ledger.tip_height() + 1;
        self.validate(ledger, tx, height, Mode::Pool)?;
        if let Some((_, op)) = check_transaction(tx)? {
            if let Some(name) = op.name() {
                self.pending.mark_pending(name, tx.txid());
                log::debug!(
                    target: LOG_TARGET,
                    "pool accepted {} on {:?}",
                    op.label(),
                    String::from_utf8_lossy(name),
                );
            }
        }
        Ok(())
    }

    /// Forget a transaction evicted or conflicted out of the pool.
    pub fn remove_from_pool(&mut self, tx: &Transaction) {
        if let Ok(Some((_, op))) = check_transaction(tx) {
            if let Some(name) = op.name() {
                self.pending.clear_pending(name, &tx.txid());
            }
        }
    }

    /// Apply a connecting block: validate every transaction in order and
    /// commit its history mutation. On error the block must not be
    /// considered applied; the caller disconnects it.
    pub fn connect_block(
        &mut self,
        ledger: &dyn LedgerView,
        block: &[(Transaction, TxPosition)],
        height: BlockNumber,
    ) -> Result<(), NameError> {
        for (tx, pos) in block {
            match self.validate(ledger, tx, height, Mode::Block)? {
                Verdict::Accept => {}
                Verdict::Defer => return Err(NameError::ImmatureCommitment),
            }
            let (_, op) = match check_transaction(tx)? {
                Some(found) => found,
                None => continue,
            };
            if let Some(name) = op.name() {
                self.store.append(
                    name,
                    NameRecord {
                        height,
                        value: op.value().unwrap_or_default().to_vec(),
                        pos: *pos,
                    },
                )?;
                self.pending.clear_pending(name, &tx.txid());
                log::info!(
                    target: LOG_TARGET,
                    "connected {} on {:?} at height {}",
                    op.label(),
                    String::from_utf8_lossy(name),
                    height,
                );
            }
        }
        Ok(())
    }

    /// Undo a disconnecting block, newest transaction first. Disconnected
    /// operations are not re-marked pending; a re-broadcast revalidates
    /// them from scratch.
    pub fn disconnect_block(
        &mut self,
        block: &[(Transaction, TxPosition)],
    ) -> Result<(), StoreError> {
        for (tx, pos) in block.iter().rev() {
            if !tx.is_name_version() {
                continue;
            }
            let op = match decode_name_tx(tx) {
                Ok(Some((_, op))) => op,
                _ => continue,
            };
            if let Some(name) = op.name() {
                self.store.rollback_last(name, pos)?;
            }
        }
        Ok(())
    }

    /// Every unconfirmed name operation, flagging those whose txid the
    /// caller recognizes as its own.
    pub fn pending_report(&self, my_txids: &BTreeSet<Txid>) -> Vec<PendingNameOp> {
        self.pending
            .snapshot()
            .into_iter()
            .flat_map(|(name, txids)| {
                txids.into_iter().map(move |txid| PendingNameOp {
                    name: name.clone(),
                    txid,
                    mine: my_txids.contains(&txid),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::name_op::{first_update_script, new_script, update_script};
    use crate::script::Script;
    use crate::types::{Coin, TxIn, TxOut, NAME_TX_VERSION};

    const TEST_FEE: Coin = 1_000;

    struct TestPolicy {
        expire: BlockNumber,
        strict_position: BlockNumber,
        tag_enforcement: BlockNumber,
    }

    impl Default for TestPolicy {
        fn default() -> Self {
            TestPolicy {
                expire: 50,
                strict_position: 0,
                tag_enforcement: 0,
            }
        }
    }

    impl Policy for TestPolicy {
        fn expiration_depth(&self, _height: BlockNumber) -> BlockNumber {
            self.expire
        }

        fn registration_fee(&self, _height: BlockNumber) -> Coin {
            TEST_FEE
        }

        fn strict_position_height(&self) -> BlockNumber {
            self.strict_position
        }

        fn tag_enforcement_height(&self) -> BlockNumber {
            self.tag_enforcement
        }
    }

    fn registry(policy: TestPolicy) -> Registry {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Registry::open(&db, Box::new(policy)).unwrap()
    }

    fn pay_to() -> Script {
        Script::from(vec![0xac])
    }

    fn new_tx(reveal: &[u8], name: &[u8]) -> Transaction {
        let commitment = commitment_hash(reveal, name);
        Transaction::from((
            vec![],
            vec![TxOut {
                value: 1,
                script: new_script(&commitment, &pay_to()),
            }],
        ))
    }

    fn spend(prev: &Transaction, vout: u32) -> TxIn {
        TxIn {
            prevout: OutPoint {
                txid: prev.txid(),
                vout,
            },
        }
    }

    fn first_update_tx(
        prev_new: &Transaction,
        name: &[u8],
        reveal: &[u8],
        value: &[u8],
        fee: Coin,
    ) -> Transaction {
        Transaction::from((
            vec![spend(prev_new, 0)],
            vec![
                TxOut {
                    value: fee,
                    script: Script::burn(),
                },
                TxOut {
                    value: 1,
                    script: first_update_script(name, reveal, value, &pay_to()),
                },
            ],
        ))
    }

    fn update_tx(prev: &Transaction, prev_vout: u32, name: &[u8], value: &[u8]) -> Transaction {
        Transaction::from((
            vec![spend(prev, prev_vout)],
            vec![TxOut {
                value: 1,
                script: update_script(name, value, &pay_to()),
            }],
        ))
    }

    fn connect(
        registry: &mut Registry,
        ledger: &mut MemoryLedger,
        txs: Vec<Transaction>,
    ) -> Result<Vec<(Transaction, TxPosition)>, NameError> {
        let block = ledger.push_block(txs);
        let height = ledger.tip_height();
        match registry.connect_block(ledger, &block, height) {
            Ok(()) => Ok(block),
            Err(e) => Err(e),
        }
    }

    #[test]
    fn commitment_matures_then_activates() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        ledger.mine_until(99);
        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        assert_eq!(ledger.tip_height(), 100);

        let activate = first_update_tx(&reserve, b"alice", b"ab", b"hello", TEST_FEE);

        // Depth 11 at height 111: valid but not yet minable.
        ledger.mine_until(110);
        let template = BTreeSet::new();
        let verdict = registry
            .validate(&ledger, &activate, 111, Mode::Miner { template: &template })
            .unwrap();
        assert_eq!(verdict, Verdict::Defer);

        // Depth 13 at height 113: minable and recorded.
        ledger.mine_until(112);
        let verdict = registry
            .validate(&ledger, &activate, 113, Mode::Miner { template: &template })
            .unwrap();
        assert_eq!(verdict, Verdict::Accept);

        connect(&mut registry, &mut ledger, vec![activate]).unwrap();
        let record = registry.store().current_record(b"alice").unwrap().unwrap();
        assert_eq!(record.height, 113);
        assert_eq!(record.value, b"hello".to_vec());
        assert_eq!(registry.expires_at(&record), 163);
    }

    #[test]
    fn immature_activation_in_a_block_is_rejected() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();

        let activate = first_update_tx(&reserve, b"alice", b"ab", b"hello", TEST_FEE);
        let err = connect(&mut registry, &mut ledger, vec![activate]).unwrap_err();
        assert!(matches!(err, NameError::ImmatureCommitment));
    }

    #[test]
    fn reveal_must_match_the_commitment() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(20);

        // One bit flipped in the reveal, then a different name.
        for (reveal, name) in [(b"ac".as_slice(), b"alice".as_slice()), (b"ab", b"alicf")] {
            let bad = first_update_tx(&reserve, name, reveal, b"hello", TEST_FEE);
            let err = registry
                .validate(&ledger, &bad, 21, Mode::Block)
                .unwrap_err();
            assert!(matches!(err, NameError::HashMismatch));
        }

        let good = first_update_tx(&reserve, b"alice", b"ab", b"hello", TEST_FEE);
        assert_eq!(
            registry.validate(&ledger, &good, 21, Mode::Block).unwrap(),
            Verdict::Accept
        );
    }

    #[test]
    fn registration_fee_is_consensus_only() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(20);

        let cheap = first_update_tx(&reserve, b"alice", b"ab", b"hello", TEST_FEE - 1);
        let err = registry
            .validate(&ledger, &cheap, 21, Mode::Block)
            .unwrap_err();
        assert!(matches!(
            err,
            NameError::FeeTooLow {
                got: 999,
                want: TEST_FEE
            }
        ));

        // The pool does not police the fee.
        assert_eq!(
            registry.validate(&ledger, &cheap, 21, Mode::Pool).unwrap(),
            Verdict::Accept
        );
    }

    #[test]
    fn expiry_boundary_is_exact() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(12);
        let activate = first_update_tx(&reserve, b"alice", b"ab", b"v1", TEST_FEE);
        let block = connect(&mut registry, &mut ledger, vec![activate.clone()]).unwrap();
        let activated_at = ledger.tip_height();
        assert_eq!(block[0].1, ledger.confirmed_position(&activate.txid()).unwrap());

        let renew = update_tx(&activate, 1, b"alice", b"v2");

        // Live at h + expire - 1, expired at h + expire.
        let last_live = activated_at + 50 - 1;
        assert_eq!(
            registry
                .validate(&ledger, &renew, last_live, Mode::Block)
                .unwrap(),
            Verdict::Accept
        );
        let err = registry
            .validate(&ledger, &renew, last_live + 1, Mode::Block)
            .unwrap_err();
        assert!(matches!(err, NameError::Expired));

        // And an expired name is free for a fresh commit-reveal cycle.
        ledger.mine_until(last_live + 1);
        let reserve2 = new_tx(b"cd", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve2.clone()]).unwrap();
        ledger.mine_until(ledger.tip_height() + 12);
        let reclaim = first_update_tx(&reserve2, b"alice", b"cd", b"new owner", TEST_FEE);
        assert_eq!(
            registry
                .validate(&ledger, &reclaim, ledger.tip_height() + 1, Mode::Block)
                .unwrap(),
            Verdict::Accept
        );

        // While live it was not free.
        let err = registry
            .validate(&ledger, &reclaim, last_live, Mode::Pool)
            .unwrap_err();
        assert!(matches!(err, NameError::NotFree));
    }

    #[test]
    fn update_chain_and_reorg_are_inverse() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(12);
        let activate = first_update_tx(&reserve, b"alice", b"ab", b"v1", TEST_FEE);
        connect(&mut registry, &mut ledger, vec![activate.clone()]).unwrap();

        let update1 = update_tx(&activate, 1, b"alice", b"v2");
        let block1 = connect(&mut registry, &mut ledger, vec![update1.clone()]).unwrap();
        let update2 = update_tx(&update1, 0, b"alice", b"v3");
        let block2 = connect(&mut registry, &mut ledger, vec![update2]).unwrap();

        let full = registry.store().history(b"alice").unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(full[2].value, b"v3".to_vec());

        ledger.pop_block();
        registry.disconnect_block(&block2).unwrap();
        assert_eq!(
            registry.store().current_record(b"alice").unwrap().unwrap().value,
            b"v2".to_vec()
        );

        ledger.pop_block();
        registry.disconnect_block(&block1).unwrap();
        assert_eq!(
            registry.store().current_record(b"alice").unwrap().unwrap().value,
            b"v1".to_vec()
        );
    }

    #[test]
    fn update_must_spend_the_indexed_tip() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(12);
        let activate = first_update_tx(&reserve, b"alice", b"ab", b"v1", TEST_FEE);
        connect(&mut registry, &mut ledger, vec![activate.clone()]).unwrap();
        let update1 = update_tx(&activate, 1, b"alice", b"v2");
        connect(&mut registry, &mut ledger, vec![update1]).unwrap();

        // A second update spending the superseded first-update output.
        let stale = update_tx(&activate, 1, b"alice", b"hijack");
        let height = ledger.tip_height() + 1;
        let err = registry
            .validate(&ledger, &stale, height, Mode::Block)
            .unwrap_err();
        assert!(matches!(err, NameError::PositionMismatch));
        let err = registry
            .validate(&ledger, &stale, height, Mode::Pool)
            .unwrap_err();
        assert!(matches!(err, NameError::PositionMismatch));
    }

    #[test]
    fn position_mismatch_is_tolerated_in_blocks_below_activation() {
        let mut registry = registry(TestPolicy {
            strict_position: 1_000,
            ..Default::default()
        });
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(12);
        let activate = first_update_tx(&reserve, b"alice", b"ab", b"v1", TEST_FEE);
        connect(&mut registry, &mut ledger, vec![activate.clone()]).unwrap();
        let update1 = update_tx(&activate, 1, b"alice", b"v2");
        connect(&mut registry, &mut ledger, vec![update1]).unwrap();

        let stale = update_tx(&activate, 1, b"alice", b"old style");
        let height = ledger.tip_height() + 1;
        assert_eq!(
            registry
                .validate(&ledger, &stale, height, Mode::Block)
                .unwrap(),
            Verdict::Accept
        );
        // Pool acceptance stays strict regardless of the activation height.
        let err = registry
            .validate(&ledger, &stale, height, Mode::Pool)
            .unwrap_err();
        assert!(matches!(err, NameError::PositionMismatch));
    }

    #[test]
    fn second_pending_activation_on_a_name_waits_its_turn() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve_a = new_tx(b"ab", b"bob");
        let reserve_b = new_tx(b"cd", b"bob");
        connect(
            &mut registry,
            &mut ledger,
            vec![reserve_a.clone(), reserve_b.clone()],
        )
        .unwrap();
        ledger.mine_until(13);

        let act_a = first_update_tx(&reserve_a, b"bob", b"ab", b"from a", TEST_FEE);
        let act_b = first_update_tx(&reserve_b, b"bob", b"cd", b"from b", TEST_FEE);
        ledger.add_unconfirmed(act_a.clone());
        ledger.add_unconfirmed(act_b.clone());
        registry.accept_to_pool(&ledger, &act_a).unwrap();
        registry.accept_to_pool(&ledger, &act_b).unwrap();

        let mut template = BTreeSet::new();
        let height = ledger.tip_height() + 1;
        assert_eq!(
            registry
                .validate(&ledger, &act_a, height, Mode::Miner { template: &template })
                .unwrap(),
            Verdict::Accept
        );
        template.insert(act_a.txid());
        assert_eq!(
            registry
                .validate(&ledger, &act_b, height, Mode::Miner { template: &template })
                .unwrap(),
            Verdict::Defer
        );
    }

    #[test]
    fn pool_bookkeeping_and_pending_report() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();
        ledger.mine_until(13);

        let activate = first_update_tx(&reserve, b"alice", b"ab", b"v1", TEST_FEE);
        ledger.add_unconfirmed(activate.clone());
        registry.accept_to_pool(&ledger, &activate).unwrap();
        assert!(registry.pending().has_pending(b"alice"));

        let mine: BTreeSet<Txid> = [activate.txid()].into_iter().collect();
        let report = registry.pending_report(&mine);
        assert_eq!(report.len(), 1);
        assert!(report[0].mine);
        assert_eq!(report[0].name, b"alice".to_vec());

        assert!(!registry.pending_report(&BTreeSet::new())[0].mine);

        // Confirmation clears the pending entry.
        connect(&mut registry, &mut ledger, vec![activate]).unwrap();
        assert!(!registry.pending().has_pending(b"alice"));
    }

    #[test]
    fn new_may_not_spend_a_name_output() {
        let mut registry = registry(TestPolicy::default());
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();

        let mut grab = new_tx(b"cd", b"other");
        grab.inputs.push(spend(&reserve, 0));
        let err = registry
            .validate(&ledger, &grab, 2, Mode::Pool)
            .unwrap_err();
        assert!(matches!(err, NameError::NewSpendsName));
    }

    #[test]
    fn untagged_transactions_cannot_smuggle_or_spend_names() {
        let mut registry = registry(TestPolicy {
            tag_enforcement: 100,
            ..Default::default()
        });
        let mut ledger = MemoryLedger::new();

        let reserve = new_tx(b"ab", b"alice");
        connect(&mut registry, &mut ledger, vec![reserve.clone()]).unwrap();

        let mut smuggle = Transaction::from((
            vec![],
            vec![TxOut {
                value: 1,
                script: update_script(b"alice", b"v", &pay_to()),
            }],
        ));
        smuggle.version = 1;
        assert!(!smuggle.is_name_version());

        // Below the enforcement height already-mined blocks tolerate it;
        // the pool and the miner never do.
        assert_eq!(
            registry.validate(&ledger, &smuggle, 50, Mode::Block).unwrap(),
            Verdict::Accept
        );
        assert!(matches!(
            registry.validate(&ledger, &smuggle, 100, Mode::Block),
            Err(NameError::UntaggedNameOutput)
        ));
        assert!(matches!(
            registry.validate(&ledger, &smuggle, 50, Mode::Pool),
            Err(NameError::UntaggedNameOutput)
        ));
        let template = BTreeSet::new();
        assert!(matches!(
            registry.validate(&ledger, &smuggle, 50, Mode::Miner { template: &template }),
            Err(NameError::UntaggedNameOutput)
        ));

        let mut steal = Transaction::from((
            vec![spend(&reserve, 0)],
            vec![TxOut {
                value: 1,
                script: pay_to(),
            }],
        ));
        steal.version = 1;
        assert!(matches!(
            registry.validate(&ledger, &steal, 50, Mode::Block),
            Err(NameError::UntaggedNameSpend)
        ));
    }

    #[test]
    fn context_free_limits() {
        // Tagged but no name output.
        let bare = Transaction {
            version: NAME_TX_VERSION,
            inputs: vec![],
            outputs: vec![TxOut {
                value: 1,
                script: pay_to(),
            }],
        };
        assert!(matches!(
            check_transaction(&bare),
            Err(NameError::MissingNameOutput)
        ));

        let long_name = vec![b'x'; 256];
        let tx = Transaction::from((
            vec![],
            vec![TxOut {
                value: 1,
                script: update_script(&long_name, b"v", &pay_to()),
            }],
        ));
        assert!(matches!(check_transaction(&tx), Err(NameError::NameLength)));

        let big_value = vec![0u8; 1024];
        let tx = Transaction::from((
            vec![],
            vec![TxOut {
                value: 1,
                script: update_script(b"alice", &big_value, &pay_to()),
            }],
        ));
        assert!(matches!(
            check_transaction(&tx),
            Err(NameError::ValueTooLong)
        ));

        let mut bad_commit = Script::new();
        bad_commit.push_small_int(1);
        bad_commit.push_data(&[0u8; 19]);
        bad_commit.push_op(crate::script::OP_2DROP);
        let tx = Transaction::from((
            vec![],
            vec![TxOut {
                value: 1,
                script: bad_commit,
            }],
        ));
        assert!(matches!(
            check_transaction(&tx),
            Err(NameError::CommitmentLength)
        ));

        // Untagged transactions are invisible here.
        let mut plain = Transaction::default();
        plain.outputs.push(TxOut {
            value: 1,
            script: pay_to(),
        });
        assert!(check_transaction(&plain).unwrap().is_none());
    }
}
