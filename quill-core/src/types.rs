use crate::hashes::{hash256, H256};
use crate::script::Script;
use core::fmt;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Coin = u64;
pub type BlockNumber = u32;

/// Hash of a transaction's SCALE encoding.
pub type Txid = H256;

pub const COIN: Coin = 100_000_000;
pub const CENT: Coin = 1_000_000;

/// Version tag of transactions that are allowed to carry a name operation.
pub const NAME_TX_VERSION: u32 = 0x7100;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_VALUE_LENGTH: usize = 1023;
pub const MAX_REVEAL_LENGTH: usize = 20;
pub const COMMITMENT_LENGTH: usize = 20;

/// Confirmations a registration intent must have before its reveal may be
/// mined. Anti-front-running: a commitment cannot be revealed in the same
/// block range it was made.
pub const MIN_FIRSTUPDATE_DEPTH: u32 = 12;

/// Minimum coin value carried by a name output. Wallet-layer convention,
/// not consensus.
pub const MIN_AMOUNT: Coin = CENT;

/// A reference to an output that will be consumed.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone, Hash)]
pub struct OutPoint {
    /// A hash of the transaction that created this output
    pub txid: Txid,
    /// The index of this output among all outputs created by the same transaction
    pub vout: u32,
}

#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
pub struct TxIn {
    pub prevout: OutPoint,
}

#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
pub struct TxOut {
    pub value: Coin,
    pub script: Script,
}

#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone, Default)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    pub fn txid(&self) -> Txid {
        hash256(&self.encode())
    }

    /// Whether this transaction carries the name version tag.
    pub fn is_name_version(&self) -> bool {
        self.version == NAME_TX_VERSION
    }
}

impl From<(Vec<TxIn>, Vec<TxOut>)> for Transaction {
    fn from(i_o: (Vec<TxIn>, Vec<TxOut>)) -> Self {
        Self {
            version: NAME_TX_VERSION,
            inputs: i_o.0,
            outputs: i_o.1,
        }
    }
}

/// Stable locator of a confirmed transaction (block file id plus offset).
/// Only ever compared for equality; the registry never interprets it.
#[derive(
    Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone, Copy, Hash, Default,
)]
pub struct TxPosition {
    pub file: u32,
    pub offset: u64,
}

impl fmt::Display for TxPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}

/// One confirmed registration or renewal event for a name. Immutable once
/// written; histories only ever grow by `append` or shrink by reorg
/// rollback.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
pub struct NameRecord {
    pub height: BlockNumber,
    pub value: Vec<u8>,
    pub pos: TxPosition,
}

/// Ordered, append-only sequence of records for one name. The active
/// record is always the last element.
pub type NameHistory = Vec<NameRecord>;

/// Failures while parsing a name operation out of a script. Always a local
/// rejection of the single transaction, never fatal to block processing.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NameOpError {
    #[error("script ended inside a name prefix")]
    UnexpectedEnd,
    #[error("script does not start with a name operation")]
    NotNameScript,
    #[error("unknown name op {0}")]
    UnknownOp(u8),
    #[error("unexpected opcode {0:#04x} in a name prefix")]
    BadOpcode(u8),
    #[error("invalid argument count for {op}: {got}")]
    BadArgCount { op: &'static str, got: usize },
    #[error("more than one name output in one transaction")]
    MultipleOps,
}

/// Protocol violations raised by the registration validator. These reject
/// the transaction from the pool or, inside a connecting block, invalidate
/// the whole block.
#[derive(Debug, Error)]
pub enum NameError {
    #[error(transparent)]
    Op(#[from] NameOpError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("name-tagged transaction without a name output")]
    MissingNameOutput,
    #[error("name length out of range")]
    NameLength,
    #[error("commitment must be {COMMITMENT_LENGTH} bytes")]
    CommitmentLength,
    #[error("reveal longer than {MAX_REVEAL_LENGTH} bytes")]
    RevealTooLong,
    #[error("value longer than {MAX_VALUE_LENGTH} bytes")]
    ValueTooLong,
    #[error("registration intent spends a name input")]
    NewSpendsName,
    #[error("reveal without a matching commitment input")]
    MissingCommitment,
    #[error("commitment hash mismatch")]
    HashMismatch,
    #[error("name is not expired")]
    NotFree,
    #[error("name expired")]
    Expired,
    #[error("commitment input expired before it was revealed")]
    CommitmentExpired,
    #[error("commitment not yet mature")]
    ImmatureCommitment,
    #[error("update without a previous update operation")]
    MissingPrevUpdate,
    #[error("update name differs from the previous operation")]
    NameMismatch,
    #[error("registration fee too low: {got} < {want}")]
    FeeTooLow { got: Coin, want: Coin },
    #[error("previous operation is not the stored tip of the name history")]
    PositionMismatch,
    #[error("transaction spends more than one name input")]
    MultipleNameInputs,
    #[error("name output on an untagged transaction")]
    UntaggedNameOutput,
    #[error("name input spent by an untagged transaction")]
    UntaggedNameSpend,
}

/// Failures of the underlying storage engine. Fatal to the enclosing block
/// connect/disconnect; the block must not be considered applied.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage engine failure: {0}")]
    Backend(#[from] sled::Error),
    #[error("undecodable history for name {0:?}")]
    Corrupt(String),
}
