//! A minimal Bitcoin-style output script: a byte string of opcodes and
//! data pushes. Only the opcodes needed by the name-operation grammar (and
//! the burn/pay clauses around it) are named here; everything else is an
//! uninterpreted opcode byte.

use crate::types::NameOpError;
use core::fmt;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Largest direct data push; longer pushes use the PUSHDATA opcodes.
pub const MAX_DIRECT_PUSH: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_NOP: u8 = 0x61;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_2DROP: u8 = 0x6d;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// One parsed script element.
#[derive(Debug, PartialEq, Eq)]
pub enum ScriptOp<'a> {
    /// A data push (possibly empty).
    Push(&'a [u8]),
    /// Any non-push opcode byte.
    Op(u8),
}

/// Bytes of an output script.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone, Hash, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a bare opcode.
    pub fn push_op(&mut self, op: u8) {
        self.0.push(op);
    }

    /// Append a small-integer opcode for `n` in `1..=16`.
    pub fn push_small_int(&mut self, n: u8) {
        debug_assert!((1..=16).contains(&n));
        self.0.push(OP_1 + n - 1);
    }

    /// Append `data` as a minimally-encoded push.
    pub fn push_data(&mut self, data: &[u8]) {
        match data.len() {
            n if n <= MAX_DIRECT_PUSH as usize => self.0.push(n as u8),
            n if n <= u8::MAX as usize => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(n as u8);
            }
            n if n <= u16::MAX as usize => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
    }

    /// Append the bytes of `other` verbatim.
    pub fn extend(&mut self, other: &Script) {
        self.0.extend_from_slice(&other.0);
    }

    /// Read the element at cursor `pc`, advancing the cursor past it.
    pub fn get_op(&self, pc: &mut usize) -> Result<ScriptOp<'_>, NameOpError> {
        let byte = *self.0.get(*pc).ok_or(NameOpError::UnexpectedEnd)?;
        *pc += 1;

        let len = match byte {
            n if n <= MAX_DIRECT_PUSH => n as usize,
            OP_PUSHDATA1 => {
                let n = *self.0.get(*pc).ok_or(NameOpError::UnexpectedEnd)? as usize;
                *pc += 1;
                n
            }
            OP_PUSHDATA2 => {
                let raw = self
                    .0
                    .get(*pc..*pc + 2)
                    .ok_or(NameOpError::UnexpectedEnd)?;
                *pc += 2;
                u16::from_le_bytes([raw[0], raw[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let raw = self
                    .0
                    .get(*pc..*pc + 4)
                    .ok_or(NameOpError::UnexpectedEnd)?;
                *pc += 4;
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            }
            op => return Ok(ScriptOp::Op(op)),
        };

        let data = self
            .0
            .get(*pc..*pc + len)
            .ok_or(NameOpError::UnexpectedEnd)?;
        *pc += len;
        Ok(ScriptOp::Push(data))
    }

    /// A bare burn script. Outputs paying to it are provably unspendable;
    /// the registration fee is burned this way.
    pub fn burn() -> Self {
        Self(vec![OP_RETURN])
    }

    /// Whether this is the bare burn script.
    pub fn is_burn(&self) -> bool {
        self.0 == [OP_RETURN]
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_slice()))
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[test]
fn push_data_round_trips_across_size_classes() {
    for len in [0usize, 1, 75, 76, 255, 256, 70_000] {
        let data = vec![0xab; len];
        let mut script = Script::new();
        script.push_data(&data);
        script.push_op(OP_DROP);

        let mut pc = 0;
        assert_eq!(script.get_op(&mut pc).unwrap(), ScriptOp::Push(&data[..]));
        assert_eq!(script.get_op(&mut pc).unwrap(), ScriptOp::Op(OP_DROP));
        assert_eq!(pc, script.len());
    }
}

#[test]
fn truncated_push_is_an_error() {
    let mut script = Script::new();
    script.push_data(&[1, 2, 3, 4]);
    let script = Script(script.0[..3].to_vec());

    let mut pc = 0;
    assert_eq!(script.get_op(&mut pc), Err(NameOpError::UnexpectedEnd));
}
