//! Consensus parameters that vary with chain height. Embedders supply an
//! implementation; [`StandardPolicy`] carries the stock values with every
//! rule active from genesis.

use crate::types::{BlockNumber, Coin, COIN};

/// Depth after which an unrenewed registration lapses: one year of
/// one-minute blocks.
pub const EXPIRATION_DEPTH: BlockNumber = 365 * 24 * 60;

/// The fee a `FirstUpdate` must burn to activate a name.
pub const REGISTRATION_FEE: Coin = 2_000 * COIN;

pub trait Policy {
    /// How many blocks a record registered (or renewed) at `height` stays
    /// live.
    fn expiration_depth(&self, _height: BlockNumber) -> BlockNumber {
        EXPIRATION_DEPTH
    }

    /// The burn required of a `FirstUpdate` confirming at `height`.
    fn registration_fee(&self, _height: BlockNumber) -> Coin {
        REGISTRATION_FEE
    }

    /// Height from which an `Update` in a block must spend the output that
    /// carried the previous operation, not merely an output of the same
    /// transaction.
    fn strict_position_height(&self) -> BlockNumber;

    /// Height from which a block transaction without the name version tag
    /// may no longer carry a name output.
    fn tag_enforcement_height(&self) -> BlockNumber;
}

/// All rules active from genesis. Chains with history predating a rule
/// implement [`Policy`] themselves with their historical heights.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardPolicy;

impl Policy for StandardPolicy {
    fn strict_position_height(&self) -> BlockNumber {
        0
    }

    fn tag_enforcement_height(&self) -> BlockNumber {
        0
    }
}
