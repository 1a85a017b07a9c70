//! Fixed-size hash types used throughout the registry, plus the digest
//! helpers that produce them.

use cryptoxide::{blake2b::Blake2b, digest::Digest};
use fixed_hash::construct_fixed_hash;

construct_fixed_hash! {
    /// Fixed-size uninterpreted hash type with 20 bytes (160 bits) size.
    /// Used for name commitments.
    pub struct H160(20);
}

construct_fixed_hash! {
    /// Fixed-size uninterpreted hash type with 32 bytes (256 bits) size.
    /// Used for transaction ids.
    pub struct H256(32);
}

mod serde {
    use super::{H160, H256};
    use impl_serde::impl_fixed_hash_serde;

    impl_fixed_hash_serde!(H160, 20);
    impl_fixed_hash_serde!(H256, 32);
}

mod codec {
    use super::{H160, H256};
    use impl_codec::impl_fixed_hash_codec;

    impl_fixed_hash_codec!(H160, 20);
    impl_fixed_hash_codec!(H256, 32);
}

/// 20-byte digest of `data` (blake2b-160). Commitments for the
/// commit-reveal scheme are `hash160(reveal ‖ name)`.
pub fn hash160(data: &[u8]) -> H160 {
    let mut context = Blake2b::new(20);
    context.input(data);
    let mut out = [0u8; 20];
    context.result(&mut out);
    H160(out)
}

/// 32-byte digest of `data` (blake2b-256). Transaction ids are the
/// `hash256` of the transaction's SCALE encoding.
pub fn hash256(data: &[u8]) -> H256 {
    let mut context = Blake2b::new(32);
    context.input(data);
    let mut out = [0u8; 32];
    context.result(&mut out);
    H256(out)
}

#[test]
fn digests_have_expected_lengths_and_are_deterministic() {
    assert_eq!(hash160(b"abc"), hash160(b"abc"));
    assert_ne!(hash160(b"abc"), hash160(b"abd"));
    assert_eq!(hash256(b"abc"), hash256(b"abc"));
    assert_ne!(hash256(b"abc").0[..20], hash160(b"abc").0);
}
