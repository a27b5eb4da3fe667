//! The commitment module holds the hash commitments published to the settlement layer.
//!
//! Every commitment is the keccak256 hash of the ABI encoding of its fields, so the anchor can
//! recompute them without any bespoke encoding.

use super::{Bisection, Cut, DisputeId, ExecutionAssertion, Precondition};
use ethers::{
    abi::{self, Token},
    types::{H256, U256},
    utils::keccak256,
};

fn word(hash: &H256) -> Token {
    Token::FixedBytes(hash.as_bytes().to_vec())
}

fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

/// Computes the commitment to a [Precondition].
pub fn hash_precondition(precondition: &Precondition) -> H256 {
    let bounds = &precondition.time_bounds;
    H256::from(keccak256(abi::encode(&[
        word(&precondition.before_state),
        uint(bounds.lower_block),
        uint(bounds.upper_block),
        uint(bounds.lower_timestamp),
        uint(bounds.upper_timestamp),
        word(&precondition.inbox),
    ])))
}

/// Computes the commitment to an [ExecutionAssertion].
pub fn hash_assertion(assertion: &ExecutionAssertion) -> H256 {
    H256::from(keccak256(abi::encode(&[
        word(&assertion.after_state),
        uint(assertion.num_steps),
        uint(assertion.num_gas),
        Token::Bool(assertion.did_inbox_insn),
        word(&assertion.outputs),
    ])))
}

/// Computes the commitment to a [Cut].
pub fn hash_cut(cut: &Cut) -> H256 {
    H256::from(keccak256(abi::encode(&[
        uint(cut.step_count),
        word(&cut.state_hash),
        word(&cut.pending_value_hash),
    ])))
}

/// Computes the commitment to a [Bisection]: the hash of its concatenated, ordered cut hashes.
pub fn hash_bisection(bisection: &Bisection) -> H256 {
    debug_assert!(!bisection.cuts().is_empty(), "empty bisection");
    let packed = bisection
        .cuts()
        .iter()
        .flat_map(|cut| hash_cut(cut).to_fixed_bytes())
        .collect::<Vec<u8>>();
    H256::from(keccak256(packed))
}

/// Computes the identity of a dispute.
pub fn dispute_id(num_steps: u64, precondition_hash: H256, assertion_hash: H256) -> DisputeId {
    H256::from(keccak256(abi::encode(&[
        uint(num_steps),
        word(&precondition_hash),
        word(&assertion_hash),
    ])))
}

/// Extends the pending value hash-chain `prev` with `outputs`, in order.
pub fn accumulate_outputs(prev: H256, outputs: &[H256]) -> H256 {
    outputs.iter().fold(prev, |acc, output| {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(acc.as_bytes());
        buf[32..].copy_from_slice(output.as_bytes());
        H256::from(keccak256(buf))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execution::TimeBounds;

    fn cut(step: u64, fill: u8) -> Cut {
        Cut::new(step, H256::repeat_byte(fill), H256::repeat_byte(fill ^ 0xff))
    }

    #[test]
    fn bisection_commitment_is_order_sensitive() {
        let a = Bisection::from_cuts(vec![cut(0, 1), cut(5, 2), cut(10, 3)]);
        let b = Bisection::from_cuts(vec![cut(0, 1), cut(10, 3), cut(5, 2)]);
        assert_ne!(hash_bisection(&a), hash_bisection(&b));
        assert_eq!(hash_bisection(&a), hash_bisection(&a.clone()));
    }

    #[test]
    fn cut_commitment_covers_every_field() {
        let base = cut(7, 9);
        let mut other = base;
        other.step_count = 8;
        assert_ne!(hash_cut(&base), hash_cut(&other));

        let mut other = base;
        other.pending_value_hash = H256::zero();
        assert_ne!(hash_cut(&base), hash_cut(&other));
    }

    #[test]
    fn dispute_id_binds_all_inputs() {
        let precondition = Precondition {
            before_state: H256::repeat_byte(1),
            time_bounds: TimeBounds {
                lower_block: 100,
                upper_block: 120,
                lower_timestamp: 80,
                upper_timestamp: 120,
            },
            inbox: H256::zero(),
        };
        let assertion = ExecutionAssertion {
            after_state: H256::repeat_byte(2),
            num_steps: 500,
            num_gas: 1_000,
            did_inbox_insn: false,
            outputs: H256::zero(),
        };
        let pre = hash_precondition(&precondition);
        let post = hash_assertion(&assertion);

        let id = dispute_id(500, pre, post);
        assert_eq!(id, dispute_id(500, pre, post));
        assert_ne!(id, dispute_id(499, pre, post));
        assert_ne!(id, dispute_id(500, post, pre));
    }

    #[test]
    fn output_accumulation_is_sequential() {
        let outputs = [H256::repeat_byte(1), H256::repeat_byte(2), H256::repeat_byte(3)];
        let whole = accumulate_outputs(H256::zero(), &outputs);
        let split = accumulate_outputs(
            accumulate_outputs(H256::zero(), &outputs[..1]),
            &outputs[1..],
        );
        assert_eq!(whole, split);
        assert_eq!(accumulate_outputs(whole, &[]), whole);
    }
}
