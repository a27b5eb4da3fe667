//! The bisection module splits disputed segments into cuts, validates bisections made by the
//! opponent, and locates the first segment a participant disagrees with.

use super::{
    accumulate_outputs, Bisection, ChallengeError, Cut, Machine, OneStepProof, Precondition,
    Segment,
};
use ethers::types::H256;
use std::iter;

/// Returns the number of segments a segment of `len` steps is split into when the game is played
/// with `segment_count` segments per bisection.
pub fn expected_segment_count(len: u64, segment_count: u64) -> u64 {
    segment_count.min(len)
}

/// Computes the step counts of the cuts bisecting `segment` into `segment_count` parts. Every
/// part is `len / k` steps long, except the last which absorbs the remainder.
pub fn segment_boundaries(
    segment: &Segment,
    segment_count: u64,
) -> Result<Vec<u64>, ChallengeError> {
    if segment_count < 2 {
        return Err(ChallengeError::InvalidParams(format!(
            "segment count must be at least 2, got {segment_count}"
        )));
    }
    let len = segment.len();
    if len < 2 {
        return Err(ChallengeError::SegmentTooShort(len));
    }

    let k = expected_segment_count(len, segment_count);
    let chunk = len / k;
    let start = segment.start.step_count;
    Ok((0..k)
        .map(|i| start + i * chunk)
        .chain(iter::once(segment.end.step_count))
        .collect())
}

/// Clones `machine` and advances the copy by `steps` steps.
pub fn replay_to<M: Machine>(
    machine: &M,
    steps: u64,
    precondition: &Precondition,
) -> Result<M, ChallengeError> {
    let mut machine = machine.clone();
    let (_, executed) =
        machine.execute_assertion(steps, &precondition.time_bounds, precondition.inbox);
    if executed < steps {
        return Err(ChallengeError::MachineHalted {
            executed,
            requested: steps,
        });
    }
    Ok(machine)
}

/// Advances `machine` by `steps` steps, extending `pending` with the emitted outputs. Returns
/// `None` if the machine halts first.
fn run_segment<M: Machine>(
    machine: &mut M,
    steps: u64,
    pending: H256,
    precondition: &Precondition,
) -> Option<H256> {
    let (assertion, executed) =
        machine.execute_assertion(steps, &precondition.time_bounds, precondition.inbox);
    (executed == steps).then(|| accumulate_outputs(pending, &assertion.outputs))
}

/// Bisects `segment` by running `machine` forward from the segment's start cut.
///
/// ### Takes
/// - `segment`: The disputed segment. Must be at least two steps long.
/// - `machine`: The machine, positioned at `segment.start`.
/// - `segment_count`: The number of segments per bisection.
/// - `precondition`: The precondition of the dispute.
///
/// ### Returns
/// - `Ok(Bisection)`: The cuts, starting and ending with the segment's own cuts.
/// - `Err(ChallengeError)`: The segment cannot be bisected or the machine halted.
pub fn propose_bisection<M: Machine>(
    segment: &Segment,
    machine: &M,
    segment_count: u64,
    precondition: &Precondition,
) -> Result<Bisection, ChallengeError> {
    let boundaries = segment_boundaries(segment, segment_count)?;
    let interior = &boundaries[1..boundaries.len() - 1];

    let mut machine = machine.clone();
    let mut cuts = Vec::with_capacity(boundaries.len());
    cuts.push(segment.start);

    let mut prev = segment.start;
    for &step_count in interior {
        let steps = step_count - prev.step_count;
        let pending = run_segment(&mut machine, steps, prev.pending_value_hash, precondition)
            .ok_or(ChallengeError::MachineHalted {
                executed: prev.step_count - segment.start.step_count,
                requested: step_count - segment.start.step_count,
            })?;
        prev = Cut::new(step_count, machine.hash(), pending);
        cuts.push(prev);
    }
    cuts.push(segment.end);

    Ok(Bisection::from_cuts(cuts))
}

/// Checks `bisection` against the disputed `segment`: the boundary cuts must match, step counts
/// must strictly increase, and the bisection must have the expected number of segments.
pub fn check_bisection(
    bisection: &Bisection,
    segment: &Segment,
    segment_count: u64,
) -> Result<(), ChallengeError> {
    let len = segment.len();
    if len < 2 {
        return Err(ChallengeError::SegmentTooShort(len));
    }

    let expected = expected_segment_count(len, segment_count) as usize;
    if bisection.segment_count() != expected {
        return Err(ChallengeError::InvalidBisection(format!(
            "expected {expected} segments, found {}",
            bisection.segment_count()
        )));
    }
    if bisection.cuts().first() != Some(&segment.start) {
        return Err(ChallengeError::InvalidBisection(
            "first cut does not match the start of the disputed segment".to_string(),
        ));
    }
    if bisection.cuts().last() != Some(&segment.end) {
        return Err(ChallengeError::InvalidBisection(
            "last cut does not match the end of the disputed segment".to_string(),
        ));
    }
    if !bisection
        .cuts()
        .windows(2)
        .all(|w| w[0].step_count < w[1].step_count)
    {
        return Err(ChallengeError::InvalidBisection(
            "cut step counts are not strictly increasing".to_string(),
        ));
    }

    Ok(())
}

/// Returns `true` if `bisection` is a well formed bisection of `segment`. Only the shape is
/// checked; intermediate cuts remain claims until disputed.
pub fn validate_bisection(bisection: &Bisection, segment: &Segment, segment_count: u64) -> bool {
    check_bisection(bisection, segment, segment_count).is_ok()
}

/// Replays every segment of `bisection` locally and returns the index of the first segment whose
/// claimed end cut differs from the local result.
///
/// ### Takes
/// - `bisection`: The claimed bisection.
/// - `machine`: The local machine, positioned at the bisection's first cut.
/// - `precondition`: The precondition of the dispute.
///
/// ### Returns
/// - `Ok(usize)`: The index of the first divergent segment.
/// - `Err(ChallengeError::DisagreementNotFound)`: Every claimed cut matches local execution.
pub fn select_disagreement<M: Machine>(
    bisection: &Bisection,
    machine: &M,
    precondition: &Precondition,
) -> Result<usize, ChallengeError> {
    let mut machine = machine.clone();
    for (index, segment) in bisection.segments().enumerate() {
        let Some(pending) = run_segment(
            &mut machine,
            segment.len(),
            segment.start.pending_value_hash,
            precondition,
        ) else {
            // The claimed cut lies past the point our machine halts at.
            return Ok(index);
        };

        let local = Cut::new(segment.end.step_count, machine.hash(), pending);
        if local != segment.end {
            return Ok(index);
        }
    }

    Err(ChallengeError::DisagreementNotFound)
}

/// Builds the [OneStepProof] for the step following `start`.
///
/// ### Takes
/// - `machine`: The machine, positioned at `start`.
/// - `start`: The agreed cut the step begins at.
/// - `precondition`: The precondition of the dispute.
pub fn build_one_step_proof<M: Machine>(
    machine: &M,
    start: &Cut,
    precondition: &Precondition,
) -> Result<OneStepProof, ChallengeError> {
    let evidence = machine.one_step_proof();
    let mut next = machine.clone();
    let (assertion, executed) =
        next.execute_assertion(1, &precondition.time_bounds, precondition.inbox);
    if executed != 1 {
        return Err(ChallengeError::MachineHalted {
            executed,
            requested: 1,
        });
    }

    Ok(OneStepProof {
        before_state: machine.hash(),
        after_state: next.hash(),
        after_pending: accumulate_outputs(start.pending_value_hash, &assertion.outputs),
        evidence,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execution::{AlphabetMachine, TimeBounds};

    fn precondition(machine: &AlphabetMachine) -> Precondition {
        Precondition {
            before_state: machine.hash(),
            time_bounds: TimeBounds::default(),
            inbox: H256::repeat_byte(0x42),
        }
    }

    /// Runs `machine` for `steps` steps and returns the full dispute segment it claims.
    fn claimed_segment(machine: &AlphabetMachine, steps: u64) -> (Segment, Precondition) {
        let pre = precondition(machine);
        let mut after = machine.clone();
        let (assertion, _) = after.execute_assertion(steps, &pre.time_bounds, pre.inbox);
        let stub = assertion.stub();
        let segment = Segment::new(
            Cut::new(0, pre.before_state, H256::zero()),
            Cut::new(steps, stub.after_state, stub.outputs),
        );
        (segment, pre)
    }

    #[test]
    fn boundaries_split_evenly_with_remainder_last() {
        let (segment, _) = claimed_segment(&AlphabetMachine::default(), 500);
        assert_eq!(
            segment_boundaries(&segment, 4).unwrap(),
            vec![0, 125, 250, 375, 500]
        );

        let (segment, _) = claimed_segment(&AlphabetMachine::default(), 10);
        assert_eq!(segment_boundaries(&segment, 4).unwrap(), vec![0, 2, 4, 6, 10]);

        let (segment, _) = claimed_segment(&AlphabetMachine::default(), 3);
        assert_eq!(segment_boundaries(&segment, 4).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn single_step_segments_cannot_be_bisected() {
        let machine = AlphabetMachine::default();
        let (segment, pre) = claimed_segment(&machine, 1);
        assert_eq!(
            propose_bisection(&segment, &machine, 4, &pre),
            Err(ChallengeError::SegmentTooShort(1))
        );
    }

    #[test]
    fn proposed_bisection_partitions_parent_exactly() {
        let machine = AlphabetMachine::default();
        for steps in [2, 3, 7, 64, 500] {
            let (segment, pre) = claimed_segment(&machine, steps);
            let bisection = propose_bisection(&segment, &machine, 4, &pre).unwrap();

            assert!(validate_bisection(&bisection, &segment, 4));
            assert_eq!(bisection.span(), Some(segment));
            assert_eq!(
                bisection.segments().map(|s| s.len()).sum::<u64>(),
                segment.len()
            );
            assert!(bisection.segments().all(|s| s.len() >= 1));
        }
    }

    #[test]
    fn honest_bisection_has_no_disagreement() {
        let machine = AlphabetMachine::default();
        let (segment, pre) = claimed_segment(&machine, 500);
        let bisection = propose_bisection(&segment, &machine, 4, &pre).unwrap();

        assert_eq!(
            select_disagreement(&bisection, &machine, &pre),
            Err(ChallengeError::DisagreementNotFound)
        );
    }

    #[test]
    fn disagreement_points_at_the_faulty_segment() {
        let honest = AlphabetMachine::default();
        let faulty = AlphabetMachine::default().with_fault_at(250);
        let (segment, pre) = claimed_segment(&faulty, 500);
        let bisection = propose_bisection(&segment, &faulty, 4, &pre).unwrap();

        // Cut 250 closes the second segment.
        assert_eq!(select_disagreement(&bisection, &honest, &pre), Ok(1));
    }

    #[test]
    fn claims_past_a_halt_are_disputed() {
        let honest = AlphabetMachine::default();
        let (segment, pre) = claimed_segment(&honest, 100);
        let bisection = propose_bisection(&segment, &honest, 4, &pre).unwrap();

        let halting = AlphabetMachine::default().with_halt_at(60);
        assert_eq!(select_disagreement(&bisection, &halting, &pre), Ok(2));
    }

    #[test]
    fn malformed_bisections_are_rejected() {
        let machine = AlphabetMachine::default();
        let (segment, pre) = claimed_segment(&machine, 100);
        let bisection = propose_bisection(&segment, &machine, 4, &pre).unwrap();

        let mut swapped = bisection.cuts().to_vec();
        swapped.swap(1, 2);
        assert!(!validate_bisection(
            &Bisection::from_cuts(swapped),
            &segment,
            4
        ));

        let mut moved = bisection.cuts().to_vec();
        moved[0].state_hash = H256::repeat_byte(9);
        assert!(!validate_bisection(&Bisection::from_cuts(moved), &segment, 4));

        let mut short = bisection.cuts().to_vec();
        short.remove(1);
        assert!(matches!(
            check_bisection(&Bisection::from_cuts(short), &segment, 4),
            Err(ChallengeError::InvalidBisection(_))
        ));

        assert!(!validate_bisection(&bisection, &segment, 5));
    }

    #[test]
    fn one_step_proof_matches_the_next_cut() {
        let machine = AlphabetMachine::default();
        let (segment, pre) = claimed_segment(&machine, 9);
        let at_start = replay_to(&machine, 8, &pre).unwrap();
        let bisection = propose_bisection(&segment, &machine, 9, &pre).unwrap();
        let start = bisection.cuts()[8];

        let proof = build_one_step_proof(&at_start, &start, &pre).unwrap();
        assert_eq!(proof.before_state, start.state_hash);
        assert_eq!(proof.after_state, segment.end.state_hash);
        assert_eq!(proof.after_pending, segment.end.pending_value_hash);
        assert!(!proof.evidence.is_empty());
    }

    #[test]
    fn replay_fails_when_the_machine_halts() {
        let machine = AlphabetMachine::default().with_halt_at(3);
        let pre = precondition(&machine);
        assert_eq!(
            replay_to(&machine, 5, &pre).unwrap_err(),
            ChallengeError::MachineHalted {
                executed: 3,
                requested: 5
            }
        );
    }
}
