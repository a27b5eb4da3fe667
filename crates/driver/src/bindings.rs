use ethers::prelude::abigen;

// Generates the bindings for the `ExecutionChallenge` contract. Cuts are passed as parallel
// arrays of step counts, state hashes and pending value hashes.
abigen!(
    ExecutionChallenge,
    r"[
        event Bisected(bytes32 indexed disputeId, uint64[] stepCounts, bytes32[] stateHashes, bytes32[] pendingHashes)
        event SegmentChosen(bytes32 indexed disputeId, uint256 segmentIndex)
        event OneStepProofSubmitted(bytes32 indexed disputeId, bool fromAsserter, uint256 segmentIndex, bytes32 beforeState, bytes32 afterState, bytes32 afterPending, bytes evidence)
        event OneStepProofAdjudicated(bytes32 indexed disputeId, bool asserterWon)
        event TimedOut(bytes32 indexed disputeId, bool asserterWon)
        function bisect(bytes32 disputeId, uint64[] stepCounts, bytes32[] stateHashes, bytes32[] pendingHashes) external
        function chooseSegment(bytes32 disputeId, uint256 segmentIndex) external
        function oneStepProof(bytes32 disputeId, uint256 segmentIndex, bytes32 beforeState, bytes32 afterState, bytes32 afterPending, bytes evidence) external
        function timeout(bytes32 disputeId) external
    ]"
);
