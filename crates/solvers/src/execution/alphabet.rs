//! The alphabet module contains a toy implementation of the [Machine] trait that walks an
//! alphabet program. It is used to simulate disputes locally.

use super::{Assertion, Machine, StateHash, TimeBounds};
use anyhow::{anyhow, Result};
use ethers::{
    abi::{self, Token},
    types::{Bytes, H256, U256},
    utils::keccak256,
};
use std::sync::Arc;

/// The program run by [AlphabetMachine::default].
pub const DEFAULT_PROGRAM: &str = "abcdefghijklmnopqrstuvwxyz";

/// A deterministic machine that executes one letter of its program per step.
///
/// Every step folds the step index and letter into a keccak accumulator. Vowels emit an output
/// message and `i` additionally mixes the inbox into the accumulator.
#[derive(Debug, Clone)]
pub struct AlphabetMachine {
    /// The program, shared between copies; it is never mutated.
    program: Arc<[u8]>,
    /// The hash of the program, committed to by every state hash.
    code_hash: H256,
    /// The number of steps executed so far.
    step: u64,
    /// The running accumulator.
    accumulator: H256,
    /// The step count at which the machine produces a corrupted state, if any.
    fault_at: Option<u64>,
    /// The step count at which the machine halts, if any.
    halt_at: Option<u64>,
}

impl AlphabetMachine {
    /// Creates a new [AlphabetMachine] running `program`, which must be non-empty lowercase ASCII.
    pub fn new(program: &str) -> Result<Self> {
        if program.is_empty() {
            return Err(anyhow!("Alphabet program must not be empty"));
        }
        if !program.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(anyhow!("Alphabet program must be lowercase ASCII letters"));
        }
        Ok(Self {
            program: Arc::from(program.as_bytes()),
            code_hash: H256::from(keccak256(program.as_bytes())),
            step: 0,
            accumulator: H256::zero(),
            fault_at: None,
            halt_at: None,
        })
    }

    /// Makes the step that reaches `step_count` produce a wrong state. Every later state diverges
    /// from an honest machine as well.
    pub fn with_fault_at(mut self, step_count: u64) -> Self {
        self.fault_at = Some(step_count);
        self
    }

    /// Makes the machine halt once it has executed `step_count` steps.
    pub fn with_halt_at(mut self, step_count: u64) -> Self {
        self.halt_at = Some(step_count);
        self
    }

    /// Returns the number of steps executed so far.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    fn letter(&self) -> u8 {
        self.program[(self.step % self.program.len() as u64) as usize]
    }

    fn halted(&self) -> bool {
        self.halt_at.map_or(false, |halt| self.step >= halt)
    }

    /// Executes a single letter, returning the emitted output and whether the inbox was read.
    fn execute_one(&mut self, inbox: H256) -> (Option<H256>, bool) {
        let letter = self.letter();
        let reads_inbox = letter == b'i';
        let input = if reads_inbox { inbox } else { H256::zero() };

        let mut next = H256::from(keccak256(abi::encode(&[
            Token::Uint(U256::from(self.step)),
            Token::Uint(U256::from(letter)),
            Token::FixedBytes(self.accumulator.as_bytes().to_vec()),
            Token::FixedBytes(input.as_bytes().to_vec()),
        ])));
        if self.fault_at == Some(self.step + 1) {
            next = H256::from(keccak256(next.as_bytes()));
        }

        let output = matches!(letter, b'a' | b'e' | b'i' | b'o' | b'u').then(|| {
            H256::from(keccak256(abi::encode(&[
                Token::Uint(U256::from(self.step)),
                Token::Uint(U256::from(letter)),
            ])))
        });

        self.accumulator = next;
        self.step += 1;
        (output, reads_inbox)
    }
}

impl Default for AlphabetMachine {
    fn default() -> Self {
        Self {
            program: Arc::from(DEFAULT_PROGRAM.as_bytes()),
            code_hash: H256::from(keccak256(DEFAULT_PROGRAM.as_bytes())),
            step: 0,
            accumulator: H256::zero(),
            fault_at: None,
            halt_at: None,
        }
    }
}

impl Machine for AlphabetMachine {
    fn hash(&self) -> StateHash {
        H256::from(keccak256(abi::encode(&[
            Token::FixedBytes(self.code_hash.as_bytes().to_vec()),
            Token::Uint(U256::from(self.step)),
            Token::FixedBytes(self.accumulator.as_bytes().to_vec()),
        ])))
    }

    fn execute_assertion(
        &mut self,
        max_steps: u64,
        _time_bounds: &TimeBounds,
        inbox: H256,
    ) -> (Assertion, u64) {
        let mut assertion = Assertion::default();
        let mut executed = 0;
        while executed < max_steps && !self.halted() {
            assertion.num_gas += u64::from(self.letter() - b'a' + 1);
            let (output, read_inbox) = self.execute_one(inbox);
            assertion.outputs.extend(output);
            assertion.did_inbox_insn |= read_inbox;
            executed += 1;
        }
        assertion.after_state = self.hash();
        assertion.num_steps = executed;
        (assertion, executed)
    }

    fn one_step_proof(&self) -> Bytes {
        abi::encode(&[
            Token::Uint(U256::from(self.step)),
            Token::Uint(U256::from(self.letter())),
            Token::FixedBytes(self.accumulator.as_bytes().to_vec()),
        ])
        .into()
    }
}
