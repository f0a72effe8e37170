//! A flat, relative-jump FSM program (spec §3.3) and its validation.

use crate::instruction::Instruction;

/// A compiled FSM: an ordered array of instructions with relative jumps.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Program(pub Vec<Instruction>);

/// An FSM program failed validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgramError {
    /// A jump offset does not land on a valid index (or the one-past-end
    /// terminal sentinel).
    #[error("instruction {index} ({path}) jumps to out-of-bounds offset {offset}")]
    JumpOutOfBounds {
        index: usize,
        offset: i32,
        path: String,
    },
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self(instructions)
    }

    pub fn single(instruction: Instruction) -> Self {
        Self(vec![instruction])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Instruction> {
        self.0
    }

    /// Concatenate `self` followed by `other`.
    ///
    /// Sets `self`'s last instruction's `next` to `1` so it falls straight
    /// into `other`'s first instruction, then appends. Because every jump
    /// recorded anywhere in either half is relative to the instruction that
    /// carries it, concatenation alone is enough — no label is ever
    /// recomputed (spec §9 Design Notes).
    pub fn chain(mut self, mut other: Program) -> Program {
        if let Some(last) = self.0.last_mut() {
            last.set_next(1);
        }
        self.0.append(&mut other.0);
        self
    }

    /// Checks every `next`/`then`/`else`/`catch` jump lands on a valid
    /// index, or on the one-past-the-end sentinel that denotes "falls off
    /// into the caller's terminal state" (testable property #1).
    pub fn validate(&self) -> Result<(), ProgramError> {
        let len = self.0.len() as i64;
        for (index, instr) in self.0.iter().enumerate() {
            for offset in instr.jumps() {
                let target = index as i64 + offset as i64;
                if target < 0 || target > len {
                    return Err(ProgramError::JumpOutOfBounds {
                        index,
                        offset,
                        path: instr.path().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ActionInstr, PassInstr};

    fn action(name: &str) -> Instruction {
        Instruction::Action(ActionInstr {
            name: name.into(),
            path: ".".into(),
            next: None,
        })
    }

    fn pass() -> Instruction {
        Instruction::Pass(PassInstr {
            path: ".".into(),
            next: None,
        })
    }

    #[test]
    fn chain_sets_relative_next() {
        let front = Program::single(action("/_/a"));
        let back = Program::single(action("/_/b"));
        let combined = front.chain(back);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined.0[0].next(), Some(1));
        assert_eq!(combined.0[1].next(), None);
    }

    #[test]
    fn chain_is_pure_concatenation_of_three() {
        let p = Program::single(action("/_/a"))
            .chain(Program::single(action("/_/b")))
            .chain(Program::single(action("/_/c")));
        assert_eq!(p.len(), 3);
        assert_eq!(p.0[0].next(), Some(1));
        assert_eq!(p.0[1].next(), Some(1));
        assert_eq!(p.0[2].next(), None);
    }

    #[test]
    fn validate_accepts_in_bounds_and_sentinel() {
        let mut p = Program::single(pass());
        p.0[0].set_next(1); // one-past-end: valid terminal sentinel
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        let mut p = Program::single(pass());
        p.0[0].set_next(5);
        assert!(p.validate().is_err());
    }

    #[test]
    fn empty_sequence_compiles_to_single_pass() {
        let p = Program::single(pass());
        assert_eq!(p.len(), 1);
        assert!(p.validate().is_ok());
    }
}
