//! The closed set of assembly opcodes

use std::fmt;

/// What an operand position accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    /// A public register
    Register,
    /// A register or an immediate
    Value,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Load,
    Store,
    Neg,
    Add,
    Sub,
    Less,
    Eq,
    LogicNot,
    LogicAnd,
    LogicOr,
    BinaryNot,
    Push,
    Pop,
    Ret,
    Jmp,
    Label,
    Jnz,
    Call,
    Read,
    Write,
}

impl Opcode {
    pub const ALL: [Opcode; 21] = [
        Opcode::Mov,
        Opcode::Load,
        Opcode::Store,
        Opcode::Neg,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Less,
        Opcode::Eq,
        Opcode::LogicNot,
        Opcode::LogicAnd,
        Opcode::LogicOr,
        Opcode::BinaryNot,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Ret,
        Opcode::Jmp,
        Opcode::Label,
        Opcode::Jnz,
        Opcode::Call,
        Opcode::Read,
        Opcode::Write,
    ];

    pub fn from_mnemonic(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == text)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Neg => "neg",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Less => "less",
            Opcode::Eq => "eq",
            Opcode::LogicNot => "logic_not",
            Opcode::LogicAnd => "logic_and",
            Opcode::LogicOr => "logic_or",
            Opcode::BinaryNot => "binary_not",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Ret => "ret",
            Opcode::Jmp => "jmp",
            Opcode::Label => "label",
            Opcode::Jnz => "jnz",
            Opcode::Call => "call",
            Opcode::Read => "read",
            Opcode::Write => "write",
        }
    }

    pub fn signature(self) -> &'static [OperandClass] {
        use OperandClass::{Label, Register, Value};
        match self {
            Opcode::Mov | Opcode::Load => &[Register, Value],
            Opcode::Store => &[Value, Value],
            Opcode::Neg | Opcode::LogicNot | Opcode::BinaryNot | Opcode::Pop | Opcode::Read => &[Register],
            Opcode::Add | Opcode::Sub | Opcode::Less | Opcode::Eq | Opcode::LogicAnd | Opcode::LogicOr => {
                &[Register, Value, Value]
            }
            Opcode::Push | Opcode::Write => &[Value],
            Opcode::Ret => &[],
            Opcode::Jmp | Opcode::Label | Opcode::Call => &[Label],
            Opcode::Jnz => &[Value, Label],
        }
    }

    pub fn ends_basic_block(self) -> bool {
        matches!(
            self,
            Opcode::Ret | Opcode::Jmp | Opcode::Label | Opcode::Jnz | Opcode::Call
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mnemonics_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("MOV"), None);
        assert_eq!(Opcode::from_mnemonic("halt"), None);
    }

    #[test]
    fn test_block_enders() {
        let enders: Vec<_> = Opcode::ALL.into_iter().filter(|op| op.ends_basic_block()).collect();
        assert_eq!(
            enders,
            vec![Opcode::Ret, Opcode::Jmp, Opcode::Label, Opcode::Jnz, Opcode::Call]
        );
    }
}
