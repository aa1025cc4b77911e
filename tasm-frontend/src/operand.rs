//! Instruction operands

use std::fmt;
use tasm_codegen::Layout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Immediate(i64),
    /// Offset of a public register inside the window
    Register(isize),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Immediate,
    Register,
    Label,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Immediate => write!(f, "immediate"),
            OperandKind::Register => write!(f, "register"),
            OperandKind::Label => write!(f, "label"),
        }
    }
}

impl Operand {
    /// Classify a token: literals first, then public registers, everything
    /// else is a label. Private slot names therefore read as labels.
    pub fn resolve(text: &str, layout: &Layout) -> Self {
        if let Some(value) = Self::resolve_immediate(text) {
            return Operand::Immediate(value);
        }
        match layout.offset_of(text, true) {
            Ok(offset) => Operand::Register(offset),
            Err(_) => Operand::Label(text.to_string()),
        }
    }

    fn resolve_immediate(text: &str) -> Option<i64> {
        match text {
            "True" => Some(1),
            "False" => Some(0),
            _ => text.parse().ok(),
        }
    }

    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Immediate(_) => OperandKind::Immediate,
            Operand::Register(_) => OperandKind::Register,
            Operand::Label(_) => OperandKind::Label,
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
