//! Flow instructions. Only apply-actions is implemented.

use crate::action::{decode_actions, encode_actions, Action};
use crate::error::{BadInstructionCode, OfpError, Result};
use byteorder::{BigEndian, ByteOrder};

/// `ofp_instruction_actions` header size.
pub const INSTRUCTION_HEADER_LEN: usize = 8;

/// `ofp_instruction_type` values.
pub mod instruction_type {
    pub const GOTO_TABLE: u16 = 1;
    pub const WRITE_METADATA: u16 = 2;
    pub const WRITE_ACTIONS: u16 = 3;
    pub const APPLY_ACTIONS: u16 = 4;
    pub const CLEAR_ACTIONS: u16 = 5;
    pub const METER: u16 = 6;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    ApplyActions(Vec<Action>),
}

impl Instruction {
    pub fn instruction_type(&self) -> u16 {
        match self {
            Instruction::ApplyActions(_) => instruction_type::APPLY_ACTIONS,
        }
    }

    /// Header size plus the length of every wrapped action.
    pub fn len(&self) -> usize {
        match self {
            Instruction::ApplyActions(actions) => {
                INSTRUCTION_HEADER_LEN + actions.iter().map(Action::len).sum::<usize>()
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut header = [0u8; INSTRUCTION_HEADER_LEN];
        BigEndian::write_u16(&mut header[0..2], self.instruction_type());
        BigEndian::write_u16(&mut header[2..4], self.len() as u16);
        out.extend_from_slice(&header);
        match self {
            Instruction::ApplyActions(actions) => out.extend(encode_actions(actions)),
        }
    }

    /// Decodes the instruction at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let bad_len = OfpError::BadInstruction(BadInstructionCode::BadLen);
        if bytes.len() < 4 {
            return Err(bad_len);
        }
        let kind = BigEndian::read_u16(&bytes[0..2]);
        let len = usize::from(BigEndian::read_u16(&bytes[2..4]));
        if len < INSTRUCTION_HEADER_LEN || len > bytes.len() {
            return Err(bad_len);
        }

        match kind {
            instruction_type::APPLY_ACTIONS => {
                let actions = decode_actions(&bytes[INSTRUCTION_HEADER_LEN..len])?;
                Ok((Instruction::ApplyActions(actions), len))
            }
            instruction_type::GOTO_TABLE..=instruction_type::METER => {
                Err(OfpError::BadInstruction(BadInstructionCode::UnsupInst))
            }
            _ => Err(OfpError::BadInstruction(BadInstructionCode::UnknownInst)),
        }
    }
}

/// Serializes a list of instructions.
pub fn encode_instructions(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.iter().map(Instruction::len).sum());
    for instruction in instructions {
        instruction.encode(&mut out);
    }
    out
}

/// Decodes every instruction in `bytes`.
pub fn decode_instructions(mut bytes: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    while !bytes.is_empty() {
        let (instruction, len) = Instruction::decode(bytes)?;
        instructions.push(instruction);
        bytes = &bytes[len..];
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_length_covers_header_and_actions() {
        let inst = Instruction::ApplyActions(vec![Action::output(1), Action::SetQueue { queue_id: 0 }]);
        assert_eq!(inst.len(), 8 + 16 + 8);
        let bytes = encode_instructions(&[inst.clone()]);
        assert_eq!(&bytes[0..4], &[0, 4, 0, 32]);
        assert_eq!(decode_instructions(&bytes).unwrap(), vec![inst]);
    }

    #[test]
    fn test_unsupported_instruction() {
        let bytes = [0, 1, 0, 8, 0, 0, 0, 0];
        assert_eq!(
            Instruction::decode(&bytes),
            Err(OfpError::BadInstruction(BadInstructionCode::UnsupInst))
        );
        let bytes = [0, 42, 0, 8, 0, 0, 0, 0];
        assert_eq!(
            Instruction::decode(&bytes),
            Err(OfpError::BadInstruction(BadInstructionCode::UnknownInst))
        );
    }

    #[test]
    fn test_length_beyond_buffer() {
        let bytes = [0, 4, 0, 24, 0, 0, 0, 0];
        assert_eq!(
            Instruction::decode(&bytes),
            Err(OfpError::BadInstruction(BadInstructionCode::BadLen))
        );
    }
}
