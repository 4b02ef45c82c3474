//! OpenFlow protocol errors.
//!
//! A protocol error is never fatal to the switch. It names the
//! `(type, code)` pair reported back to the controller that sent the
//! offending message; see [`crate::build_error`].

use thiserror::Error;

/// `ofp_error_type` values.
pub mod error_type {
    pub const BAD_REQUEST: u16 = 1;
    pub const BAD_ACTION: u16 = 2;
    pub const BAD_INSTRUCTION: u16 = 3;
    pub const BAD_MATCH: u16 = 4;
    pub const FLOW_MOD_FAILED: u16 = 5;
    pub const PORT_MOD_FAILED: u16 = 7;
    pub const QUEUE_OP_FAILED: u16 = 9;
}

/// `ofp_bad_request_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BadRequestCode {
    BadVersion = 0,
    BadType = 1,
    BadMultipart = 2,
    BadExperimenter = 3,
    BadExpType = 4,
    Eperm = 5,
    BadLen = 6,
    BufferEmpty = 7,
    BufferUnknown = 8,
    BadTableId = 9,
    IsSlave = 10,
    BadPort = 11,
    BadPacket = 12,
}

/// `ofp_bad_action_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BadActionCode {
    BadType = 0,
    BadLen = 1,
    BadExperimenter = 2,
    BadExpType = 3,
    BadOutPort = 4,
    BadArgument = 5,
    Eperm = 6,
    TooMany = 7,
    BadQueue = 8,
}

/// `ofp_bad_instruction_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BadInstructionCode {
    UnknownInst = 0,
    UnsupInst = 1,
    BadTableId = 2,
    UnsupMetadata = 3,
    UnsupMetadataMask = 4,
    BadExperimenter = 5,
    BadExpType = 6,
    BadLen = 7,
    Eperm = 8,
}

/// `ofp_bad_match_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BadMatchCode {
    BadType = 0,
    BadLen = 1,
    BadTag = 2,
    BadDlAddrMask = 3,
    BadNwAddrMask = 4,
    BadWildcards = 5,
    BadField = 6,
    BadValue = 7,
    BadMask = 8,
    BadPrereq = 9,
    DupField = 10,
    Eperm = 11,
}

/// `ofp_flow_mod_failed_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FlowModFailedCode {
    Unknown = 0,
    TableFull = 1,
    BadTableId = 2,
    Overlap = 3,
    Eperm = 4,
    BadTimeout = 5,
    BadCommand = 6,
    BadFlags = 7,
}

/// `ofp_port_mod_failed_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PortModFailedCode {
    BadPort = 0,
    BadHwAddr = 1,
    BadConfig = 2,
    BadAdvertise = 3,
    Eperm = 4,
}

/// `ofp_queue_op_failed_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum QueueOpFailedCode {
    BadPort = 0,
    BadQueue = 1,
    Eperm = 2,
}

/// A protocol error as an OpenFlow `(type, code)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum OfpError {
    #[error("bad request: {0:?}")]
    BadRequest(BadRequestCode),

    #[error("bad action: {0:?}")]
    BadAction(BadActionCode),

    #[error("bad instruction: {0:?}")]
    BadInstruction(BadInstructionCode),

    #[error("bad match: {0:?}")]
    BadMatch(BadMatchCode),

    #[error("flow mod failed: {0:?}")]
    FlowModFailed(FlowModFailedCode),

    #[error("port mod failed: {0:?}")]
    PortModFailed(PortModFailedCode),

    #[error("queue operation failed: {0:?}")]
    QueueOpFailed(QueueOpFailedCode),
}

impl OfpError {
    /// Shorthand for the most common framing error.
    pub const fn bad_len() -> Self {
        OfpError::BadRequest(BadRequestCode::BadLen)
    }

    /// Wire value of the error type.
    pub const fn error_type(&self) -> u16 {
        match self {
            OfpError::BadRequest(_) => error_type::BAD_REQUEST,
            OfpError::BadAction(_) => error_type::BAD_ACTION,
            OfpError::BadInstruction(_) => error_type::BAD_INSTRUCTION,
            OfpError::BadMatch(_) => error_type::BAD_MATCH,
            OfpError::FlowModFailed(_) => error_type::FLOW_MOD_FAILED,
            OfpError::PortModFailed(_) => error_type::PORT_MOD_FAILED,
            OfpError::QueueOpFailed(_) => error_type::QUEUE_OP_FAILED,
        }
    }

    /// Wire value of the error code.
    pub const fn code(&self) -> u16 {
        match *self {
            OfpError::BadRequest(c) => c as u16,
            OfpError::BadAction(c) => c as u16,
            OfpError::BadInstruction(c) => c as u16,
            OfpError::BadMatch(c) => c as u16,
            OfpError::FlowModFailed(c) => c as u16,
            OfpError::PortModFailed(c) => c as u16,
            OfpError::QueueOpFailed(c) => c as u16,
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, OfpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_pairs() {
        let err = OfpError::BadRequest(BadRequestCode::IsSlave);
        assert_eq!((err.error_type(), err.code()), (1, 10));

        let err = OfpError::BadAction(BadActionCode::BadOutPort);
        assert_eq!((err.error_type(), err.code()), (2, 4));

        let err = OfpError::QueueOpFailed(QueueOpFailedCode::Eperm);
        assert_eq!((err.error_type(), err.code()), (9, 2));
    }

    #[test]
    fn test_display() {
        let err = OfpError::bad_len();
        assert_eq!(err.to_string(), "bad request: BadLen");
    }
}
