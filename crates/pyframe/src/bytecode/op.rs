//! Opcode definitions.
//!
//! Discriminants match CPython 3.10's `opcode.py`, so raw wordcode can be converted with
//! [`Opcode::from_repr`]. In serialised code units opcodes are written by their `dis` names
//! (`"LOAD_NAME"`, `"BINARY_ADD"`, ...).
//!
//! Every opcode CPython 3.10 emits for plain functions and modules is listed, including
//! the ones this interpreter rejects (exception blocks, closures, generators, classes,
//! pattern matching, async). Rejection happens once, at decode time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// Opcode discriminant, operands are carried separately by the instruction.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // === Stack manipulation ===
    PopTop = 1,
    RotTwo = 2,
    RotThree = 3,
    DupTop = 4,
    DupTopTwo = 5,
    RotFour = 6,
    Nop = 9,

    // === Unary and binary operators ===
    UnaryPositive = 10,
    UnaryNegative = 11,
    UnaryNot = 12,
    UnaryInvert = 15,
    BinaryMatrixMultiply = 16,
    InplaceMatrixMultiply = 17,
    BinaryPower = 19,
    BinaryMultiply = 20,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    BinarySubscr = 25,
    BinaryFloorDivide = 26,
    BinaryTrueDivide = 27,
    InplaceFloorDivide = 28,
    InplaceTrueDivide = 29,

    // === Pattern matching (unsupported) ===
    GetLen = 30,
    MatchMapping = 31,
    MatchSequence = 32,
    MatchKeys = 33,
    CopyDictWithoutKeys = 34,

    // === Async (unsupported) ===
    WithExceptStart = 49,
    GetAiter = 50,
    GetAnext = 51,
    BeforeAsyncWith = 52,
    EndAsyncFor = 54,

    InplaceAdd = 55,
    InplaceSubtract = 56,
    InplaceMultiply = 57,
    InplaceModulo = 59,
    StoreSubscr = 60,
    DeleteSubscr = 61,
    BinaryLshift = 62,
    BinaryRshift = 63,
    BinaryAnd = 64,
    BinaryXor = 65,
    BinaryOr = 66,
    InplacePower = 67,
    GetIter = 68,
    GetYieldFromIter = 69,
    PrintExpr = 70,
    LoadBuildClass = 71,
    YieldFrom = 72,
    GetAwaitable = 73,
    LoadAssertionError = 74,
    InplaceLshift = 75,
    InplaceRshift = 76,
    InplaceAnd = 77,
    InplaceXor = 78,
    InplaceOr = 79,
    ListToTuple = 82,
    ReturnValue = 83,
    ImportStar = 84,
    SetupAnnotations = 85,
    YieldValue = 86,
    PopBlock = 87,
    PopExcept = 89,

    // === Opcodes with an argument ===
    StoreName = 90,
    DeleteName = 91,
    UnpackSequence = 92,
    ForIter = 93,
    UnpackEx = 94,
    StoreAttr = 95,
    DeleteAttr = 96,
    StoreGlobal = 97,
    DeleteGlobal = 98,
    RotN = 99,
    LoadConst = 100,
    LoadName = 101,
    BuildTuple = 102,
    BuildList = 103,
    BuildSet = 104,
    BuildMap = 105,
    LoadAttr = 106,
    CompareOp = 107,
    ImportName = 108,
    ImportFrom = 109,
    JumpForward = 110,
    JumpIfFalseOrPop = 111,
    JumpIfTrueOrPop = 112,
    JumpAbsolute = 113,
    PopJumpIfFalse = 114,
    PopJumpIfTrue = 115,
    LoadGlobal = 116,
    IsOp = 117,
    ContainsOp = 118,
    Reraise = 119,
    JumpIfNotExcMatch = 121,
    SetupFinally = 122,
    LoadFast = 124,
    StoreFast = 125,
    DeleteFast = 126,
    GenStart = 129,
    RaiseVarargs = 130,
    CallFunction = 131,
    MakeFunction = 132,
    BuildSlice = 133,
    LoadClosure = 135,
    LoadDeref = 136,
    StoreDeref = 137,
    DeleteDeref = 138,
    CallFunctionKw = 141,
    CallFunctionEx = 142,
    SetupWith = 143,
    ExtendedArg = 144,
    ListAppend = 145,
    SetAdd = 146,
    MapAdd = 147,
    LoadClassderef = 148,
    MatchClass = 152,
    SetupAsyncWith = 154,
    FormatValue = 155,
    BuildConstKeyMap = 156,
    BuildString = 157,
    LoadMethod = 160,
    CallMethod = 161,
    ListExtend = 162,
    SetUpdate = 163,
    DictMerge = 164,
    DictUpdate = 165,
}

/// First opcode that takes an argument, as in CPython's `HAVE_ARGUMENT`.
pub const HAVE_ARGUMENT: u8 = 90;

impl Opcode {
    #[must_use]
    pub fn has_arg(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// Whether the opcode takes an absolute jump target as its argument.
    #[must_use]
    pub fn is_absolute_jump(self) -> bool {
        matches!(
            self,
            Self::JumpAbsolute
                | Self::JumpIfFalseOrPop
                | Self::JumpIfTrueOrPop
                | Self::PopJumpIfFalse
                | Self::PopJumpIfTrue
                | Self::JumpIfNotExcMatch
        )
    }

    /// Name of the language feature an opcode belongs to when this interpreter
    /// does not execute it, `None` for supported opcodes.
    #[must_use]
    pub fn unsupported_feature(self) -> Option<&'static str> {
        match self {
            Self::SetupFinally
            | Self::PopBlock
            | Self::PopExcept
            | Self::Reraise
            | Self::JumpIfNotExcMatch
            | Self::SetupWith
            | Self::WithExceptStart => Some("exception handling blocks"),
            Self::LoadClosure | Self::LoadDeref | Self::StoreDeref | Self::DeleteDeref | Self::LoadClassderef => {
                Some("closures")
            }
            Self::GenStart | Self::YieldValue | Self::YieldFrom | Self::GetYieldFromIter => Some("generators"),
            Self::GetAiter | Self::GetAnext | Self::BeforeAsyncWith | Self::EndAsyncFor | Self::GetAwaitable => {
                Some("coroutines")
            }
            Self::SetupAsyncWith => Some("coroutines"),
            Self::LoadBuildClass => Some("class definitions"),
            Self::GetLen | Self::MatchMapping | Self::MatchSequence | Self::MatchKeys | Self::MatchClass => {
                Some("pattern matching")
            }
            Self::CopyDictWithoutKeys => Some("pattern matching"),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_repr(byte).ok_or(InvalidOpcodeError(byte))
    }
}

/// Error returned when a byte is not a CPython 3.10 opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOpcodeError(pub u8);

impl std::fmt::Display for InvalidOpcodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid opcode byte: {}", self.0)
    }
}

impl std::error::Error for InvalidOpcodeError {}

/// Comparison selected by `COMPARE_OP`'s argument.
///
/// Values 0 through 5 are the rich comparisons of `cmp_op`; 6 through 9 are the
/// membership and identity tests older encodings also routed through `COMPARE_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, IntoStaticStr)]
#[repr(u8)]
pub enum CompareOp {
    #[strum(serialize = "<")]
    Lt = 0,
    #[strum(serialize = "<=")]
    Le = 1,
    #[strum(serialize = "==")]
    Eq = 2,
    #[strum(serialize = "!=")]
    Ne = 3,
    #[strum(serialize = ">")]
    Gt = 4,
    #[strum(serialize = ">=")]
    Ge = 5,
    #[strum(serialize = "in")]
    In = 6,
    #[strum(serialize = "not in")]
    NotIn = 7,
    #[strum(serialize = "is")]
    Is = 8,
    #[strum(serialize = "is not")]
    IsNot = 9,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn opcodes_use_cpython_numbers() {
        assert_eq!(Opcode::try_from(100), Ok(Opcode::LoadConst));
        assert_eq!(Opcode::try_from(83), Ok(Opcode::ReturnValue));
        assert_eq!(Opcode::DictUpdate as u8, 165);
        assert_eq!(Opcode::try_from(0), Err(InvalidOpcodeError(0)));
        assert_eq!(Opcode::try_from(255), Err(InvalidOpcodeError(255)));
    }

    #[test]
    fn opcodes_are_named_like_dis() {
        assert_eq!(Opcode::BinaryTrueDivide.to_string(), "BINARY_TRUE_DIVIDE");
        assert_eq!(Opcode::from_str("ROT_N"), Ok(Opcode::RotN));
        assert_eq!(Opcode::from_str("DUP_TOP_TWO"), Ok(Opcode::DupTopTwo));
        let json = serde_json::to_string(&Opcode::CallFunctionKw).unwrap();
        assert_eq!(json, "\"CALL_FUNCTION_KW\"");
        let opcode: Opcode = serde_json::from_str("\"LOAD_CLASSDEREF\"").unwrap();
        assert_eq!(opcode, Opcode::LoadClassderef);
    }

    #[test]
    fn argument_boundary() {
        assert!(!Opcode::PopExcept.has_arg());
        assert!(Opcode::StoreName.has_arg());
    }

    #[test]
    fn unsupported_features_are_named() {
        assert_eq!(Opcode::SetupFinally.unsupported_feature(), Some("exception handling blocks"));
        assert_eq!(Opcode::LoadDeref.unsupported_feature(), Some("closures"));
        assert_eq!(Opcode::LoadName.unsupported_feature(), None);
        assert_eq!(Opcode::ImportStar.unsupported_feature(), None);
    }

    #[test]
    fn compare_ops_render_as_symbols() {
        assert_eq!(CompareOp::from_repr(5), Some(CompareOp::Ge));
        assert_eq!(CompareOp::NotIn.to_string(), "not in");
        assert_eq!(CompareOp::from_repr(10), None);
    }

    #[test]
    fn opcode_is_one_byte() {
        assert_eq!(std::mem::size_of::<Opcode>(), 1);
    }
}
