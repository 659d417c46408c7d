//! Errors reported by the VM.

use crate::stream::StreamError;

/// The reason a type loader invocation failed.
///
/// Every fault is terminal for the current invocation and propagates
/// synchronously to the caller; a failed nested call fails the enclosing
/// parse. There is no retry and no partial-result salvage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A stream read would exceed the remaining bytes.
    InsufficientData,
    /// A seek would move the stream cursor outside `[0, stream size]`.
    SeekOutOfRange,
    /// A pop was attempted with fewer bytes on the loader stack than the
    /// popped width.
    StackUnderflow,
    /// A read or write touched the output buffer outside its `alloc_size`.
    OutOfBoundsAccess,
    /// A jump named a block selector with no corresponding block.
    InvalidBlockSelector(usize),
    /// A call named a loader reference with no corresponding type loader.
    InvalidLoaderRef(usize),
    /// An instruction named a register outside the register file.
    InvalidRegister(u8),
    /// Division or modulo by zero.
    DivideByZero,
    /// The inter-loader call chain exceeded the configured depth limit.
    CallDepthExceeded,
    /// The program executed `exit_failure`.
    ExplicitFailure,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::InsufficientData => write!(f, "A read exceeded the remaining stream bytes"),
            FaultKind::SeekOutOfRange => write!(f, "A seek moved outside the stream bounds"),
            FaultKind::StackUnderflow => write!(f, "Loader stack underflow"),
            FaultKind::OutOfBoundsAccess => {
                write!(f, "An access was outside the output buffer")
            }
            FaultKind::InvalidBlockSelector(sel) => write!(f, "Invalid block selector {sel}"),
            FaultKind::InvalidLoaderRef(sel) => write!(f, "Invalid type loader reference {sel}"),
            FaultKind::InvalidRegister(reg) => write!(f, "Invalid register r{reg}"),
            FaultKind::DivideByZero => write!(f, "Division by zero"),
            FaultKind::CallDepthExceeded => write!(f, "Type loader call depth limit exceeded"),
            FaultKind::ExplicitFailure => write!(f, "Loader program reported failure"),
        }
    }
}

impl From<StreamError> for FaultKind {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InsufficientData => FaultKind::InsufficientData,
            StreamError::OutOfRange => FaultKind::SeekOutOfRange,
        }
    }
}

/// A fault, localized to the instruction that raised it.
///
/// `block` and `insn` index into the type loader that was executing when the
/// fault occurred, which for a nested call is the callee, not the entry
/// loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecError {
    pub kind: FaultKind,
    /// Index of the executing instruction block.
    pub block: usize,
    /// Index of the faulting instruction within its block.
    pub insn: usize,
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (block {}, instruction {})",
            self.kind, self.block, self.insn
        )
    }
}

impl std::error::Error for ExecError {}
