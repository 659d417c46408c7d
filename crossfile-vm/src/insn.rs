//! The type loader instruction set.

use std::borrow::Cow;

/// A single type loader instruction.
///
/// Each variant carries exactly the operands it needs, so an instruction
/// cannot be constructed with operands that disagree with its opcode.
/// Register operands index the VM's eight 64-bit registers; memory offsets
/// are byte offsets into the output buffer of the executing type loader;
/// block and loader selectors are indices, not addresses.
///
/// Widths are baked into the opcode (`ReadM16` vs `ReadM32`, and so on); the
/// loader stack keeps no type tags, so the program is responsible for popping
/// the width it pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// Load an immediate into a register.
    SetReg { reg: u8, imm: u64 },

    // reads from the data stream into a register
    ReadR8 { reg: u8 },
    ReadR16 { reg: u8 },
    ReadR32 { reg: u8 },
    ReadR64 { reg: u8 },

    // reads from the data stream into the output buffer
    ReadM8 { mem_off: usize },
    ReadM16 { mem_off: usize },
    ReadM32 { mem_off: usize },
    ReadM64 { mem_off: usize },

    // reads of consecutive elements from the data stream into the output buffer
    ReadA8 { mem_off: usize, elem_count: usize },
    ReadA16 { mem_off: usize, elem_count: usize },
    ReadA32 { mem_off: usize, elem_count: usize },
    ReadA64 { mem_off: usize, elem_count: usize },

    // pushes onto the loader stack from a register (truncating to the width)
    PushR8 { reg: u8 },
    PushR16 { reg: u8 },
    PushR32 { reg: u8 },
    PushR64 { reg: u8 },

    // pushes onto the loader stack from the output buffer
    PushM8 { mem_off: usize },
    PushM16 { mem_off: usize },
    PushM32 { mem_off: usize },
    PushM64 { mem_off: usize },

    // pushes of consecutive output buffer elements, first element first
    PushA8 { mem_off: usize, elem_count: usize },
    PushA16 { mem_off: usize, elem_count: usize },
    PushA32 { mem_off: usize, elem_count: usize },
    PushA64 { mem_off: usize, elem_count: usize },

    // pops from the loader stack into a register (zero-extending)
    PopR8 { reg: u8 },
    PopR16 { reg: u8 },
    PopR32 { reg: u8 },
    PopR64 { reg: u8 },

    // pops from the loader stack into the output buffer
    PopM8 { mem_off: usize },
    PopM16 { mem_off: usize },
    PopM32 { mem_off: usize },
    PopM64 { mem_off: usize },

    // pops of consecutive elements, last element first, so that a matching
    // push/pop array pair round-trips
    PopA8 { mem_off: usize, elem_count: usize },
    PopA16 { mem_off: usize, elem_count: usize },
    PopA32 { mem_off: usize, elem_count: usize },
    PopA64 { mem_off: usize, elem_count: usize },

    /// Move the stream cursor forward by `num_bytes`.
    SeekFwd { num_bytes: usize },
    /// Move the stream cursor backward by `num_bytes`.
    SeekBak { num_bytes: usize },

    // arithmetic, wrapping two's-complement on 64 bits; division and modulo
    // by zero fault
    Add { rres: u8, r1: u8, r2: u8 },
    Sub { rres: u8, r1: u8, r2: u8 },
    Mul { rres: u8, r1: u8, r2: u8 },
    Div { rres: u8, r1: u8, r2: u8 },
    Mod { rres: u8, r1: u8, r2: u8 },
    Pow { rres: u8, r1: u8, r2: u8 },
    /// Integer square root.
    Sqrt { rres: u8, r1: u8 },
    /// Absolute value of the operand interpreted as i64.
    Abs { rres: u8, r1: u8 },

    // logical/bitwise
    And { rres: u8, r1: u8, r2: u8 },
    Or { rres: u8, r1: u8, r2: u8 },
    Xor { rres: u8, r1: u8, r2: u8 },
    Nand { rres: u8, r1: u8, r2: u8 },
    Nor { rres: u8, r1: u8, r2: u8 },
    Xnor { rres: u8, r1: u8, r2: u8 },
    Not { rres: u8, r1: u8 },
    // shift amounts and rotate counts use the low six bits of r2
    Lshift { rres: u8, r1: u8, r2: u8 },
    Rshift { rres: u8, r1: u8, r2: u8 },
    Rol { rres: u8, r1: u8, r2: u8 },
    Ror { rres: u8, r1: u8, r2: u8 },

    // unsigned comparisons; the result register receives 0 or 1
    CmpEq { rres: u8, r1: u8, r2: u8 },
    CmpLe { rres: u8, r1: u8, r2: u8 },
    CmpLt { rres: u8, r1: u8, r2: u8 },
    CmpGe { rres: u8, r1: u8, r2: u8 },
    CmpGt { rres: u8, r1: u8, r2: u8 },

    /// Jump to `block_sel` if `reg`, as i64, is greater than zero.
    Ja { reg: u8, block_sel: usize },
    /// Jump to `block_sel` if `reg`, as i64, is less than zero.
    Jb { reg: u8, block_sel: usize },
    /// Jump to `block_sel` if `reg` is zero.
    Jz { reg: u8, block_sel: usize },
    /// Jump to `block_sel` if bit 63 of `reg` is set.
    Jo { reg: u8, block_sel: usize },
    /// Jump to `block_sel` if bit 0 of `reg` is set.
    Jc { reg: u8, block_sel: usize },

    /// Invoke the type loader referenced at `type_sel` in the current
    /// loader's reference table, materializing its output at `mem_off` in the
    /// current output buffer.
    CallTypeLoader { type_sel: usize, mem_off: usize },

    /// Emit an informative message. Does not alter control flow.
    Pinfo { msg: Cow<'static, str> },
    /// Emit a debugging message. Does not alter control flow.
    Pdbg { msg: Cow<'static, str> },
    /// Emit an error message. Does not alter control flow.
    Perr { msg: Cow<'static, str> },

    /// Terminate the current type loader invocation successfully.
    ExitSuccess,
    /// Terminate the current type loader invocation with a failure that
    /// propagates to any caller.
    ExitFailure,
}

impl Insn {
    /// The assembly mnemonic for this instruction, for logs and diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Insn::SetReg { .. } => "setr",
            Insn::ReadR8 { .. } => "rd8",
            Insn::ReadR16 { .. } => "rd16",
            Insn::ReadR32 { .. } => "rd32",
            Insn::ReadR64 { .. } => "rd64",
            Insn::ReadM8 { .. } => "rdm8",
            Insn::ReadM16 { .. } => "rdm16",
            Insn::ReadM32 { .. } => "rdm32",
            Insn::ReadM64 { .. } => "rdm64",
            Insn::ReadA8 { .. } => "ra8",
            Insn::ReadA16 { .. } => "ra16",
            Insn::ReadA32 { .. } => "ra32",
            Insn::ReadA64 { .. } => "ra64",
            Insn::PushR8 { .. } => "push8",
            Insn::PushR16 { .. } => "push16",
            Insn::PushR32 { .. } => "push32",
            Insn::PushR64 { .. } => "push64",
            Insn::PushM8 { .. } => "pushm8",
            Insn::PushM16 { .. } => "pushm16",
            Insn::PushM32 { .. } => "pushm32",
            Insn::PushM64 { .. } => "pushm64",
            Insn::PushA8 { .. } => "pusha8",
            Insn::PushA16 { .. } => "pusha16",
            Insn::PushA32 { .. } => "pusha32",
            Insn::PushA64 { .. } => "pusha64",
            Insn::PopR8 { .. } => "pop8",
            Insn::PopR16 { .. } => "pop16",
            Insn::PopR32 { .. } => "pop32",
            Insn::PopR64 { .. } => "pop64",
            Insn::PopM8 { .. } => "popm8",
            Insn::PopM16 { .. } => "popm16",
            Insn::PopM32 { .. } => "popm32",
            Insn::PopM64 { .. } => "popm64",
            Insn::PopA8 { .. } => "popa8",
            Insn::PopA16 { .. } => "popa16",
            Insn::PopA32 { .. } => "popa32",
            Insn::PopA64 { .. } => "popa64",
            Insn::SeekFwd { .. } => "seekf",
            Insn::SeekBak { .. } => "seekb",
            Insn::Add { .. } => "add",
            Insn::Sub { .. } => "sub",
            Insn::Mul { .. } => "mul",
            Insn::Div { .. } => "div",
            Insn::Mod { .. } => "mod",
            Insn::Pow { .. } => "pow",
            Insn::Sqrt { .. } => "sqrt",
            Insn::Abs { .. } => "abs",
            Insn::And { .. } => "and",
            Insn::Or { .. } => "or",
            Insn::Xor { .. } => "xor",
            Insn::Nand { .. } => "nand",
            Insn::Nor { .. } => "nor",
            Insn::Xnor { .. } => "xnor",
            Insn::Not { .. } => "not",
            Insn::Lshift { .. } => "lshift",
            Insn::Rshift { .. } => "rshift",
            Insn::Rol { .. } => "rol",
            Insn::Ror { .. } => "ror",
            Insn::CmpEq { .. } => "cmpeq",
            Insn::CmpLe { .. } => "cmple",
            Insn::CmpLt { .. } => "cmplt",
            Insn::CmpGe { .. } => "cmpge",
            Insn::CmpGt { .. } => "cmpgt",
            Insn::Ja { .. } => "ja",
            Insn::Jb { .. } => "jb",
            Insn::Jz { .. } => "jz",
            Insn::Jo { .. } => "jo",
            Insn::Jc { .. } => "jc",
            Insn::CallTypeLoader { .. } => "typeload",
            Insn::Pinfo { .. } => "pinfo",
            Insn::Pdbg { .. } => "pdbg",
            Insn::Perr { .. } => "perr",
            Insn::ExitSuccess => "exit_success",
            Insn::ExitFailure => "exit_failure",
        }
    }
}

/// An ordered sequence of instructions with no internal control transfer.
///
/// Jumps name whole blocks by selector index, so a transfer can only land on
/// the first instruction of a block. A well-formed block ends in a jump, a
/// loader call, or a terminal instruction; execution that walks off the end
/// of a block falls through to the next block in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsnBlock {
    insns: Vec<Insn>,
}

impl InsnBlock {
    pub fn new() -> Self {
        InsnBlock::default()
    }

    /// Append an instruction to the end of the block.
    pub fn push(&mut self, insn: Insn) {
        self.insns.push(insn);
    }

    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }
}

impl FromIterator<Insn> for InsnBlock {
    fn from_iter<I: IntoIterator<Item = Insn>>(iter: I) -> Self {
        InsnBlock {
            insns: iter.into_iter().collect(),
        }
    }
}
