//! The VM execution engine.

use crate::error::{ExecError, FaultKind};
use crate::insn::Insn;
use crate::loader::{FileLoader, TypeLoader};
use crate::output::{read_pod, write_pod, OutputBuffer};
use crate::stack::LoaderStack;
use crate::stream::DataStream;

/// Number of general-purpose 64-bit registers per call frame.
pub const REG_COUNT: usize = 8;

/// Default bound on the inter-loader call chain.
///
/// Loader reference graphs may be cyclic (recursive formats), so execution
/// depth is bounded rather than the graph shape.
const DEFAULT_MAX_CALL_DEPTH: usize = 64;

type Regs = [u64; REG_COUNT];

/// Executes type loader bytecode against a data stream.
///
/// Each type loader invocation, nested calls included, gets its own register
/// file and its own loader stack; a callee cannot observe or clobber its
/// caller's working state. The stream is borrowed for the duration of one
/// parse and only its cursor advances.
#[derive(Debug, Clone)]
pub struct Vm {
    max_call_depth: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Replace the default call depth bound.
    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        Vm { max_call_depth }
    }

    /// Parse a whole file: allocate the entry loader's output buffer and run
    /// it against `stream`.
    ///
    /// On success the returned buffer is fully populated; a fault anywhere in
    /// the call chain propagates out and no partial buffer is returned.
    pub fn exec_file_loader(
        &self,
        file_loader: &FileLoader,
        stream: &mut dyn DataStream,
    ) -> Result<OutputBuffer, ExecError> {
        let main = file_loader.main_type_loader();
        let mut output = OutputBuffer::new(main.alloc_size());
        self.run(file_loader, main, stream, output.as_bytes_mut(), 0)?;
        Ok(output)
    }

    /// Run the loader at `loader_index` in `file_loader`'s arena, writing
    /// into a caller-provided region.
    ///
    /// The file loader supplies the arena that the loader's reference table
    /// indexes, so nested calls resolve the same way they do under
    /// [`exec_file_loader`](Self::exec_file_loader).
    pub fn exec_type_loader(
        &self,
        file_loader: &FileLoader,
        loader_index: usize,
        stream: &mut dyn DataStream,
        region: &mut [u8],
    ) -> Result<(), ExecError> {
        let loader = file_loader.get(loader_index).ok_or(ExecError {
            kind: FaultKind::InvalidLoaderRef(loader_index),
            block: 0,
            insn: 0,
        })?;
        self.run(file_loader, loader, stream, region, 0)
    }

    /// One type loader invocation: Init (fresh registers and stack, entry
    /// block 0) then fetch-decode-execute until a terminal condition.
    /// Falling through past the last block is success.
    fn run(
        &self,
        file_loader: &FileLoader,
        loader: &TypeLoader,
        stream: &mut dyn DataStream,
        region: &mut [u8],
        depth: usize,
    ) -> Result<(), ExecError> {
        let mut regs: Regs = [0; REG_COUNT];
        let mut stack = LoaderStack::new();
        let blocks = loader.blocks();

        let mut block_ix = 0;
        while let Some(block) = blocks.get(block_ix) {
            let mut next_block = block_ix + 1;
            'insns: for (insn_ix, insn) in block.insns().iter().enumerate() {
                let fault = |kind: FaultKind| ExecError {
                    kind,
                    block: block_ix,
                    insn: insn_ix,
                };
                log::trace!(
                    "{} [{block_ix}:{insn_ix}] {}",
                    loader.type_name(),
                    insn.mnemonic()
                );
                match insn {
                    Insn::SetReg { reg, imm } => {
                        reg_write(&mut regs, *reg, *imm).map_err(fault)?;
                    }

                    Insn::ReadR8 { reg } => {
                        let v = stream.read_u8().map_err(|e| fault(e.into()))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::ReadR16 { reg } => {
                        let v = stream.read_u16().map_err(|e| fault(e.into()))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::ReadR32 { reg } => {
                        let v = stream.read_u32().map_err(|e| fault(e.into()))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::ReadR64 { reg } => {
                        let v = stream.read_u64().map_err(|e| fault(e.into()))?;
                        reg_write(&mut regs, *reg, v).map_err(fault)?;
                    }

                    Insn::ReadM8 { mem_off } => {
                        let v = stream.read_u8().map_err(|e| fault(e.into()))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::ReadM16 { mem_off } => {
                        let v = stream.read_u16().map_err(|e| fault(e.into()))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::ReadM32 { mem_off } => {
                        let v = stream.read_u32().map_err(|e| fault(e.into()))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::ReadM64 { mem_off } => {
                        let v = stream.read_u64().map_err(|e| fault(e.into()))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }

                    Insn::ReadA8 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let v = stream.read_u8().map_err(|e| fault(e.into()))?;
                            let off = elem_off(*mem_off, i, 1)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::ReadA16 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let v = stream.read_u16().map_err(|e| fault(e.into()))?;
                            let off = elem_off(*mem_off, i, 2)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::ReadA32 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let v = stream.read_u32().map_err(|e| fault(e.into()))?;
                            let off = elem_off(*mem_off, i, 4)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::ReadA64 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let v = stream.read_u64().map_err(|e| fault(e.into()))?;
                            let off = elem_off(*mem_off, i, 8)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }

                    Insn::PushR8 { reg } => {
                        let v = reg_read(&regs, *reg).map_err(fault)?;
                        stack.push_t8(v as u8);
                    }
                    Insn::PushR16 { reg } => {
                        let v = reg_read(&regs, *reg).map_err(fault)?;
                        stack.push_t16(v as u16);
                    }
                    Insn::PushR32 { reg } => {
                        let v = reg_read(&regs, *reg).map_err(fault)?;
                        stack.push_t32(v as u32);
                    }
                    Insn::PushR64 { reg } => {
                        let v = reg_read(&regs, *reg).map_err(fault)?;
                        stack.push_t64(v);
                    }

                    Insn::PushM8 { mem_off } => {
                        let v: u8 = read_pod(region, *mem_off)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        stack.push_t8(v);
                    }
                    Insn::PushM16 { mem_off } => {
                        let v: u16 = read_pod(region, *mem_off)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        stack.push_t16(v);
                    }
                    Insn::PushM32 { mem_off } => {
                        let v: u32 = read_pod(region, *mem_off)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        stack.push_t32(v);
                    }
                    Insn::PushM64 { mem_off } => {
                        let v: u64 = read_pod(region, *mem_off)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        stack.push_t64(v);
                    }

                    Insn::PushA8 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let off = elem_off(*mem_off, i, 1)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            let v: u8 = read_pod(region, off)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            stack.push_t8(v);
                        }
                    }
                    Insn::PushA16 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let off = elem_off(*mem_off, i, 2)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            let v: u16 = read_pod(region, off)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            stack.push_t16(v);
                        }
                    }
                    Insn::PushA32 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let off = elem_off(*mem_off, i, 4)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            let v: u32 = read_pod(region, off)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            stack.push_t32(v);
                        }
                    }
                    Insn::PushA64 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in 0..*elem_count {
                            let off = elem_off(*mem_off, i, 8)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            let v: u64 = read_pod(region, off)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            stack.push_t64(v);
                        }
                    }

                    Insn::PopR8 { reg } => {
                        let v = stack
                            .pop_t8()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::PopR16 { reg } => {
                        let v = stack
                            .pop_t16()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::PopR32 { reg } => {
                        let v = stack
                            .pop_t32()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        reg_write(&mut regs, *reg, v as u64).map_err(fault)?;
                    }
                    Insn::PopR64 { reg } => {
                        let v = stack
                            .pop_t64()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        reg_write(&mut regs, *reg, v).map_err(fault)?;
                    }

                    Insn::PopM8 { mem_off } => {
                        let v = stack
                            .pop_t8()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::PopM16 { mem_off } => {
                        let v = stack
                            .pop_t16()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::PopM32 { mem_off } => {
                        let v = stack
                            .pop_t32()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }
                    Insn::PopM64 { mem_off } => {
                        let v = stack
                            .pop_t64()
                            .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                        write_pod(region, *mem_off, v)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                    }

                    // pops run in reverse element order so a matching
                    // push_arr/pop_arr pair restores the array it read
                    Insn::PopA8 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in (0..*elem_count).rev() {
                            let v = stack
                                .pop_t8()
                                .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                            let off = elem_off(*mem_off, i, 1)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::PopA16 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in (0..*elem_count).rev() {
                            let v = stack
                                .pop_t16()
                                .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                            let off = elem_off(*mem_off, i, 2)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::PopA32 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in (0..*elem_count).rev() {
                            let v = stack
                                .pop_t32()
                                .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                            let off = elem_off(*mem_off, i, 4)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }
                    Insn::PopA64 {
                        mem_off,
                        elem_count,
                    } => {
                        for i in (0..*elem_count).rev() {
                            let v = stack
                                .pop_t64()
                                .ok_or_else(|| fault(FaultKind::StackUnderflow))?;
                            let off = elem_off(*mem_off, i, 8)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                            write_pod(region, off, v)
                                .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        }
                    }

                    Insn::SeekFwd { num_bytes } => {
                        let pos = stream
                            .position()
                            .checked_add(*num_bytes)
                            .ok_or_else(|| fault(FaultKind::SeekOutOfRange))?;
                        stream.seek(pos).map_err(|e| fault(e.into()))?;
                    }
                    Insn::SeekBak { num_bytes } => {
                        let pos = stream
                            .position()
                            .checked_sub(*num_bytes)
                            .ok_or_else(|| fault(FaultKind::SeekOutOfRange))?;
                        stream.seek(pos).map_err(|e| fault(e.into()))?;
                    }

                    Insn::Add { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a.wrapping_add(b)))
                            .map_err(fault)?;
                    }
                    Insn::Sub { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a.wrapping_sub(b)))
                            .map_err(fault)?;
                    }
                    Insn::Mul { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a.wrapping_mul(b)))
                            .map_err(fault)?;
                    }
                    Insn::Div { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            a.checked_div(b).ok_or(FaultKind::DivideByZero)
                        })
                        .map_err(fault)?;
                    }
                    Insn::Mod { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            a.checked_rem(b).ok_or(FaultKind::DivideByZero)
                        })
                        .map_err(fault)?;
                    }
                    Insn::Pow { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            Ok(a.wrapping_pow(b as u32))
                        })
                        .map_err(fault)?;
                    }
                    Insn::Sqrt { rres, r1 } => {
                        unop(&mut regs, *rres, *r1, |a| a.isqrt()).map_err(fault)?;
                    }
                    Insn::Abs { rres, r1 } => {
                        unop(&mut regs, *rres, *r1, |a| (a as i64).unsigned_abs()).map_err(fault)?;
                    }

                    Insn::And { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a & b)).map_err(fault)?;
                    }
                    Insn::Or { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a | b)).map_err(fault)?;
                    }
                    Insn::Xor { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(a ^ b)).map_err(fault)?;
                    }
                    Insn::Nand { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(!(a & b))).map_err(fault)?;
                    }
                    Insn::Nor { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(!(a | b))).map_err(fault)?;
                    }
                    Insn::Xnor { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok(!(a ^ b))).map_err(fault)?;
                    }
                    Insn::Not { rres, r1 } => {
                        unop(&mut regs, *rres, *r1, |a| !a).map_err(fault)?;
                    }
                    Insn::Lshift { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            Ok(a.wrapping_shl(b as u32))
                        })
                        .map_err(fault)?;
                    }
                    Insn::Rshift { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            Ok(a.wrapping_shr(b as u32))
                        })
                        .map_err(fault)?;
                    }
                    Insn::Rol { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            Ok(a.rotate_left(b as u32 & 63))
                        })
                        .map_err(fault)?;
                    }
                    Insn::Ror { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| {
                            Ok(a.rotate_right(b as u32 & 63))
                        })
                        .map_err(fault)?;
                    }

                    Insn::CmpEq { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok((a == b) as u64))
                            .map_err(fault)?;
                    }
                    Insn::CmpLe { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok((a <= b) as u64))
                            .map_err(fault)?;
                    }
                    Insn::CmpLt { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok((a < b) as u64))
                            .map_err(fault)?;
                    }
                    Insn::CmpGe { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok((a >= b) as u64))
                            .map_err(fault)?;
                    }
                    Insn::CmpGt { rres, r1, r2 } => {
                        binop(&mut regs, *rres, *r1, *r2, |a, b| Ok((a > b) as u64))
                            .map_err(fault)?;
                    }

                    Insn::Ja { reg, block_sel }
                    | Insn::Jb { reg, block_sel }
                    | Insn::Jz { reg, block_sel }
                    | Insn::Jo { reg, block_sel }
                    | Insn::Jc { reg, block_sel } => {
                        // the selector must be valid whether or not the jump
                        // is taken
                        if *block_sel >= blocks.len() {
                            return Err(fault(FaultKind::InvalidBlockSelector(*block_sel)));
                        }
                        let v = reg_read(&regs, *reg).map_err(fault)?;
                        let taken = match insn {
                            Insn::Ja { .. } => (v as i64) > 0,
                            Insn::Jb { .. } => (v as i64) < 0,
                            Insn::Jz { .. } => v == 0,
                            Insn::Jo { .. } => v >> 63 != 0,
                            _ => v & 1 != 0,
                        };
                        if taken {
                            next_block = *block_sel;
                            break 'insns;
                        }
                    }

                    Insn::CallTypeLoader { type_sel, mem_off } => {
                        if depth + 1 > self.max_call_depth {
                            return Err(fault(FaultKind::CallDepthExceeded));
                        }
                        let arena_ix = *loader
                            .type_loader_refs()
                            .get(*type_sel)
                            .ok_or_else(|| fault(FaultKind::InvalidLoaderRef(*type_sel)))?;
                        let callee = file_loader
                            .get(arena_ix)
                            .ok_or_else(|| fault(FaultKind::InvalidLoaderRef(*type_sel)))?;
                        let end = mem_off
                            .checked_add(callee.alloc_size())
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        let callee_region = region
                            .get_mut(*mem_off..end)
                            .ok_or_else(|| fault(FaultKind::OutOfBoundsAccess))?;
                        self.run(file_loader, callee, stream, callee_region, depth + 1)?;
                    }

                    Insn::Pinfo { msg } => log::info!("{msg}"),
                    Insn::Pdbg { msg } => log::debug!("{msg}"),
                    Insn::Perr { msg } => log::error!("{msg}"),

                    Insn::ExitSuccess => return Ok(()),
                    Insn::ExitFailure => return Err(fault(FaultKind::ExplicitFailure)),
                }
            }
            block_ix = next_block;
        }

        // fallthrough past the last block
        Ok(())
    }
}

fn reg_read(regs: &Regs, reg: u8) -> Result<u64, FaultKind> {
    regs.get(reg as usize)
        .copied()
        .ok_or(FaultKind::InvalidRegister(reg))
}

fn reg_write(regs: &mut Regs, reg: u8, val: u64) -> Result<(), FaultKind> {
    *regs
        .get_mut(reg as usize)
        .ok_or(FaultKind::InvalidRegister(reg))? = val;
    Ok(())
}

fn binop(
    regs: &mut Regs,
    rres: u8,
    r1: u8,
    r2: u8,
    op: impl FnOnce(u64, u64) -> Result<u64, FaultKind>,
) -> Result<(), FaultKind> {
    let a = reg_read(regs, r1)?;
    let b = reg_read(regs, r2)?;
    reg_write(regs, rres, op(a, b)?)
}

fn unop(
    regs: &mut Regs,
    rres: u8,
    r1: u8,
    op: impl FnOnce(u64) -> u64,
) -> Result<(), FaultKind> {
    let a = reg_read(regs, r1)?;
    reg_write(regs, rres, op(a))
}

/// Byte offset of element `index` with the given stride, or `None` on
/// overflow.
fn elem_off(base: usize, index: usize, stride: usize) -> Option<usize> {
    index.checked_mul(stride)?.checked_add(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{FileLoaderBuilder, TypeLoaderBuilder};
    use crate::stream::MemoryStream;
    use crossfile_types::ByteOrder;

    fn single(loader: TypeLoader) -> FileLoader {
        let mut builder = FileLoaderBuilder::new();
        let ix = builder.add_type_loader(loader);
        builder.main_type_loader(ix);
        builder.build().unwrap()
    }

    fn exec(
        file_loader: &FileLoader,
        bytes: &[u8],
        order: ByteOrder,
    ) -> Result<OutputBuffer, ExecError> {
        let mut stream = MemoryStream::new(bytes, order);
        Vm::new().exec_file_loader(file_loader, &mut stream)
    }

    #[test]
    fn read_into_memory() {
        let loader = TypeLoaderBuilder::new("U32", 4)
            .block([Insn::ReadM32 { mem_off: 0 }, Insn::ExitSuccess])
            .build();
        let file_loader = single(loader);
        let output = exec(
            &file_loader,
            &[0x01, 0x00, 0x00, 0x00],
            ByteOrder::LittleEndian,
        )
        .unwrap();
        assert_eq!(output.read::<u32>(0), Some(1));
    }

    #[test]
    fn truncated_stream_faults() {
        let loader = TypeLoaderBuilder::new("U32", 4)
            .block([Insn::ReadM32 { mem_off: 0 }, Insn::ExitSuccess])
            .build();
        let file_loader = single(loader);
        let err = exec(&file_loader, &[0x01, 0x00], ByteOrder::LittleEndian).unwrap_err();
        assert_eq!(
            err,
            ExecError {
                kind: FaultKind::InsufficientData,
                block: 0,
                insn: 0
            }
        );
    }

    #[test]
    fn division_by_zero() {
        let loader = TypeLoaderBuilder::new("DivByZero", 0)
            .block([
                Insn::SetReg { reg: 0, imm: 5 },
                Insn::SetReg { reg: 1, imm: 0 },
                Insn::Div {
                    rres: 2,
                    r1: 0,
                    r2: 1,
                },
                Insn::ExitSuccess,
            ])
            .build();
        let err = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(
            err,
            ExecError {
                kind: FaultKind::DivideByZero,
                block: 0,
                insn: 2
            }
        );
    }

    #[test]
    fn mismatched_pop_width_underflows() {
        let loader = TypeLoaderBuilder::new("WidthMismatch", 0)
            .block([
                Insn::SetReg { reg: 0, imm: 1 },
                Insn::PushR8 { reg: 0 },
                Insn::PopR16 { reg: 1 },
                Insn::ExitSuccess,
            ])
            .build();
        let err = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::StackUnderflow);
        assert_eq!(err.insn, 2);
    }

    #[test]
    fn nested_failure_propagates() {
        let mut builder = FileLoaderBuilder::new();
        let failing = builder.add_type_loader(
            TypeLoaderBuilder::new("AlwaysFails", 0)
                .block([Insn::ExitFailure])
                .build(),
        );
        let outer = builder.add_type_loader(
            TypeLoaderBuilder::new("Outer", 0)
                .block([
                    Insn::CallTypeLoader {
                        type_sel: 0,
                        mem_off: 0,
                    },
                    Insn::ExitSuccess,
                ])
                .loader_ref(failing)
                .build(),
        );
        builder.main_type_loader(outer);
        let file_loader = builder.build().unwrap();
        let err = exec(&file_loader, &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::ExplicitFailure);
    }

    #[test]
    fn block_selector_out_of_range() {
        // the selector is checked even when the jump is not taken
        let loader = TypeLoaderBuilder::new("BadJump", 0)
            .block([
                Insn::SetReg { reg: 0, imm: 1 },
                Insn::Jz {
                    reg: 0,
                    block_sel: 5,
                },
                Insn::ExitSuccess,
            ])
            .build();
        let err = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidBlockSelector(5));
    }

    // each jump kind sends a taken branch to an ExitSuccess block; a branch
    // that is not taken falls into an ExitFailure block
    fn jump_taken(make_jump: impl FnOnce(u8, usize) -> Insn, imm: u64) -> bool {
        let loader = TypeLoaderBuilder::new("Jump", 0)
            .block([Insn::SetReg { reg: 0, imm }, make_jump(0, 2)])
            .block([Insn::ExitFailure])
            .block([Insn::ExitSuccess])
            .build();
        exec(&single(loader), &[], ByteOrder::BigEndian).is_ok()
    }

    #[test]
    fn jump_conditions() {
        let ja = |reg, block_sel| Insn::Ja { reg, block_sel };
        let jb = |reg, block_sel| Insn::Jb { reg, block_sel };
        let jz = |reg, block_sel| Insn::Jz { reg, block_sel };
        let jo = |reg, block_sel| Insn::Jo { reg, block_sel };
        let jc = |reg, block_sel| Insn::Jc { reg, block_sel };

        assert!(jump_taken(ja, 1));
        assert!(!jump_taken(ja, 0));
        assert!(!jump_taken(ja, u64::MAX)); // -1 as i64

        assert!(jump_taken(jb, u64::MAX));
        assert!(!jump_taken(jb, 1));

        assert!(jump_taken(jz, 0));
        assert!(!jump_taken(jz, 7));

        assert!(jump_taken(jo, 1 << 63));
        assert!(!jump_taken(jo, 1));

        assert!(jump_taken(jc, 3));
        assert!(!jump_taken(jc, 2));
    }

    #[test]
    fn registers_are_per_invocation() {
        let mut builder = FileLoaderBuilder::new();
        let clobberer = builder.add_type_loader(
            TypeLoaderBuilder::new("Clobberer", 0)
                .block([Insn::SetReg { reg: 0, imm: 9 }, Insn::ExitSuccess])
                .build(),
        );
        let outer = builder.add_type_loader(
            TypeLoaderBuilder::new("Outer", 8)
                .block([
                    Insn::SetReg { reg: 0, imm: 7 },
                    Insn::CallTypeLoader {
                        type_sel: 0,
                        mem_off: 0,
                    },
                    Insn::PushR64 { reg: 0 },
                    Insn::PopM64 { mem_off: 0 },
                    Insn::ExitSuccess,
                ])
                .loader_ref(clobberer)
                .build(),
        );
        builder.main_type_loader(outer);
        let file_loader = builder.build().unwrap();
        let output = exec(&file_loader, &[], ByteOrder::BigEndian).unwrap();
        assert_eq!(output.read::<u64>(0), Some(7));
    }

    #[test]
    fn recursion_is_bounded() {
        let mut builder = FileLoaderBuilder::new();
        let recursive = builder.add_type_loader(
            TypeLoaderBuilder::new("Recursive", 4)
                .block([Insn::CallTypeLoader {
                    type_sel: 0,
                    mem_off: 0,
                }])
                .loader_ref(0)
                .build(),
        );
        builder.main_type_loader(recursive);
        let file_loader = builder.build().unwrap();
        let err = exec(&file_loader, &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::CallDepthExceeded);
    }

    #[test]
    fn seeks_move_the_cursor() {
        let loader = TypeLoaderBuilder::new("Seeker", 2)
            .block([
                Insn::SeekFwd { num_bytes: 2 },
                Insn::ReadM8 { mem_off: 0 },
                Insn::SeekBak { num_bytes: 2 },
                Insn::ReadM8 { mem_off: 1 },
                Insn::ExitSuccess,
            ])
            .build();
        let output = exec(
            &single(loader),
            &[0xAB, 0xCD, 0xEF, 0x01],
            ByteOrder::BigEndian,
        )
        .unwrap();
        assert_eq!(output.as_bytes(), &[0xEF, 0xCD]);
    }

    #[test]
    fn seek_before_start_faults() {
        let loader = TypeLoaderBuilder::new("BadSeek", 0)
            .block([Insn::SeekBak { num_bytes: 1 }, Insn::ExitSuccess])
            .build();
        let err = exec(&single(loader), &[0x00], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::SeekOutOfRange);
    }

    #[test]
    fn seek_past_end_faults() {
        let loader = TypeLoaderBuilder::new("BadSeek", 0)
            .block([Insn::SeekFwd { num_bytes: 2 }, Insn::ExitSuccess])
            .build();
        let err = exec(&single(loader), &[0x00], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::SeekOutOfRange);
    }

    #[test]
    fn fallthrough_past_last_block_is_success() {
        let loader = TypeLoaderBuilder::new("NoExit", 1)
            .block([Insn::SetReg { reg: 0, imm: 1 }])
            .build();
        let output = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap();
        assert_eq!(output.as_bytes(), &[0]);
    }

    #[test]
    fn arithmetic_results() {
        let loader = TypeLoaderBuilder::new("Arith", 24)
            .block([
                Insn::SetReg { reg: 0, imm: 3 },
                Insn::SetReg { reg: 1, imm: 4 },
                // 3^4 = 81
                Insn::Pow {
                    rres: 2,
                    r1: 0,
                    r2: 1,
                },
                Insn::PushR64 { reg: 2 },
                Insn::PopM64 { mem_off: 0 },
                // isqrt(81) = 9
                Insn::Sqrt { rres: 3, r1: 2 },
                Insn::PushR64 { reg: 3 },
                Insn::PopM64 { mem_off: 8 },
                // abs(-4) = 4
                Insn::SetReg {
                    reg: 4,
                    imm: (-4i64) as u64,
                },
                Insn::Abs { rres: 5, r1: 4 },
                Insn::PushR64 { reg: 5 },
                Insn::PopM64 { mem_off: 16 },
                Insn::ExitSuccess,
            ])
            .build();
        let output = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap();
        assert_eq!(output.read::<u64>(0), Some(81));
        assert_eq!(output.read::<u64>(8), Some(9));
        assert_eq!(output.read::<u64>(16), Some(4));
    }

    #[test]
    fn bitwise_results() {
        let loader = TypeLoaderBuilder::new("Bits", 16)
            .block([
                Insn::SetReg { reg: 0, imm: 0b1100 },
                Insn::SetReg { reg: 1, imm: 0b1010 },
                Insn::Nand {
                    rres: 2,
                    r1: 0,
                    r2: 1,
                },
                Insn::PushR64 { reg: 2 },
                Insn::PopM64 { mem_off: 0 },
                Insn::SetReg { reg: 3, imm: 4 },
                Insn::Rol {
                    rres: 4,
                    r1: 0,
                    r2: 3,
                },
                Insn::PushR64 { reg: 4 },
                Insn::PopM64 { mem_off: 8 },
                Insn::ExitSuccess,
            ])
            .build();
        let output = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap();
        assert_eq!(output.read::<u64>(0), Some(!0b1000u64));
        assert_eq!(output.read::<u64>(8), Some(0b1100_0000));
    }

    #[test]
    fn invalid_register_faults() {
        let loader = TypeLoaderBuilder::new("BadReg", 0)
            .block([
                Insn::SetReg {
                    reg: REG_COUNT as u8,
                    imm: 0,
                },
                Insn::ExitSuccess,
            ])
            .build();
        let err = exec(&single(loader), &[], ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidRegister(8));
    }

    #[test]
    fn exec_type_loader_writes_into_region() {
        let loader = TypeLoaderBuilder::new("U16", 2)
            .block([Insn::ReadM16 { mem_off: 0 }, Insn::ExitSuccess])
            .build();
        let file_loader = single(loader);
        let mut region = [0u8; 2];
        let mut stream = MemoryStream::new(&[0x12, 0x34], ByteOrder::BigEndian);
        Vm::new()
            .exec_type_loader(&file_loader, 0, &mut stream, &mut region)
            .unwrap();
        assert_eq!(u16::from_ne_bytes(region), 0x1234);
    }

    #[test]
    fn write_outside_alloc_size_faults() {
        let loader = TypeLoaderBuilder::new("TooSmall", 2)
            .block([Insn::ReadM32 { mem_off: 0 }, Insn::ExitSuccess])
            .build();
        let err = exec(
            &single(loader),
            &[0x01, 0x02, 0x03, 0x04],
            ByteOrder::BigEndian,
        )
        .unwrap_err();
        assert_eq!(err.kind, FaultKind::OutOfBoundsAccess);
    }

    #[test]
    fn array_push_pop_round_trips() {
        // copy an array through the stack to a second location
        let loader = TypeLoaderBuilder::new("ArrCopy", 12)
            .block([
                Insn::ReadA16 {
                    mem_off: 0,
                    elem_count: 3,
                },
                Insn::PushA16 {
                    mem_off: 0,
                    elem_count: 3,
                },
                Insn::PopA16 {
                    mem_off: 6,
                    elem_count: 3,
                },
                Insn::ExitSuccess,
            ])
            .build();
        let output = exec(
            &single(loader),
            &[0x00, 0x01, 0x00, 0x02, 0x00, 0x03],
            ByteOrder::BigEndian,
        )
        .unwrap();
        assert_eq!(output.read::<u16>(0), Some(1));
        assert_eq!(output.read::<u16>(2), Some(2));
        assert_eq!(output.read::<u16>(4), Some(3));
        assert_eq!(output.read::<u16>(6), Some(1));
        assert_eq!(output.read::<u16>(8), Some(2));
        assert_eq!(output.read::<u16>(10), Some(3));
    }
}
