//! Executing binary format descriptions as bytecode
//!
//! This crate provides a small register/stack virtual machine whose programs
//! ("type loaders") read a byte stream, apply endianness correction, and
//! materialize structured records into an output buffer. A [`FileLoader`]
//! collects the type loaders for one complete file format; nested and
//! composite types are reached through inter-loader calls, and
//! data-dependent layout (version-gated fields and the like) is expressed
//! with conditional jumps between basic blocks.
//!
//! Every memory access is bounds-checked: truncated or adversarial input
//! fails with a structured [`ExecError`] naming the faulting block and
//! instruction, never with a panic or a partially-populated buffer presented
//! as complete.
//!
//! Programs are assembled with [`TypeLoaderBuilder`] and
//! [`FileLoaderBuilder`]; a source-level format-description front end is the
//! intended future producer of this bytecode.
//!
//! # Example
//!
//! ```
//! use crossfile_vm::{
//!     FileLoaderBuilder, Insn, MemoryStream, TypeLoaderBuilder, Vm,
//!     types::ByteOrder,
//! };
//!
//! // a type with a single little-endian u32 field at offset 0
//! let loader = TypeLoaderBuilder::new("Version", 4)
//!     .block([Insn::ReadM32 { mem_off: 0 }, Insn::ExitSuccess])
//!     .build();
//! let mut builder = FileLoaderBuilder::new();
//! let main = builder.add_type_loader(loader);
//! builder.main_type_loader(main);
//! let file_loader = builder.build().unwrap();
//!
//! let bytes = [0x01, 0x00, 0x00, 0x00];
//! let mut stream = MemoryStream::new(&bytes, ByteOrder::LittleEndian);
//! let output = Vm::new().exec_file_loader(&file_loader, &mut stream).unwrap();
//! assert_eq!(output.read::<u32>(0), Some(1));
//! ```

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

mod builder;
mod error;
mod insn;
mod loader;
mod output;
mod stack;
mod stream;
mod vm;

pub use builder::{BuildError, FileLoaderBuilder, TypeLoaderBuilder};
pub use error::{ExecError, FaultKind};
pub use insn::{Insn, InsnBlock};
pub use loader::{FileLoader, TypeLoader};
pub use output::OutputBuffer;
pub use stack::LoaderStack;
pub use stream::{DataStream, MemoryStream, StreamError};
pub use vm::{Vm, REG_COUNT};

/// Public re-export of the crossfile-types crate.
pub extern crate crossfile_types as types;
