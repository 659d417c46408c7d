//! Builders for hand-assembling loader programs.
//!
//! These stand in for the format-description front end that will eventually
//! compile human-readable descriptions down to loader bytecode; until that
//! exists, programs are assembled directly.

use crate::insn::{Insn, InsnBlock};
use crate::loader::{FileLoader, TypeLoader};

/// An error detected while assembling a [`FileLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// No main loader index was set.
    MissingMainLoader,
    /// The main loader index is outside the arena.
    MainLoaderOutOfRange(usize),
    /// A loader's reference table names an arena index that does not exist.
    LoaderRefOutOfRange {
        /// Arena index of the loader holding the bad reference.
        loader: usize,
        /// The out-of-range arena index it referenced.
        referenced: usize,
    },
    /// A loader has no blocks, so it has no entry block to execute.
    EmptyLoader(usize),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::MissingMainLoader => write!(f, "No main type loader was set"),
            BuildError::MainLoaderOutOfRange(ix) => {
                write!(f, "Main type loader index {ix} is out of range")
            }
            BuildError::LoaderRefOutOfRange { loader, referenced } => write!(
                f,
                "Type loader {loader} references nonexistent loader {referenced}"
            ),
            BuildError::EmptyLoader(ix) => {
                write!(f, "Type loader {ix} has no instruction blocks")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Assembles one [`TypeLoader`].
#[derive(Debug, Clone)]
pub struct TypeLoaderBuilder {
    name: String,
    doc: Option<String>,
    alloc_size: usize,
    blocks: Vec<InsnBlock>,
    refs: Vec<usize>,
}

impl TypeLoaderBuilder {
    /// Start a loader for the named type, whose parsed instance occupies
    /// `alloc_size` bytes.
    pub fn new(name: impl Into<String>, alloc_size: usize) -> Self {
        TypeLoaderBuilder {
            name: name.into(),
            doc: None,
            alloc_size,
            blocks: Vec::new(),
            refs: Vec::new(),
        }
    }

    /// Attach a human-readable description of the type.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Append a basic block. The first block added is the entry block.
    pub fn block(mut self, insns: impl IntoIterator<Item = Insn>) -> Self {
        self.blocks.push(insns.into_iter().collect());
        self
    }

    /// Register a callee by arena index, returning builder for chaining.
    ///
    /// The position of each call in registration order is the `type_sel`
    /// operand `CallTypeLoader` uses to name it.
    pub fn loader_ref(mut self, arena_index: usize) -> Self {
        self.refs.push(arena_index);
        self
    }

    pub fn build(self) -> TypeLoader {
        TypeLoader {
            type_name: self.name,
            type_doc: self.doc,
            alloc_size: self.alloc_size,
            blocks: self.blocks,
            type_loader_refs: self.refs,
        }
    }
}

/// Assembles a [`FileLoader`] arena and validates its invariants.
#[derive(Debug, Clone, Default)]
pub struct FileLoaderBuilder {
    loaders: Vec<TypeLoader>,
    main_index: Option<usize>,
}

impl FileLoaderBuilder {
    pub fn new() -> Self {
        FileLoaderBuilder::default()
    }

    /// Add a loader to the arena, returning its arena index.
    pub fn add_type_loader(&mut self, loader: TypeLoader) -> usize {
        self.loaders.push(loader);
        self.loaders.len() - 1
    }

    /// Select the entry loader.
    pub fn main_type_loader(&mut self, arena_index: usize) -> &mut Self {
        self.main_index = Some(arena_index);
        self
    }

    /// Validate and produce the finished [`FileLoader`].
    ///
    /// Checks that the main index is set and in range, that every loader has
    /// an entry block, and that every reference table entry points inside the
    /// arena. Reference cycles are legal; the VM bounds them at run time.
    pub fn build(self) -> Result<FileLoader, BuildError> {
        let main_index = self.main_index.ok_or(BuildError::MissingMainLoader)?;
        if main_index >= self.loaders.len() {
            return Err(BuildError::MainLoaderOutOfRange(main_index));
        }
        for (ix, loader) in self.loaders.iter().enumerate() {
            if loader.blocks.is_empty() {
                return Err(BuildError::EmptyLoader(ix));
            }
            for &referenced in &loader.type_loader_refs {
                if referenced >= self.loaders.len() {
                    return Err(BuildError::LoaderRefOutOfRange {
                        loader: ix,
                        referenced,
                    });
                }
            }
        }
        Ok(FileLoader {
            type_loaders: self.loaders,
            main_type_loader_index: main_index,
        })
    }
}
