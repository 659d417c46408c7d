//! Type loaders and file loaders.

use crate::insn::InsnBlock;

/// A named bytecode program that parses exactly one structured type.
///
/// Block 0 is the entry block. A loader may call other loaders for nested
/// and composite fields; callees are named by position in this loader's
/// reference table, which in turn holds indices into the owning
/// [`FileLoader`]'s arena. Loaders are immutable once built, so many VM
/// executions may share one loader concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLoader {
    pub(crate) type_name: String,
    pub(crate) type_doc: Option<String>,
    pub(crate) alloc_size: usize,
    pub(crate) blocks: Vec<InsnBlock>,
    pub(crate) type_loader_refs: Vec<usize>,
}

impl TypeLoader {
    /// The name of the parsed type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Optional human-readable description of the parsed type.
    pub fn type_doc(&self) -> Option<&str> {
        self.type_doc.as_deref()
    }

    /// The number of output buffer bytes one instance of this type needs.
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }

    /// The loader's basic blocks, entry block first.
    pub fn blocks(&self) -> &[InsnBlock] {
        &self.blocks
    }

    /// Arena indices of the loaders this loader may call, in reference-table
    /// order.
    pub fn type_loader_refs(&self) -> &[usize] {
        &self.type_loader_refs
    }
}

/// A complete file format: an arena of type loaders plus the entry loader.
///
/// Loaders reference each other by arena index, so the graph may be cyclic
/// (recursive formats); the VM bounds cycles with its call depth limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoader {
    pub(crate) type_loaders: Vec<TypeLoader>,
    pub(crate) main_type_loader_index: usize,
}

impl FileLoader {
    /// All type loaders, in arena order.
    pub fn type_loaders(&self) -> &[TypeLoader] {
        &self.type_loaders
    }

    /// The arena index of the entry loader for "parse this whole file".
    pub fn main_type_loader_index(&self) -> usize {
        self.main_type_loader_index
    }

    /// The entry loader itself.
    pub fn main_type_loader(&self) -> &TypeLoader {
        // the index is validated at build time
        &self.type_loaders[self.main_type_loader_index]
    }

    /// The loader at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&TypeLoader> {
        self.type_loaders.get(index)
    }
}
