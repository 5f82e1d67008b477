//! The code generator (C4): translates one method's instruction list into
//! native machine code for a single target ISA.
//!
//! The source VM is a stack machine; both target ISAs are register
//! machines. Every emitter keeps operands on the *native* call stack
//! rather than allocating registers: a constant push materializes the
//! value in a scratch register then pushes it, a binary op pops two
//! operands into scratch registers, computes, and pushes the result. This
//! is correct-by-construction for straight-line integer code and needs no
//! register allocator.

mod aarch64;
mod x86_64;

use crate::class::{ConstantPool, Instruction};
use crate::diagnostics;

/// Target instruction set architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isa {
    X86_64,
    Arm64,
}

impl Isa {
    /// Detect the host ISA. Used as the default when a caller does not
    /// pass an explicit selector.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            Isa::Arm64
        } else {
            Isa::X86_64
        }
    }
}

/// An append-only byte sequence: the emitter's output for one method. Has
/// no internal structure; any labels referenced by branches within it are
/// resolved to intra-blob offsets before the blob is returned.
#[derive(Debug, Clone, Default)]
pub struct NativeBlob {
    bytes: Vec<u8>,
}

impl NativeBlob {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Build a blob from already-emitted bytes, used by
    /// `compile_class_native` to concatenate several methods' blobs into
    /// one (spec.md §5's "entry is the file offset of the first emitted
    /// method" ordering rule).
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Emit a single method's instructions as native code for `isa`. `pool`
/// resolves the integer `ldc` forms the supported opcode table includes.
/// The generator never fails: malformed instruction streams are the class
/// reader's responsibility, and any opcode this crate doesn't translate is
/// replaced with the target ISA's `nop`, logged through
/// [`diagnostics::warn_nop`].
#[must_use]
pub fn generate(instructions: &[Instruction], pool: &ConstantPool, isa: Isa) -> NativeBlob {
    match isa {
        Isa::X86_64 => x86_64::generate(instructions, pool),
        Isa::Arm64 => aarch64::generate(instructions, pool),
    }
}
