//! Diagnostic sink for lossy or non-fatal conditions.
//!
//! Nothing here returns an error: the emission gaps and permission-bit
//! failures described in the error handling design are reportable but
//! recoverable, so they go through `log` rather than the `Error` enum's
//! propagation path.

use crate::class::Instruction;
use crate::codegen::Isa;
use crate::error::Error;

/// Logged once per instruction the code generator could not translate and
/// replaced with a single ISA `nop`.
pub fn warn_nop(instr: &Instruction, isa: Isa) {
    log::warn!("{isa:?}: emitting nop for unsupported instruction {instr:?}");
}

/// Logged when setting the executable permission bits on a freshly written
/// container fails; the write itself already succeeded, so compilation
/// still counts as having produced output.
pub fn warn_permission(path: &std::path::Path, err: &Error) {
    log::warn!("could not mark `{}` executable: {err}", path.display());
}
