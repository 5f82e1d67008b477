//! The container writer (C5): wraps an emitted [`NativeBlob`] in a
//! minimal, platform-specific executable and marks it runnable.

mod elf;
mod macho;
mod trampoline;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::codegen::{Isa, NativeBlob};
use crate::diagnostics;
use crate::error::{Error, Result};

/// Which executable container format to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Elf64,
    MachO64,
}

/// Prepend the ISA trampoline to `blob` and wrap the result in `format`'s
/// executable container, writing it to `path` and marking it executable.
///
/// The container's entry point always targets byte 0 of the combined
/// trampoline-plus-code region, never the user code past it: when a
/// trampoline is present (every case but Mach-O/AArch64), the OS must start
/// there so the trampoline's own fixed internal call into the method, and
/// its subsequent `exit` syscall, actually run (an entry point that skips
/// straight to the method would leave it falling off its final `ret` with
/// no return address on the stack). When no trampoline is emitted
/// (Mach-O/AArch64), the method itself sits at offset 0, so the same `0`
/// is simply "the method's own first instruction".
pub fn write(
    blob: &NativeBlob,
    format: ContainerFormat,
    isa: Isa,
    path: &Path,
) -> Result<()> {
    let trampoline = trampoline::bytes(isa, format == ContainerFormat::MachO64);
    let entry_offset = 0u32;

    let mut full_blob = trampoline;
    full_blob.extend_from_slice(blob.as_bytes());

    let image = match format {
        ContainerFormat::Elf64 => elf::write(&full_blob, entry_offset, isa),
        ContainerFormat::MachO64 => macho::write(&full_blob, entry_offset, isa),
    };

    write_file(&image, path)?;
    if let Err(err) = set_executable(path) {
        diagnostics::warn_permission(path, &err);
    }

    Ok(())
}

fn write_file(image: &[u8], path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(image)?;
    Ok(())
}

/// Set POSIX permission bits `rwxr-xr-x` on the produced file. Non-fatal
/// on platforms without POSIX bit semantics (spec.md §4.5.4): the error is
/// returned to the caller so a direct caller of this function still gets a
/// typed result, but [`crate::pipeline`] only ever logs it via
/// [`crate::diagnostics::warn_permission`] and continues.
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(Error::PermissionSetFailed)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
