use crate::codegen::Isa;

/// The fixed ISA-specific trampoline prepended to the user's emitted code:
/// calls into the blob, then invokes the `exit` syscall with the blob's
/// return value (spec.md §4.5.1).
///
/// Mach-O/AArch64 has no trampoline; the emitted blob is used directly as
/// the entry point, and its own `ret` only terminates the process if
/// `dyld` itself treats reaching it as `_exit` (a documented limitation
/// inherited rather than fixed; see DESIGN.md).
#[must_use]
pub fn bytes(isa: Isa, for_macho: bool) -> Vec<u8> {
    match (isa, for_macho) {
        (Isa::X86_64, _) => x86_64_linux_exit().to_vec(),
        (Isa::Arm64, false) => aarch64_linux_exit().to_vec(),
        (Isa::Arm64, true) => Vec::new(),
    }
}

/// ```text
/// E8 0C 00 00 00        call rel32 -> +12 (skip the 12 wrapper bytes)
/// 48 89 C7              mov rdi, rax
/// 48 C7 C0 3C 00 00 00  mov rax, 60        ; Linux exit
/// 0F 05                 syscall
/// ```
fn x86_64_linux_exit() -> [u8; 17] {
    [
        0xE8, 0x0C, 0x00, 0x00, 0x00, 0x48, 0x89, 0xC7, 0x48, 0xC7, 0xC0, 0x3C, 0x00, 0x00, 0x00,
        0x0F, 0x05,
    ]
}

/// The same shape on AArch64/Linux: call the blob (placed immediately
/// after this trampoline), then, once the blob's own `ret` returns here,
/// move its return value into `x0`, set `x8` to the Linux `exit` syscall
/// number (93), `svc #0`.
///
/// ```text
/// BL  +12         ; 0x94000003  call the blob, which starts right after this trampoline
/// MOV x8, #93     ; 0xD2800BA8
/// SVC #0          ; 0xD4000001
/// ```
fn aarch64_linux_exit() -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&0x9400_0003u32.to_le_bytes());
    out[4..8].copy_from_slice(&0xD280_0BA8u32.to_le_bytes());
    out[8..12].copy_from_slice(&0xD400_0001u32.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_trampoline_is_17_bytes_and_starts_with_call() {
        let t = bytes(Isa::X86_64, false);
        assert_eq!(t.len(), 17);
        assert_eq!(t[0], 0xE8);
    }

    #[test]
    fn macho_arm64_has_no_trampoline() {
        assert!(bytes(Isa::Arm64, true).is_empty());
    }

    #[test]
    fn elf_arm64_trampoline_ends_with_svc() {
        let t = bytes(Isa::Arm64, false);
        assert_eq!(t.len(), 12);
        assert_eq!(&t[8..12], &0xD400_0001u32.to_le_bytes());
    }
}
