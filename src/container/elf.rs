use crate::codegen::Isa;

const BASE_VADDR: u64 = 0x0040_0000;
const CODE_FILE_OFFSET: u64 = 0x1000;

const EHDR_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;

/// Write a minimal ELF64 executable wrapping `blob` (trampoline + user
/// code, already concatenated by the caller) with its code region starting
/// at file offset `0x1000` (spec.md §4.5.2). `entry_offset` is the byte
/// offset of the method's first instruction *within* `blob`.
#[must_use]
pub fn write(blob: &[u8], entry_offset: u32, isa: Isa) -> Vec<u8> {
    let mut out = Vec::with_capacity(CODE_FILE_OFFSET as usize + blob.len());

    out.extend_from_slice(&header(blob.len() as u64, entry_offset, isa));
    out.extend_from_slice(&program_header(blob.len() as u64));
    out.resize(CODE_FILE_OFFSET as usize, 0);
    out.extend_from_slice(blob);

    out
}

fn header(blob_len: u64, entry_offset: u32, isa: Isa) -> [u8; EHDR_SIZE as usize] {
    let mut h = [0u8; EHDR_SIZE as usize];
    h[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    h[4] = 2; // ELFCLASS64
    h[5] = 1; // little-endian
    h[6] = 1; // EI_VERSION
              // h[7] EI_OSABI = 0, h[8] EI_ABIVERSION = 0, h[9..16] padding = 0

    h[16..18].copy_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
    let machine: u16 = match isa {
        Isa::X86_64 => 62,  // EM_X86_64
        Isa::Arm64 => 183,  // EM_AARCH64
    };
    h[18..20].copy_from_slice(&machine.to_le_bytes());
    h[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version

    let entry = BASE_VADDR + CODE_FILE_OFFSET + entry_offset as u64;
    h[24..32].copy_from_slice(&entry.to_le_bytes()); // e_entry
    h[32..40].copy_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
    h[40..48].copy_from_slice(&0u64.to_le_bytes()); // e_shoff

    h[48..52].copy_from_slice(&0u32.to_le_bytes()); // e_flags
    h[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    h[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    h[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
    h[58..60].copy_from_slice(&0u16.to_le_bytes()); // e_shentsize
    h[60..62].copy_from_slice(&0u16.to_le_bytes()); // e_shnum
    h[62..64].copy_from_slice(&0u16.to_le_bytes()); // e_shstrndx

    let _ = blob_len;
    h
}

fn program_header(blob_len: u64) -> [u8; PHDR_SIZE as usize] {
    let mut ph = [0u8; PHDR_SIZE as usize];
    ph[0..4].copy_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
    ph[4..8].copy_from_slice(&5u32.to_le_bytes()); // p_flags = PF_R|PF_X
    ph[8..16].copy_from_slice(&CODE_FILE_OFFSET.to_le_bytes()); // p_offset
    let vaddr = BASE_VADDR + CODE_FILE_OFFSET;
    ph[16..24].copy_from_slice(&vaddr.to_le_bytes()); // p_vaddr
    ph[24..32].copy_from_slice(&vaddr.to_le_bytes()); // p_paddr
    ph[32..40].copy_from_slice(&blob_len.to_le_bytes()); // p_filesz
    ph[40..48].copy_from_slice(&blob_len.to_le_bytes()); // p_memsz
    ph[48..56].copy_from_slice(&0x1000u64.to_le_bytes()); // p_align
    ph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_elf_magic() {
        let image = write(&[0x90], 0, Isa::X86_64);
        assert_eq!(&image[0..4], &[0x7F, b'E', b'L', b'F']);
    }

    #[test]
    fn code_region_starts_at_0x1000() {
        let image = write(&[0x90; 20], 0, Isa::X86_64);
        assert_eq!(image.len(), CODE_FILE_OFFSET as usize + 20);
        assert_eq!(image[CODE_FILE_OFFSET as usize], 0x90);
    }

    #[test]
    fn entry_point_is_base_plus_code_offset_plus_entry_offset() {
        let image = write(&[0x90; 4], 17, Isa::X86_64);
        let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
        assert_eq!(entry, BASE_VADDR + CODE_FILE_OFFSET + 17);
    }

    #[test]
    fn machine_field_selects_aarch64() {
        let image = write(&[0x1F, 0x20, 0x03, 0xD5], 0, Isa::Arm64);
        let machine = u16::from_le_bytes(image[18..20].try_into().unwrap());
        assert_eq!(machine, 183);
    }
}
