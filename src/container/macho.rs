use crate::codegen::Isa;

const VMADDR_BASE: u64 = 0x1_0000_0000;
const CODE_FILE_OFFSET: u64 = 0x1000;

const MH_SIZE: usize = 32;
const SEGMENT_SIZE: usize = 72;
const SECTION_SIZE: usize = 80;
const LC_MAIN_SIZE: usize = 24;

const SIZEOFCMDS: u32 = (SEGMENT_SIZE + SECTION_SIZE + LC_MAIN_SIZE) as u32;

/// Write a minimal Mach-O 64 executable with one `LC_SEGMENT_64`
/// (containing a single `__text` section inside `__TEXT`) and one
/// `LC_MAIN` (spec.md §4.5.3).
#[must_use]
pub fn write(blob: &[u8], entry_offset: u32, isa: Isa) -> Vec<u8> {
    let mut out = Vec::with_capacity(CODE_FILE_OFFSET as usize + blob.len());

    out.extend_from_slice(&mach_header(isa));
    out.extend_from_slice(&segment_command(blob.len() as u64));
    out.extend_from_slice(&section(blob.len() as u64));
    out.extend_from_slice(&lc_main(entry_offset));
    out.resize(CODE_FILE_OFFSET as usize, 0);
    out.extend_from_slice(blob);

    out
}

fn mach_header(isa: Isa) -> [u8; MH_SIZE] {
    let mut h = [0u8; MH_SIZE];
    h[0..4].copy_from_slice(&0xFEED_FACFu32.to_le_bytes()); // MH_MAGIC_64

    let (cputype, cpusubtype): (u32, u32) = match isa {
        Isa::X86_64 => (0x0100_0007, 3),
        Isa::Arm64 => (0x0100_000C, 0),
    };
    h[4..8].copy_from_slice(&cputype.to_le_bytes());
    h[8..12].copy_from_slice(&cpusubtype.to_le_bytes());

    h[12..16].copy_from_slice(&2u32.to_le_bytes()); // MH_EXECUTE
    h[16..20].copy_from_slice(&2u32.to_le_bytes()); // ncmds
    h[20..24].copy_from_slice(&SIZEOFCMDS.to_le_bytes());
    h[24..28].copy_from_slice(&0x0020_0005u32.to_le_bytes()); // MH_NOUNDEFS|MH_DYLDLINK|MH_PIE
                                                               // h[28..32] reserved = 0
    h
}

fn segment_command(blob_len: u64) -> [u8; SEGMENT_SIZE] {
    let mut s = [0u8; SEGMENT_SIZE];
    s[0..4].copy_from_slice(&0x19u32.to_le_bytes()); // LC_SEGMENT_64
    s[4..8].copy_from_slice(&(SEGMENT_SIZE as u32 + SECTION_SIZE as u32).to_le_bytes());
    write_padded_name(&mut s[8..24], "__TEXT");
    s[24..32].copy_from_slice(&VMADDR_BASE.to_le_bytes()); // vmaddr
    s[32..40].copy_from_slice(&blob_len.to_le_bytes()); // vmsize
    s[40..48].copy_from_slice(&CODE_FILE_OFFSET.to_le_bytes()); // fileoff
    s[48..56].copy_from_slice(&blob_len.to_le_bytes()); // filesize
    s[56..60].copy_from_slice(&5u32.to_le_bytes()); // maxprot RX
    s[60..64].copy_from_slice(&5u32.to_le_bytes()); // initprot RX
    s[64..68].copy_from_slice(&1u32.to_le_bytes()); // nsects
    s[68..72].copy_from_slice(&0u32.to_le_bytes()); // flags
    s
}

fn section(blob_len: u64) -> [u8; SECTION_SIZE] {
    let mut s = [0u8; SECTION_SIZE];
    write_padded_name(&mut s[0..16], "__text");
    write_padded_name(&mut s[16..32], "__TEXT");
    let addr = VMADDR_BASE + CODE_FILE_OFFSET;
    s[32..40].copy_from_slice(&addr.to_le_bytes());
    s[40..48].copy_from_slice(&blob_len.to_le_bytes());
    s[48..52].copy_from_slice(&(CODE_FILE_OFFSET as u32).to_le_bytes()); // offset
    s[52..56].copy_from_slice(&4u32.to_le_bytes()); // align = 2^4 = 16
    s[56..60].copy_from_slice(&0u32.to_le_bytes()); // reloff
    s[60..64].copy_from_slice(&0u32.to_le_bytes()); // nreloc
    s[64..68].copy_from_slice(&0x8000_0400u32.to_le_bytes()); // S_ATTR_PURE_INSTRUCTIONS|S_ATTR_SOME_INSTRUCTIONS
                                                               // s[68..80] three reserved dwords = 0
    s
}

fn lc_main(entry_offset: u32) -> [u8; LC_MAIN_SIZE] {
    let mut l = [0u8; LC_MAIN_SIZE];
    l[0..4].copy_from_slice(&0x8000_0028u32.to_le_bytes()); // LC_MAIN
    l[4..8].copy_from_slice(&(LC_MAIN_SIZE as u32).to_le_bytes());
    // Canonical file-offset-from-image-start semantics (REDESIGN fix,
    // spec.md §9): the code segment always starts at CODE_FILE_OFFSET, so
    // entryoff is just that plus the method's offset within the blob.
    let entryoff = CODE_FILE_OFFSET + entry_offset as u64;
    l[8..16].copy_from_slice(&entryoff.to_le_bytes());
    l[16..24].copy_from_slice(&0u64.to_le_bytes()); // stacksize
    l
}

fn write_padded_name(dst: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    dst[..bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_macho_magic() {
        let image = write(&[0xC0, 0x03, 0x5F, 0xD6], 0, Isa::Arm64);
        assert_eq!(&image[0..4], &0xFEED_FACFu32.to_le_bytes());
    }

    #[test]
    fn code_region_starts_at_0x1000() {
        let image = write(&[0xC0, 0x03, 0x5F, 0xD6], 0, Isa::Arm64);
        assert_eq!(image.len(), CODE_FILE_OFFSET as usize + 4);
    }

    #[test]
    fn arm64_cputype_is_set() {
        let image = write(&[0u8; 4], 0, Isa::Arm64);
        let cputype = u32::from_le_bytes(image[4..8].try_into().unwrap());
        assert_eq!(cputype, 0x0100_000C);
    }

    #[test]
    fn ncmds_is_two() {
        let image = write(&[0u8; 4], 0, Isa::Arm64);
        let ncmds = u32::from_le_bytes(image[16..20].try_into().unwrap());
        assert_eq!(ncmds, 2);
    }
}
