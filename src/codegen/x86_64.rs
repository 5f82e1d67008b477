use crate::class::{ConstantPool, Instruction, Opcode};
use crate::diagnostics;

use super::{Isa, NativeBlob};

/// `push rbp; mov rbp, rsp; sub rsp, 64`.
const PROLOGUE: [u8; 8] = [0x55, 0x48, 0x89, 0xE5, 0x48, 0x83, 0xEC, 0x40];
/// `mov rsp, rbp; pop rbp; ret`.
const EPILOGUE: [u8; 5] = [0x48, 0x89, 0xEC, 0x5D, 0xC3];

pub(super) fn generate(instructions: &[Instruction], pool: &ConstantPool) -> NativeBlob {
    let mut out = Vec::new();
    out.extend_from_slice(&PROLOGUE);

    for instr in instructions {
        emit_one(instr, pool, &mut out);
    }

    out.extend_from_slice(&EPILOGUE);
    NativeBlob { bytes: out }
}

/// Push a 32-bit value, zero-extended into a full 64-bit stack slot:
/// `mov eax, imm32` (zero-extends into rax) then `push rax`. Both the
/// value that goes in and the value later popped via
/// [`pop_into_eax`]/[`pop_into_ebx`] agree on reading the low 32 bits, so
/// the 8-byte native push width never causes a mismatch (see the
/// REDESIGN note on stack slot size).
fn push_const(value: i32, out: &mut Vec<u8>) {
    out.push(0xB8); // mov eax, imm32
    out.extend_from_slice(&value.to_le_bytes());
    out.push(0x50); // push rax
}

fn push_local(index: u16, out: &mut Vec<u8>) {
    let offset = local_offset(index);
    out.extend_from_slice(&[0x8B, 0x45, offset]); // mov eax, [rbp - offset]
    out.push(0x50); // push rax
}

fn pop_into_local(index: u16, out: &mut Vec<u8>) {
    let offset = local_offset(index);
    out.push(0x58); // pop rax
    out.extend_from_slice(&[0x89, 0x45, offset]); // mov [rbp - offset], eax
}

/// `(index+1)*4`, encoded as the two's-complement displacement byte used
/// by a `disp8` `mov` against `rbp` (negative, since locals live below the
/// frame pointer in the reserved 64-byte region).
fn local_offset(index: u16) -> u8 {
    let disp = ((index as i32) + 1) * 4;
    (-disp) as i8 as u8
}

fn nop(out: &mut Vec<u8>) {
    out.push(0x90);
}

fn emit_one(instr: &Instruction, pool: &ConstantPool, out: &mut Vec<u8>) {
    match instr {
        Instruction::PushInt(v) => push_const(*v, out),
        Instruction::LoadConst { index, .. } => {
            // Unsupported-constant ldc targets (a string, a float, …) have
            // no integer value to push; fall back to nop like any other
            // opcode this generator doesn't model.
            match pool.resolve_integer(*index) {
                Some(v) => push_const(v, out),
                None => {
                    diagnostics::warn_nop(instr, Isa::X86_64);
                    nop(out);
                }
            }
        }
        Instruction::Local { opcode, index } => match opcode {
            Opcode::Iload => push_local(*index, out),
            Opcode::Istore => pop_into_local(*index, out),
            _ => {
                diagnostics::warn_nop(instr, Isa::X86_64);
                nop(out);
            }
        },
        Instruction::Arithmetic(op @ (Opcode::Iadd | Opcode::Isub | Opcode::Imul | Opcode::Idiv)) => {
            // pop rbx; pop rax; <op> eax, ebx; push rax
            out.push(0x5B); // pop rbx
            out.push(0x58); // pop rax
            match op {
                Opcode::Iadd => out.extend_from_slice(&[0x01, 0xD8]), // add eax, ebx
                Opcode::Isub => out.extend_from_slice(&[0x29, 0xD8]), // sub eax, ebx
                Opcode::Imul => out.extend_from_slice(&[0x0F, 0xAF, 0xC3]), // imul eax, ebx
                Opcode::Idiv => {
                    out.push(0x99); // cdq (sign-extend eax into edx:eax)
                    out.extend_from_slice(&[0xF7, 0xFB]); // idiv ebx
                }
                _ => unreachable!(),
            }
            out.push(0x50); // push rax
        }
        Instruction::Arithmetic(_) => {
            diagnostics::warn_nop(instr, Isa::X86_64);
            nop(out);
        }
        Instruction::Return(Opcode::Ireturn) => {
            out.push(0x58); // pop rax (low eax holds the return value)
        }
        Instruction::Return(Opcode::Return) => {
            // Epilogue handles the actual return; nothing to pop.
        }
        Instruction::Return(_) => {
            diagnostics::warn_nop(instr, Isa::X86_64);
            nop(out);
        }
        Instruction::Label(_) | Instruction::LineNumber(_) | Instruction::Frame => {
            // Synthetic; emits no bytes.
        }
        _ => {
            diagnostics::warn_nop(instr, Isa::X86_64);
            nop(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pool() -> ConstantPool {
        let bytes = vec![0u8, 1];
        let mut cursor = std::io::Cursor::new(bytes.as_slice());
        ConstantPool::parse(&mut cursor).unwrap()
    }

    #[test]
    fn emits_prologue_and_epilogue() {
        let pool = empty_pool();
        let blob = generate(&[], &pool);
        assert!(blob.as_bytes().starts_with(&PROLOGUE));
        assert!(blob.as_bytes().ends_with(&EPILOGUE));
    }

    #[test]
    fn ends_with_ret() {
        let pool = empty_pool();
        let blob = generate(
            &[Instruction::PushInt(42), Instruction::Return(Opcode::Ireturn)],
            &pool,
        );
        assert_eq!(*blob.as_bytes().last().unwrap(), 0xC3);
    }

    #[test]
    fn e7_scenario_has_no_add_opcode_after_folding() {
        // Post-fold instruction stream should be a single push + ireturn.
        let pool = empty_pool();
        let instrs = vec![Instruction::PushInt(10), Instruction::Return(Opcode::Ireturn)];
        let blob = generate(&instrs, &pool);
        let body = &blob.as_bytes()[PROLOGUE.len()..blob.len() - EPILOGUE.len()];
        // mov eax,imm32(5) + push(1) + pop rax(1) = 7 bytes, no add-family opcode (0x01/0x29/0xAF/0xF7).
        assert!(!body.contains(&0x01));
        assert!(!body.contains(&0xAF));
    }

    #[test]
    fn unsupported_opcode_emits_single_nop() {
        let pool = empty_pool();
        let blob = generate(&[Instruction::Simple(Opcode::Arraylength)], &pool);
        let body = &blob.as_bytes()[PROLOGUE.len()..blob.len() - EPILOGUE.len()];
        assert_eq!(body, &[0x90]);
    }
}
