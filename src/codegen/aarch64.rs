use crate::class::{ConstantPool, Instruction, Opcode};
use crate::diagnostics;

use super::{Isa, NativeBlob};

/// `stp x29, x30, [sp, #-16]!; mov x29, sp; sub sp, sp, #64`.
const PROLOGUE: [u32; 3] = [0xA9BF_7BFD, 0x9100_03FD, 0xD101_03FF];
/// `add sp, sp, #64; ldp x29, x30, [sp], #16; ret`.
const EPILOGUE: [u32; 3] = [0x9101_03FF, 0xA8C1_7BFD, 0xD65F_03C0];

pub(super) fn generate(instructions: &[Instruction], pool: &ConstantPool) -> NativeBlob {
    let mut words = Vec::new();
    words.extend_from_slice(&PROLOGUE);

    for instr in instructions {
        emit_one(instr, pool, &mut words);
    }

    words.extend_from_slice(&EPILOGUE);

    let mut bytes = Vec::with_capacity(words.len() * 4);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    NativeBlob { bytes }
}

/// MOVZ Wd, #imm16, LSL #(hw*16). `hw` is 0 or 1 for the 32-bit variant.
fn movz_w(rd: u32, imm16: u16, hw: u32) -> u32 {
    0x5280_0000 | (hw << 21) | ((imm16 as u32) << 5) | rd
}

/// MOVK Wd, #imm16, LSL #(hw*16).
fn movk_w(rd: u32, imm16: u16, hw: u32) -> u32 {
    0x72A0_0000 | (hw << 21) | ((imm16 as u32) << 5) | rd
}

/// Materialize the full 32-bit immediate `value` into `Wd` with a
/// MOVZ/MOVK pair: the low 16 bits via MOVZ, the high 16 bits via MOVK
/// (LSL #16). Two instructions always suffice for any `i32`, unlike the
/// naive single-MOVZ the source used (REDESIGN note, spec.md §9).
fn materialize_w(rd: u32, value: i32, out: &mut Vec<u32>) {
    let bits = value as u32;
    let lo = (bits & 0xFFFF) as u16;
    let hi = (bits >> 16) as u16;
    out.push(movz_w(rd, lo, 0));
    out.push(movk_w(rd, hi, 1));
}

/// STR Xt, [Xn, #-8]! (pre-index, 8-byte native stack slot).
fn str_x_pre8(rt: u32, rn: u32) -> u32 {
    // imm9 = -8 in 9-bit two's complement, mode = 11 (pre-index).
    0xF800_0000 | (0 << 22) | (0x1F8 << 12) | (0b11 << 10) | (rn << 5) | rt
}

/// LDR Xt, [Xn], #8 (post-index).
fn ldr_x_post8(rt: u32, rn: u32) -> u32 {
    0xF800_0000 | (1 << 22) | (0x008 << 12) | (0b01 << 10) | (rn << 5) | rt
}

/// STUR Wt, [Xn, #simm] (unscaled signed byte offset, no writeback): used
/// for local-variable stores at a 4-byte granularity inside the reserved
/// frame.
fn stur_w(rt: u32, rn: u32, simm9: i32) -> u32 {
    0xB800_0000 | (0 << 22) | (((simm9 as u32) & 0x1FF) << 12) | (rn << 5) | rt
}

/// LDUR Wt, [Xn, #simm].
fn ldur_w(rt: u32, rn: u32, simm9: i32) -> u32 {
    0xB800_0000 | (1 << 22) | (((simm9 as u32) & 0x1FF) << 12) | (rn << 5) | rt
}

const X29: u32 = 29;
const SP: u32 = 31;
const W0: u32 = 0;
const W1: u32 = 1;

fn push_x0(out: &mut Vec<u32>) {
    out.push(str_x_pre8(W0, SP));
}

fn pop_into(rt: u32, out: &mut Vec<u32>) {
    out.push(ldr_x_post8(rt, SP));
}

/// `(index+1)*4`, negative (locals live below `x29` in the reserved
/// 64-byte region), matching the x86-64 emitter's frame layout.
fn local_offset(index: u16) -> i32 {
    -(((index as i32) + 1) * 4)
}

fn nop(out: &mut Vec<u32>) {
    out.push(0xD503_201F);
}

fn emit_one(instr: &Instruction, pool: &ConstantPool, out: &mut Vec<u32>) {
    match instr {
        Instruction::PushInt(v) => {
            materialize_w(W0, *v, out);
            push_x0(out);
        }
        Instruction::LoadConst { index, .. } => match pool.resolve_integer(*index) {
            Some(v) => {
                materialize_w(W0, v, out);
                push_x0(out);
            }
            None => {
                diagnostics::warn_nop(instr, Isa::Arm64);
                nop(out);
            }
        },
        Instruction::Local { opcode: Opcode::Iload, index } => {
            out.push(ldur_w(W0, X29, local_offset(*index)));
            push_x0(out);
        }
        Instruction::Local { opcode: Opcode::Istore, index } => {
            pop_into(W0, out);
            out.push(stur_w(W0, X29, local_offset(*index)));
        }
        Instruction::Local { .. } => {
            diagnostics::warn_nop(instr, Isa::Arm64);
            nop(out);
        }
        Instruction::Arithmetic(op @ (Opcode::Iadd | Opcode::Isub | Opcode::Imul | Opcode::Idiv)) => {
            pop_into(W1, out); // w1 = rhs
            pop_into(W0, out); // w0 = lhs
            match op {
                Opcode::Iadd => out.push(0x0B01_0000), // add w0, w0, w1
                Opcode::Isub => out.push(0x4B01_0000), // sub w0, w0, w1
                Opcode::Imul => out.push(0x1B01_7C00), // mul w0, w0, w1
                Opcode::Idiv => out.push(0x1AC1_0C00), // sdiv w0, w0, w1
                _ => unreachable!(),
            }
            push_x0(out);
        }
        Instruction::Arithmetic(_) => {
            diagnostics::warn_nop(instr, Isa::Arm64);
            nop(out);
        }
        Instruction::Return(Opcode::Ireturn) => {
            pop_into(W0, out);
        }
        Instruction::Return(Opcode::Return) => {}
        Instruction::Return(_) => {
            diagnostics::warn_nop(instr, Isa::Arm64);
            nop(out);
        }
        Instruction::Label(_) | Instruction::LineNumber(_) | Instruction::Frame => {}
        _ => {
            diagnostics::warn_nop(instr, Isa::Arm64);
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
    fn ends_with_ret_word() {
        let pool = empty_pool();
        let blob = generate(
            &[Instruction::PushInt(42), Instruction::Return(Opcode::Ireturn)],
            &pool,
        );
        let bytes = blob.as_bytes();
        let last4 = &bytes[bytes.len() - 4..];
        assert_eq!(u32::from_le_bytes(last4.try_into().unwrap()), 0xD65F_03C0);
    }

    #[test]
    fn materializes_negative_values_in_two_words() {
        let mut words = Vec::new();
        materialize_w(0, -1, &mut words);
        assert_eq!(words.len(), 2);
        // -1 as u32 is 0xFFFFFFFF: both halves 0xFFFF.
        assert_eq!(words[0], movz_w(0, 0xFFFF, 0));
        assert_eq!(words[1], movk_w(0, 0xFFFF, 1));
    }

    #[test]
    fn unsupported_opcode_emits_single_nop_word() {
        let pool = empty_pool();
        let blob = generate(&[Instruction::Simple(Opcode::Arraylength)], &pool);
        let bytes = blob.as_bytes();
        let body = &bytes[PROLOGUE.len() * 4..bytes.len() - EPILOGUE.len() * 4];
        assert_eq!(body.len(), 4);
        assert_eq!(u32::from_le_bytes(body.try_into().unwrap()), 0xD503_201F);
    }
}
