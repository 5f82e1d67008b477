//! The bytecode optimizer (C3): constant folding, then dead-code
//! elimination, applied in that order over an in-memory instruction list.

use crate::class::{ConstantPool, Instruction, Opcode};

/// Run both optimization passes in place: constant folding first, then
/// dead-code elimination (spec.md §4.3). `pool` resolves `ldc` operands
/// that fold's sliding window needs to inspect.
pub fn optimize(instructions: &mut Vec<Instruction>, pool: &mut ConstantPool) {
    fold_constants(instructions, pool);
    eliminate_dead_code(instructions);
}

/// Scan with a sliding window of three instructions `(a, b, c)`. When `a`
/// and `b` are integer constant pushes and `c` is `iadd`, replace all three
/// with a single `ldc` of the 32-bit wrapped sum. The scan advances by one
/// after a replacement so chained folds (`1+2+3` → `3+3` → `6`) still fire.
fn fold_constants(instructions: &mut Vec<Instruction>, pool: &mut ConstantPool) {
    let mut i = 0;
    while i + 2 < instructions.len() {
        let a = instructions[i].as_fold_operand(pool);
        let b = instructions[i + 1].as_fold_operand(pool);
        let is_add = matches!(instructions[i + 2], Instruction::Arithmetic(Opcode::Iadd));

        if let (Some(a), Some(b), true) = (a, b, is_add) {
            let sum = a.wrapping_add(b);
            let index = pool.push_integer(sum);
            let folded = Instruction::LoadConst { opcode: Opcode::LdcW, index };
            instructions.splice(i..i + 3, std::iter::once(folded));
            // Stay at `i`: the freshly folded value may combine with its
            // new neighbor on the next iteration.
        } else {
            i += 1;
        }
    }
}

/// For every return instruction, drop all non-metadata successors up to
/// but not including the next `Label`. Metadata (`LineNumber`, `Frame`)
/// between the return and the next label survives; if no label follows,
/// everything after the return is dropped.
fn eliminate_dead_code(instructions: &mut Vec<Instruction>) {
    let mut out = Vec::with_capacity(instructions.len());
    let mut i = 0;
    while i < instructions.len() {
        let instr = instructions[i].clone();
        let is_return = matches!(instr, Instruction::Return(_));
        out.push(instr);
        i += 1;
        if is_return {
            while i < instructions.len() {
                if instructions[i].is_label() {
                    break;
                }
                if instructions[i].is_metadata() {
                    out.push(instructions[i].clone());
                }
                i += 1;
            }
        }
    }
    *instructions = out;
}
