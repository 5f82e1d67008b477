use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::class::opcode::Opcode;
use crate::error::Error;

/// Opaque identifier for a synthetic [`Instruction::Label`], assigned once
/// per distinct branch-target byte offset encountered while decoding a
/// method's code array.
pub type LabelId = u32;

/// One decoded bytecode instruction, or one of the two synthetic
/// pseudo-instructions (spec.md §3):
///
/// - [`Instruction::Label`] is a transparent marker dropped in at every
///   branch target so later passes (dead-code elimination in particular)
///   always have something to stop at.
/// - [`Instruction::LineNumber`] and [`Instruction::Frame`] are metadata:
///   ignored by the code generator, but preserved across optimization and
///   the JIT round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `iconst_m1`…`iconst_5`, `bipush`, `sipush`: push this 32-bit value.
    /// These single-opcode immediate forms are collapsed to one variant at
    /// decode time since the original opcode is fully recoverable from the
    /// value (the encoder always picks the narrowest form).
    PushInt(i32),
    /// `ldc`/`ldc_w`/`ldc2_w` of a constant-pool entry, kept as a pool
    /// reference rather than resolved eagerly: the optimizer resolves it
    /// against the owning method's constant pool only when checking
    /// whether it folds, and non-integer constants (strings, floats,
    /// longs, doubles, classes) pass straight through untouched.
    LoadConst { opcode: Opcode, index: u16 },
    /// `iload`/`istore`/`lload`/... and their `_N` shorthand/`wide` forms,
    /// canonicalized to an explicit `(opcode, index)` pair. `opcode` is
    /// always one of the eight base forms (`Iload`, `Lload`, `Fload`,
    /// `Dload`, `Aload`, `Istore`, `Lstore`, `Fstore`, `Dstore`, `Astore`).
    Local { opcode: Opcode, index: u16 },
    /// `iinc`, including its `wide` form.
    Iinc { index: u16, delta: i32 },
    /// `iadd`…`drem`: pop two, operate, push one.
    Arithmetic(Opcode),
    /// `ireturn`…`return`.
    Return(Opcode),
    /// Any `invoke*` form; `index` is the constant-pool method reference.
    Invoke { opcode: Opcode, index: u16 },
    /// `getfield`/`putfield`/`getstatic`/`putstatic`.
    Field { opcode: Opcode, index: u16 },
    /// `new`/`anewarray`/`checkcast`/`instanceof`: a class-reference
    /// operand with no further behavior this crate models.
    TypeRef { opcode: Opcode, index: u16 },
    /// `newarray`.
    NewArray(u8),
    /// `multianewarray`.
    MultiANewArray { index: u16, dimensions: u8 },
    /// Any conditional/unconditional jump, including `jsr`. `target` names
    /// a [`Instruction::Label`] inserted elsewhere in the same method's
    /// instruction list.
    Branch { opcode: Opcode, target: LabelId },
    /// `ret` (return from a `jsr` subroutine via a local variable).
    Ret(u16),
    Tableswitch {
        default_target: LabelId,
        low: i32,
        high: i32,
        offsets: Vec<LabelId>,
    },
    Lookupswitch {
        default_target: LabelId,
        pairs: Vec<(i32, LabelId)>,
    },
    /// Every remaining no-operand opcode this crate does not otherwise
    /// model explicitly (`nop`, `pop`, `dup*`, `swap`, the `i2*`/`l2*`/…
    /// conversions, `lcmp`/`fcmp*`/`dcmp*`, `arraylength`, `athrow`,
    /// `monitorenter`/`monitorexit`, `aconst_null`).
    Simple(Opcode),
    /// Synthetic: a branch target. Never removed or crossed by
    /// [`crate::optimizer`]'s dead-code elimination pass.
    Label(LabelId),
    /// Synthetic: source line metadata, preserved but otherwise inert.
    LineNumber(u16),
    /// Synthetic: a `StackMapTable` frame, preserved but otherwise inert.
    Frame,
}

impl Instruction {
    /// The real opcode this instruction decodes from/encodes to, or
    /// `None` for the synthetic pseudo-instructions.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Self::PushInt(_) => None, // collapses several opcodes; see is_push_int_opcode
            Self::LoadConst { opcode, .. }
            | Self::Local { opcode, .. }
            | Self::Arithmetic(opcode)
            | Self::Return(opcode)
            | Self::Invoke { opcode, .. }
            | Self::Field { opcode, .. }
            | Self::TypeRef { opcode, .. }
            | Self::Branch { opcode, .. }
            | Self::Simple(opcode) => Some(*opcode),
            Self::Iinc { .. } => Some(Opcode::Iinc),
            Self::NewArray(_) => Some(Opcode::Newarray),
            Self::MultiANewArray { .. } => Some(Opcode::Multianewarray),
            Self::Ret(_) => Some(Opcode::Ret),
            Self::Tableswitch { .. } => Some(Opcode::Tableswitch),
            Self::Lookupswitch { .. } => Some(Opcode::Lookupswitch),
            Self::Label(_) | Self::LineNumber(_) | Self::Frame => None,
        }
    }

    /// Whether this is one of the synthetic pseudo-instructions that the
    /// analyzer's `instruction_count` excludes and dead-code elimination
    /// must never drop or cross.
    #[must_use]
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::LineNumber(_) | Self::Frame)
    }

    #[must_use]
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }

    /// If this instruction is a constant-push recognized by the optimizer's
    /// folding window (spec.md §4.3): either a direct immediate, or an
    /// `ldc` that resolves through `pool` to an integer.
    #[must_use]
    pub fn as_fold_operand(&self, pool: &super::ConstantPool) -> Option<i32> {
        match self {
            Self::PushInt(v) => Some(*v),
            Self::LoadConst { index, .. } => pool.resolve_integer(*index),
            _ => None,
        }
    }
}

/// Decode a method's raw `Code` attribute bytes into an instruction list.
///
/// Two passes: the first walks the bytecode once, recording each
/// instruction's raw form and, for branches/switches, the byte offset of
/// every jump target. The second pass rewrites branch offsets into
/// [`LabelId`]s and splices in a [`Instruction::Label`] at each target
/// address (spec.md §4.1: "instruction positions after them remain valid
/// for the optimizer").
pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, Error> {
    let mut cursor = Cursor::new(code);
    let mut raw: Vec<(usize, RawInstr)> = Vec::new();
    let mut targets: std::collections::BTreeSet<i64> = std::collections::BTreeSet::new();

    while (cursor.position() as usize) < code.len() {
        let start = cursor.position() as usize;
        let opcode_byte = read_u8(&mut cursor)?;
        let opcode = Opcode::try_from(opcode_byte)
            .map_err(|_| Error::MalformedClass(format!("unknown opcode 0x{opcode_byte:02x}")))?;

        let instr = decode_one(&mut cursor, opcode, start, code.len(), &mut targets)?;
        raw.push((start, instr));
    }

    // Map from byte offset -> label id, stable insertion order by offset.
    let mut label_of_offset: HashMap<i64, LabelId> = HashMap::new();
    for (id, offset) in targets.iter().enumerate() {
        label_of_offset.insert(*offset, id as LabelId);
    }

    let mut out = Vec::with_capacity(raw.len() + label_of_offset.len());
    for (offset, instr) in raw {
        if let Some(&label) = label_of_offset.get(&(offset as i64)) {
            out.push(Instruction::Label(label));
        }
        out.push(instr.into_instruction(&label_of_offset)?);
    }
    // A branch target past the last instruction (falling off the end of
    // the code array) still needs its Label so `Branch`/`Tableswitch`
    // operands resolve; append it at the tail.
    if let Some(&label) = label_of_offset.get(&(code.len() as i64)) {
        out.push(Instruction::Label(label));
    }

    Ok(out)
}

/// Instruction form still carrying raw byte-offset branch targets, before
/// they are rewritten to [`LabelId`]s.
enum RawInstr {
    Plain(Instruction),
    Branch { opcode: Opcode, target_offset: i64 },
    Tableswitch {
        default_offset: i64,
        low: i32,
        high: i32,
        offset_targets: Vec<i64>,
    },
    Lookupswitch {
        default_offset: i64,
        pairs: Vec<(i32, i64)>,
    },
}

impl RawInstr {
    fn into_instruction(self, labels: &HashMap<i64, LabelId>) -> Result<Instruction, Error> {
        let resolve = |offset: i64| -> Result<LabelId, Error> {
            labels
                .get(&offset)
                .copied()
                .ok_or(Error::InternalError("branch target has no label"))
        };
        Ok(match self {
            RawInstr::Plain(instr) => instr,
            RawInstr::Branch { opcode, target_offset } => Instruction::Branch {
                opcode,
                target: resolve(target_offset)?,
            },
            RawInstr::Tableswitch {
                default_offset,
                low,
                high,
                offset_targets,
            } => Instruction::Tableswitch {
                default_target: resolve(default_offset)?,
                low,
                high,
                offsets: offset_targets
                    .into_iter()
                    .map(resolve)
                    .collect::<Result<Vec<_>, _>>()?,
            },
            RawInstr::Lookupswitch { default_offset, pairs } => Instruction::Lookupswitch {
                default_target: resolve(default_offset)?,
                pairs: pairs
                    .into_iter()
                    .map(|(k, off)| resolve(off).map(|l| (k, l)))
                    .collect::<Result<Vec<_>, _>>()?,
            },
        })
    }
}

fn decode_one(
    cursor: &mut Cursor<&[u8]>,
    opcode: Opcode,
    start: usize,
    code_len: usize,
    targets: &mut std::collections::BTreeSet<i64>,
) -> Result<RawInstr, Error> {
    use Opcode::*;

    let mut record_branch = |delta: i64, targets: &mut std::collections::BTreeSet<i64>| {
        let target = start as i64 + delta;
        targets.insert(target);
        target
    };

    let instr = match opcode {
        IconstM1 => Instruction::PushInt(-1),
        Iconst0 => Instruction::PushInt(0),
        Iconst1 => Instruction::PushInt(1),
        Iconst2 => Instruction::PushInt(2),
        Iconst3 => Instruction::PushInt(3),
        Iconst4 => Instruction::PushInt(4),
        Iconst5 => Instruction::PushInt(5),
        Bipush => Instruction::PushInt(read_i8(cursor)? as i32),
        Sipush => Instruction::PushInt(read_i16(cursor)? as i32),
        Ldc => Instruction::LoadConst {
            opcode,
            index: read_u8(cursor)? as u16,
        },
        LdcW | Ldc2W => Instruction::LoadConst {
            opcode,
            index: read_u16(cursor)?,
        },
        Iload | Lload | Fload | Dload | Aload | Istore | Lstore | Fstore | Dstore | Astore => {
            Instruction::Local {
                opcode,
                index: read_u8(cursor)? as u16,
            }
        }
        Iload0 | Iload1 | Iload2 | Iload3 => Instruction::Local {
            opcode: Iload,
            index: (opcode as u8 - Iload0 as u8) as u16,
        },
        Lload0 | Lload1 | Lload2 | Lload3 => Instruction::Local {
            opcode: Lload,
            index: (opcode as u8 - Lload0 as u8) as u16,
        },
        Fload0 | Fload1 | Fload2 | Fload3 => Instruction::Local {
            opcode: Fload,
            index: (opcode as u8 - Fload0 as u8) as u16,
        },
        Dload0 | Dload1 | Dload2 | Dload3 => Instruction::Local {
            opcode: Dload,
            index: (opcode as u8 - Dload0 as u8) as u16,
        },
        Aload0 | Aload1 | Aload2 | Aload3 => Instruction::Local {
            opcode: Aload,
            index: (opcode as u8 - Aload0 as u8) as u16,
        },
        Istore0 | Istore1 | Istore2 | Istore3 => Instruction::Local {
            opcode: Istore,
            index: (opcode as u8 - Istore0 as u8) as u16,
        },
        Lstore0 | Lstore1 | Lstore2 | Lstore3 => Instruction::Local {
            opcode: Lstore,
            index: (opcode as u8 - Lstore0 as u8) as u16,
        },
        Fstore0 | Fstore1 | Fstore2 | Fstore3 => Instruction::Local {
            opcode: Fstore,
            index: (opcode as u8 - Fstore0 as u8) as u16,
        },
        Dstore0 | Dstore1 | Dstore2 | Dstore3 => Instruction::Local {
            opcode: Dstore,
            index: (opcode as u8 - Dstore0 as u8) as u16,
        },
        Astore0 | Astore1 | Astore2 | Astore3 => Instruction::Local {
            opcode: Astore,
            index: (opcode as u8 - Astore0 as u8) as u16,
        },
        Iinc => {
            let index = read_u8(cursor)? as u16;
            let delta = read_i8(cursor)? as i32;
            Instruction::Iinc { index, delta }
        }
        Wide => return decode_wide(cursor),
        Iadd | Ladd | Fadd | Dadd | Isub | Lsub | Fsub | Dsub | Imul | Lmul | Fmul | Dmul
        | Idiv | Ldiv | Fdiv | Ddiv | Irem | Lrem | Frem | Drem => Instruction::Arithmetic(opcode),
        Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => Instruction::Return(opcode),
        Invokevirtual | Invokespecial | Invokestatic => Instruction::Invoke {
            opcode,
            index: read_u16(cursor)?,
        },
        Invokeinterface => {
            let index = read_u16(cursor)?;
            let _count = read_u8(cursor)?;
            let _zero = read_u8(cursor)?;
            Instruction::Invoke { opcode, index }
        }
        Invokedynamic => {
            let index = read_u16(cursor)?;
            let _zero = read_u16(cursor)?;
            Instruction::Invoke { opcode, index }
        }
        Getfield | Putfield | Getstatic | Putstatic => Instruction::Field {
            opcode,
            index: read_u16(cursor)?,
        },
        New | Anewarray | Checkcast | Instanceof => Instruction::TypeRef {
            opcode,
            index: read_u16(cursor)?,
        },
        Newarray => Instruction::NewArray(read_u8(cursor)?),
        Multianewarray => {
            let index = read_u16(cursor)?;
            let dimensions = read_u8(cursor)?;
            Instruction::MultiANewArray { index, dimensions }
        }
        Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge
        | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne | Ifnull | Ifnonnull => {
            let delta = read_i16(cursor)? as i64;
            let target_offset = record_branch(delta, targets);
            return Ok(RawInstr::Branch { opcode, target_offset });
        }
        Goto | Jsr => {
            let delta = read_i16(cursor)? as i64;
            let target_offset = record_branch(delta, targets);
            return Ok(RawInstr::Branch { opcode, target_offset });
        }
        GotoW | JsrW => {
            let delta = read_i32(cursor)? as i64;
            let target_offset = record_branch(delta, targets);
            return Ok(RawInstr::Branch { opcode, target_offset });
        }
        Ret => Instruction::Ret(read_u8(cursor)? as u16),
        Tableswitch => return decode_tableswitch(cursor, start, targets),
        Lookupswitch => return decode_lookupswitch(cursor, start, targets),
        Nop | AconstNull | Iaload | Laload | Faload | Daload | Aaload | Baload | Caload
        | Saload | Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore
        | Sastore | Pop | Pop2 | Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap | Ineg
        | Lneg | Fneg | Dneg | Ishl | Lshl | Ishr | Lshr | Iushr | Lushr | Iand | Land | Ior
        | Lor | Ixor | Lxor | I2l | I2f | I2d | L2i | L2f | L2d | F2i | F2l | F2d | D2i | D2l
        | D2f | I2b | I2c | I2s | Lcmp | Fcmpl | Fcmpg | Dcmpl | Dcmpg | Arraylength | Athrow
        | Monitorenter | Monitorexit => Instruction::Simple(opcode),
        Breakpoint | Impdep1 | Impdep2 => {
            return Err(Error::MalformedClass(format!(
                "reserved opcode {opcode:?} must not appear in compiled code"
            )))
        }
    };
    let _ = code_len;
    Ok(RawInstr::Plain(instr))
}

/// `wide` prefixes either an `iinc` (u16 index, i16 delta) or a
/// load/store opcode (u16 index instead of u8).
fn decode_wide(cursor: &mut Cursor<&[u8]>) -> Result<RawInstr, Error> {
    let opcode_byte = read_u8(cursor)?;
    let opcode = Opcode::try_from(opcode_byte)
        .map_err(|_| Error::MalformedClass(format!("unknown wide opcode 0x{opcode_byte:02x}")))?;
    let instr = if opcode == Opcode::Iinc {
        let index = read_u16(cursor)?;
        let delta = read_i16(cursor)? as i32;
        Instruction::Iinc { index, delta }
    } else {
        let index = read_u16(cursor)?;
        Instruction::Local { opcode, index }
    };
    Ok(RawInstr::Plain(instr))
}

fn decode_tableswitch(
    cursor: &mut Cursor<&[u8]>,
    start: usize,
    targets: &mut std::collections::BTreeSet<i64>,
) -> Result<RawInstr, Error> {
    align_to_4(cursor, start)?;
    let default_delta = read_i32(cursor)? as i64;
    let low = read_i32(cursor)?;
    let high = read_i32(cursor)?;
    if high < low {
        return Err(Error::MalformedClass("tableswitch high < low".into()));
    }
    let count = (high - low + 1) as usize;
    let default_offset = start as i64 + default_delta;
    targets.insert(default_offset);
    let mut offset_targets = Vec::with_capacity(count);
    for _ in 0..count {
        let delta = read_i32(cursor)? as i64;
        let offset = start as i64 + delta;
        targets.insert(offset);
        offset_targets.push(offset);
    }
    Ok(RawInstr::Tableswitch {
        default_offset,
        low,
        high,
        offset_targets,
    })
}

fn decode_lookupswitch(
    cursor: &mut Cursor<&[u8]>,
    start: usize,
    targets: &mut std::collections::BTreeSet<i64>,
) -> Result<RawInstr, Error> {
    align_to_4(cursor, start)?;
    let default_delta = read_i32(cursor)? as i64;
    let npairs = read_i32(cursor)?;
    if npairs < 0 {
        return Err(Error::MalformedClass("lookupswitch npairs < 0".into()));
    }
    let default_offset = start as i64 + default_delta;
    targets.insert(default_offset);
    let mut pairs = Vec::with_capacity(npairs as usize);
    for _ in 0..npairs {
        let key = read_i32(cursor)?;
        let delta = read_i32(cursor)? as i64;
        let offset = start as i64 + delta;
        targets.insert(offset);
        pairs.push((key, offset));
    }
    Ok(RawInstr::Lookupswitch { default_offset, pairs })
}

/// Pad `cursor` with zero-byte reads until its position is a multiple of 4
/// bytes from `instruction_start`. `tableswitch`/`lookupswitch` align
/// their operands to a 4-byte boundary measured from the start of the
/// method's code array, which `instruction_start` already is relative to.
fn align_to_4(cursor: &mut Cursor<&[u8]>, instruction_start: usize) -> Result<(), Error> {
    let opcode_end = instruction_start + 1;
    let padding = (4 - (opcode_end % 4)) % 4;
    for _ in 0..padding {
        read_u8(cursor)?;
    }
    Ok(())
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    cursor
        .read_u8()
        .map_err(|e| Error::MalformedClass(format!("truncated instruction stream: {e}")))
}

fn read_i8(cursor: &mut Cursor<&[u8]>) -> Result<i8, Error> {
    cursor
        .read_i8()
        .map_err(|e| Error::MalformedClass(format!("truncated instruction stream: {e}")))
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, Error> {
    cursor
        .read_u16::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("truncated instruction stream: {e}")))
}

fn read_i16(cursor: &mut Cursor<&[u8]>) -> Result<i16, Error> {
    cursor
        .read_i16::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("truncated instruction stream: {e}")))
}

fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32, Error> {
    cursor
        .read_i32::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("truncated instruction stream: {e}")))
}

/// Re-encode a decoded instruction list back into `Code` attribute bytes,
/// for the JIT round-trip path. Labels are resolved to concrete deltas in a
/// single forward pass: since optimization only ever shrinks a method (see
/// [`crate::optimizer`]), branch deltas that fit in `i16` before a rewrite
/// keep fitting afterward, so `if*`/`goto`/`jsr` are always re-emitted in
/// their short form. `goto_w`/`jsr_w` are preserved as wide only when the
/// source instruction already was one.
pub fn encode_instructions(instrs: &[Instruction]) -> Result<Vec<u8>, Error> {
    // Pass 1: compute each real instruction's byte offset and the offset of
    // every Label.
    let mut offsets = Vec::with_capacity(instrs.len());
    let mut label_offset: HashMap<LabelId, i64> = HashMap::new();
    let mut pos: i64 = 0;
    for instr in instrs {
        offsets.push(pos);
        match instr {
            Instruction::Label(id) => {
                label_offset.insert(*id, pos);
            }
            _ => {
                pos += encoded_size(instr, pos)? as i64;
            }
        }
    }
    let end_offset = pos;

    // Pass 2: emit.
    let mut out = Vec::with_capacity(end_offset.max(0) as usize);
    for (instr, &start) in instrs.iter().zip(offsets.iter()) {
        encode_one(instr, start, &label_offset, end_offset, &mut out)?;
    }
    Ok(out)
}

/// Resolve a label to its byte offset. A label with no matching
/// [`Instruction::Label`] in the instruction list falls off the end of the
/// method (the decoder appends a trailing label for exactly this case), so
/// it resolves to `end_offset`.
fn resolve_label(
    id: LabelId,
    label_offset: &HashMap<LabelId, i64>,
    end_offset: i64,
) -> Result<i64, Error> {
    Ok(label_offset.get(&id).copied().unwrap_or(end_offset))
}

fn encoded_size(instr: &Instruction, pos: i64) -> Result<usize, Error> {
    Ok(match instr {
        Instruction::PushInt(v) => match *v {
            -1..=5 => 1,
            -128..=127 => 2,
            -32768..=32767 => 3,
            // Unreachable via decode_instructions or the optimizer, which
            // only ever produce PushInt within sipush range; encode_one
            // rejects anything wider, so the size here is never read.
            _ => 3,
        },
        Instruction::LoadConst { opcode, .. } => {
            if matches!(opcode, Opcode::Ldc) {
                2
            } else {
                3
            }
        }
        Instruction::Local { index, .. } => {
            if *index <= 3 {
                1
            } else if *index <= 255 {
                2
            } else {
                4 // wide prefix + opcode + u16 index
            }
        }
        Instruction::Iinc { index, delta } => {
            if *index <= 255 && (-128..=127).contains(delta) {
                3
            } else {
                6 // wide prefix + opcode + u16 index + i16 delta
            }
        }
        Instruction::Arithmetic(_) | Instruction::Return(_) | Instruction::Simple(_) => 1,
        Instruction::Invoke { opcode, .. } => match opcode {
            Opcode::Invokeinterface => 5,
            Opcode::Invokedynamic => 5,
            _ => 3,
        },
        Instruction::Field { .. } | Instruction::TypeRef { .. } => 3,
        Instruction::NewArray(_) => 2,
        Instruction::MultiANewArray { .. } => 4,
        Instruction::Branch { opcode, .. } => match opcode {
            Opcode::GotoW | Opcode::JsrW => 5,
            _ => 3,
        },
        Instruction::Ret(_) => 2,
        Instruction::Tableswitch { low, high, .. } => {
            let pad = (4 - ((pos as usize + 1) % 4)) % 4;
            let count = (*high - *low + 1).max(0) as usize;
            1 + pad + 12 + count * 4
        }
        Instruction::Lookupswitch { pairs, .. } => {
            let pad = (4 - ((pos as usize + 1) % 4)) % 4;
            1 + pad + 8 + pairs.len() * 8
        }
        Instruction::Label(_) | Instruction::LineNumber(_) | Instruction::Frame => 0,
    })
}

fn encode_one(
    instr: &Instruction,
    start: i64,
    label_offset: &HashMap<LabelId, i64>,
    end_offset: i64,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    use Opcode::*;
    match instr {
        Instruction::PushInt(v) => match *v {
            -1 => out.push(IconstM1 as u8),
            0 => out.push(Iconst0 as u8),
            1 => out.push(Iconst1 as u8),
            2 => out.push(Iconst2 as u8),
            3 => out.push(Iconst3 as u8),
            4 => out.push(Iconst4 as u8),
            5 => out.push(Iconst5 as u8),
            -128..=127 => {
                out.push(Bipush as u8);
                out.push(*v as i8 as u8);
            }
            -32768..=32767 => {
                out.push(Sipush as u8);
                out.extend_from_slice(&(*v as i16).to_be_bytes());
            }
            _ => return Err(Error::InternalError("PushInt value out of sipush range")),
        },
        Instruction::LoadConst { opcode, index } => {
            out.push(*opcode as u8);
            if matches!(opcode, Ldc) {
                out.push(*index as u8);
            } else {
                out.extend_from_slice(&index.to_be_bytes());
            }
        }
        Instruction::Local { opcode, index } => {
            encode_local(*opcode, *index, out);
        }
        Instruction::Iinc { index, delta } => {
            if *index <= 255 && (-128..=127).contains(delta) {
                out.push(Iinc as u8);
                out.push(*index as u8);
                out.push(*delta as i8 as u8);
            } else {
                out.push(Wide as u8);
                out.push(Iinc as u8);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&(*delta as i16).to_be_bytes());
            }
        }
        Instruction::Arithmetic(opcode) | Instruction::Return(opcode) | Instruction::Simple(opcode) => {
            out.push(*opcode as u8);
        }
        Instruction::Invoke { opcode, index } => {
            out.push(*opcode as u8);
            out.extend_from_slice(&index.to_be_bytes());
            match opcode {
                Invokeinterface => {
                    out.push(1); // argument count placeholder; not tracked post-decode
                    out.push(0);
                }
                Invokedynamic => out.extend_from_slice(&[0, 0]),
                _ => {}
            }
        }
        Instruction::Field { opcode, index } | Instruction::TypeRef { opcode, index } => {
            out.push(*opcode as u8);
            out.extend_from_slice(&index.to_be_bytes());
        }
        Instruction::NewArray(atype) => {
            out.push(Newarray as u8);
            out.push(*atype);
        }
        Instruction::MultiANewArray { index, dimensions } => {
            out.push(Multianewarray as u8);
            out.extend_from_slice(&index.to_be_bytes());
            out.push(*dimensions);
        }
        Instruction::Branch { opcode, target } => {
            let target_offset = resolve_label(*target, label_offset, end_offset)?;
            let delta = target_offset - start;
            out.push(*opcode as u8);
            match opcode {
                GotoW | JsrW => out.extend_from_slice(&(delta as i32).to_be_bytes()),
                _ => {
                    let delta16 = i16::try_from(delta)
                        .map_err(|_| Error::InternalError("branch delta exceeds i16 range"))?;
                    out.extend_from_slice(&delta16.to_be_bytes());
                }
            }
        }
        Instruction::Ret(index) => {
            out.push(Ret as u8);
            out.push(*index as u8);
        }
        Instruction::Tableswitch {
            default_target,
            low,
            high,
            offsets,
        } => {
            out.push(Tableswitch as u8);
            let pad = (4 - ((start as usize + 1) % 4)) % 4;
            out.extend(std::iter::repeat(0u8).take(pad));
            let default_offset = resolve_label(*default_target, label_offset, end_offset)?;
            out.extend_from_slice(&((default_offset - start) as i32).to_be_bytes());
            out.extend_from_slice(&low.to_be_bytes());
            out.extend_from_slice(&high.to_be_bytes());
            for &id in offsets {
                let off = resolve_label(id, label_offset, end_offset)?;
                out.extend_from_slice(&((off - start) as i32).to_be_bytes());
            }
        }
        Instruction::Lookupswitch { default_target, pairs } => {
            out.push(Lookupswitch as u8);
            let pad = (4 - ((start as usize + 1) % 4)) % 4;
            out.extend(std::iter::repeat(0u8).take(pad));
            let default_offset = resolve_label(*default_target, label_offset, end_offset)?;
            out.extend_from_slice(&((default_offset - start) as i32).to_be_bytes());
            out.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
            for (key, id) in pairs {
                let off = resolve_label(*id, label_offset, end_offset)?;
                out.extend_from_slice(&key.to_be_bytes());
                out.extend_from_slice(&((off - start) as i32).to_be_bytes());
            }
        }
        Instruction::Label(_) | Instruction::LineNumber(_) | Instruction::Frame => {}
    }
    Ok(())
}

fn encode_local(opcode: Opcode, index: u16, out: &mut Vec<u8>) {
    use Opcode::*;
    if index <= 3 {
        let base = match opcode {
            Iload => Iload0, Lload => Lload0, Fload => Fload0, Dload => Dload0, Aload => Aload0,
            Istore => Istore0, Lstore => Lstore0, Fstore => Fstore0, Dstore => Dstore0,
            Astore => Astore0,
            other => other,
        };
        out.push((base as u8) + index as u8);
    } else if index <= 255 {
        out.push(opcode as u8);
        out.push(index as u8);
    } else {
        out.push(Wide as u8);
        out.push(opcode as u8);
        out.extend_from_slice(&index.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_return_42() -> Vec<u8> {
        vec![Opcode::Bipush as u8, 42, Opcode::Ireturn as u8]
    }

    #[test]
    fn decodes_bipush_and_return() {
        let code = build_return_42();
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instruction::PushInt(42),
                Instruction::Return(Opcode::Ireturn),
            ]
        );
    }

    #[test]
    fn round_trips_a_forward_goto() {
        // goto +3; nop; nop; iconst_0; ireturn  (goto skips the two nops)
        let code = vec![
            Opcode::Goto as u8, 0, 4,
            Opcode::Nop as u8,
            Opcode::Nop as u8,
            Opcode::Iconst0 as u8,
            Opcode::Ireturn as u8,
        ];
        let instrs = decode_instructions(&code).unwrap();
        assert!(instrs.iter().any(Instruction::is_label));
        let reencoded = encode_instructions(&instrs).unwrap();
        assert_eq!(reencoded, code);
    }

    #[test]
    fn decodes_wide_iload() {
        let code = vec![Opcode::Wide as u8, Opcode::Iload as u8, 1, 44];
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(
            instrs,
            vec![Instruction::Local { opcode: Opcode::Iload, index: 300 }]
        );
    }
}
