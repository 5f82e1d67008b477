use std::ops::Index;

use byteorder::{BigEndian, ReadBytesExt};
use num_enum::TryFromPrimitive;

use crate::error::Error;

/// `constant_pool_info.tag` values, per the class-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    Fieldref = 9,
    Methodref = 10,
    InterfaceMethodref = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
}

/// One decoded constant-pool entry.
///
/// `Long` and `Double` entries occupy two consecutive constant-pool slots
/// (the entry after them is unusable), a quirk of the original format that
/// [`ConstantPool::parse`] preserves by inserting a [`ConstantPoolEntry::Unusable`]
/// placeholder at the following index, so indices elsewhere in the class
/// file keep pointing at the right entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantPoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { utf8_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    /// Entries this crate does not need to interpret (method handles,
    /// dynamic call sites, modules, packages, …); preserved verbatim as
    /// `(tag, raw bytes)` so the JIT round-trip can re-encode them
    /// byte-for-byte without understanding their contents.
    Opaque { tag: u8, raw: Vec<u8> },
    /// The slot following a `Long`/`Double` entry; not independently
    /// addressable.
    Unusable,
}

impl ConstantPoolEntry {
    /// If this entry is an integer constant (directly, not via
    /// `ldc`-to-a-float or similar), its value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// The class-file constant pool: a 1-indexed table of
/// [`ConstantPoolEntry`] (index 0 is unused, per the format).
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolEntry>,
}

impl ConstantPool {
    pub(crate) fn parse(cursor: &mut std::io::Cursor<&[u8]>) -> Result<Self, Error> {
        let count = cursor
            .read_u16::<BigEndian>()
            .map_err(|e| Error::MalformedClass(format!("constant_pool_count: {e}")))?;
        if count == 0 {
            return Err(Error::MalformedClass(
                "constant_pool_count must be >= 1".into(),
            ));
        }

        // Index 0 is unused; reserve it so `entries[index]` lines up with
        // the 1-based indices the class file uses.
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(ConstantPoolEntry::Unusable);

        let mut i = 1u16;
        while i < count {
            let tag_byte = cursor
                .read_u8()
                .map_err(|e| Error::MalformedClass(format!("constant tag: {e}")))?;
            let tag = ConstantTag::try_from(tag_byte)
                .map_err(|_| Error::UnsupportedConstant(tag_byte))?;

            let entry = match tag {
                ConstantTag::Utf8 => {
                    let len = cursor
                        .read_u16::<BigEndian>()
                        .map_err(|e| Error::MalformedClass(format!("utf8 length: {e}")))?;
                    let mut buf = vec![0u8; len as usize];
                    std::io::Read::read_exact(cursor, &mut buf)
                        .map_err(|e| Error::MalformedClass(format!("utf8 bytes: {e}")))?;
                    // The class-file format uses a "modified UTF-8" encoding
                    // that agrees with plain UTF-8 for every codepoint used
                    // by the identifiers and descriptors this crate reads.
                    let s = String::from_utf8(buf)
                        .map_err(|e| Error::MalformedClass(format!("utf8 content: {e}")))?;
                    ConstantPoolEntry::Utf8(s)
                }
                ConstantTag::Integer => ConstantPoolEntry::Integer(
                    cursor
                        .read_i32::<BigEndian>()
                        .map_err(|e| Error::MalformedClass(format!("integer: {e}")))?,
                ),
                ConstantTag::Float => ConstantPoolEntry::Float(
                    cursor
                        .read_f32::<BigEndian>()
                        .map_err(|e| Error::MalformedClass(format!("float: {e}")))?,
                ),
                ConstantTag::Long => ConstantPoolEntry::Long(
                    cursor
                        .read_i64::<BigEndian>()
                        .map_err(|e| Error::MalformedClass(format!("long: {e}")))?,
                ),
                ConstantTag::Double => ConstantPoolEntry::Double(
                    cursor
                        .read_f64::<BigEndian>()
                        .map_err(|e| Error::MalformedClass(format!("double: {e}")))?,
                ),
                ConstantTag::Class => ConstantPoolEntry::Class {
                    name_index: read_u16(cursor)?,
                },
                ConstantTag::String => ConstantPoolEntry::String {
                    utf8_index: read_u16(cursor)?,
                },
                ConstantTag::Fieldref => ConstantPoolEntry::Fieldref {
                    class_index: read_u16(cursor)?,
                    name_and_type_index: read_u16(cursor)?,
                },
                ConstantTag::Methodref => ConstantPoolEntry::Methodref {
                    class_index: read_u16(cursor)?,
                    name_and_type_index: read_u16(cursor)?,
                },
                ConstantTag::InterfaceMethodref => ConstantPoolEntry::InterfaceMethodref {
                    class_index: read_u16(cursor)?,
                    name_and_type_index: read_u16(cursor)?,
                },
                ConstantTag::NameAndType => ConstantPoolEntry::NameAndType {
                    name_index: read_u16(cursor)?,
                    descriptor_index: read_u16(cursor)?,
                },
                ConstantTag::MethodHandle => ConstantPoolEntry::Opaque {
                    tag: tag_byte,
                    raw: read_exact_n(cursor, 3)?,
                },
                ConstantTag::MethodType => ConstantPoolEntry::Opaque {
                    tag: tag_byte,
                    raw: read_exact_n(cursor, 2)?,
                },
                ConstantTag::Dynamic | ConstantTag::InvokeDynamic => ConstantPoolEntry::Opaque {
                    tag: tag_byte,
                    raw: read_exact_n(cursor, 4)?,
                },
                ConstantTag::Module | ConstantTag::Package => ConstantPoolEntry::Opaque {
                    tag: tag_byte,
                    raw: read_exact_n(cursor, 2)?,
                },
            };

            let occupies_two_slots = matches!(
                entry,
                ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_)
            );
            entries.push(entry);
            i += 1;
            if occupies_two_slots {
                entries.push(ConstantPoolEntry::Unusable);
                i += 1;
            }
        }

        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, index: u16) -> Option<&ConstantPoolEntry> {
        self.entries.get(index as usize)
    }

    /// Resolve an `ldc`/`ldc_w` target to the 32-bit integer it pushes, if
    /// it is in fact an integer constant.
    #[must_use]
    pub fn resolve_integer(&self, index: u16) -> Option<i32> {
        self.get(index).and_then(ConstantPoolEntry::as_integer)
    }

    #[must_use]
    pub fn resolve_utf8(&self, index: u16) -> Option<&str> {
        self.get(index).and_then(ConstantPoolEntry::as_utf8)
    }

    /// Append an integer constant, returning its index. Used by
    /// [`crate::optimizer`]'s constant folding to materialize the folded
    /// sum as a fresh `ldc` target, and by `compile_expression`'s
    /// synthetic single-method class.
    pub(crate) fn push_integer(&mut self, value: i32) -> u16 {
        self.entries.push(ConstantPoolEntry::Integer(value));
        (self.entries.len() - 1) as u16
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ConstantPoolEntry> {
        self.entries.iter()
    }
}

impl Index<u16> for ConstantPool {
    type Output = ConstantPoolEntry;

    fn index(&self, index: u16) -> &Self::Output {
        &self.entries[index as usize]
    }
}

fn read_u16(cursor: &mut std::io::Cursor<&[u8]>) -> Result<u16, Error> {
    cursor
        .read_u16::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("constant pool field: {e}")))
}

fn read_exact_n(cursor: &mut std::io::Cursor<&[u8]>, n: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; n];
    std::io::Read::read_exact(cursor, &mut buf)
        .map_err(|e| Error::MalformedClass(format!("constant pool field: {e}")))?;
    Ok(buf)
}

#[test]
fn long_and_double_reserve_the_following_slot() {
    // constant_pool_count=3: #1 Long, #2 unusable, header only.
    let mut bytes = vec![0u8, 3];
    bytes.push(ConstantTag::Long as u8);
    bytes.extend_from_slice(&42i64.to_be_bytes());
    let mut cursor = std::io::Cursor::new(bytes.as_slice());
    let pool = ConstantPool::parse(&mut cursor).unwrap();
    assert_eq!(pool.get(1), Some(&ConstantPoolEntry::Long(42)));
    assert_eq!(pool.get(2), Some(&ConstantPoolEntry::Unusable));
}
