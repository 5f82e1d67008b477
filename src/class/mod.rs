//! The class reader (C1): parses a JVM-format `.class` file into a [`Class`]
//! and re-encodes one back into class-file bytes for the JIT round-trip.

mod access_flags;
mod constant_pool;
mod descriptor;
mod instruction;
mod opcode;
mod reader;
mod encoder;

pub use access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
pub use constant_pool::{ConstantPool, ConstantPoolEntry, ConstantTag};
pub use descriptor::{return_kind, ReturnKind};
pub use instruction::{decode_instructions, encode_instructions, Instruction, LabelId};
pub use opcode::Opcode;

use crate::error::Error;

/// A parsed `.class` file.
///
/// Attributes this crate does not interpret (anything but `Code` on a
/// method) are preserved verbatim as `(name_index, bytes)` pairs so that
/// [`Class::encode`] reproduces them byte-for-byte.
#[derive(Debug, Clone)]
pub struct Class {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// A generic `attribute_info`, with `Code` decoded structurally and
/// everything else preserved opaquely.
#[derive(Debug, Clone)]
pub enum Attribute {
    Code(CodeAttribute),
    Other { name_index: u16, info: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    /// The constant-pool index of the UTF-8 string `"Code"` this attribute
    /// was originally tagged with, kept so [`Class::encode`] can re-emit
    /// the attribute header without re-resolving it against the pool.
    pub(crate) name_index_hint: u16,
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Attributes nested inside `Code` (`LineNumberTable`, `StackMapTable`,
    /// …), preserved opaquely as raw `(name_index, bytes)` pairs and
    /// re-emitted unchanged by [`Class::encode`]. This crate never
    /// interprets their contents; [`Instruction::LineNumber`]/
    /// [`Instruction::Frame`] exist in the data model for callers that
    /// build or rewrite an instruction list by hand (the optimizer's
    /// dead-code-elimination tests in particular) and must still preserve
    /// metadata nodes interleaved with real instructions, but the reader
    /// itself never produces them from a decoded `Code` attribute.
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl Class {
    /// Parse a `.class` file's bytes into a [`Class`].
    pub fn parse(bytes: &[u8]) -> Result<Class, Error> {
        let mut class = reader::parse(bytes)?;
        reader::resolve_code_attributes(&mut class)?;
        Ok(class)
    }

    /// Re-encode this class back into `.class` file bytes, used by the JIT
    /// round-trip (`jit_rewrite`). Byte-exact for any attribute this crate
    /// did not structurally interpret.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encoder::encode(self)
    }

    /// The class's own name, resolved through the constant pool (e.g.
    /// `"com/example/Adder"`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        let class_entry = self.constant_pool.get(self.this_class)?;
        let ConstantPoolEntry::Class { name_index } = class_entry else {
            return None;
        };
        self.constant_pool.resolve_utf8(*name_index)
    }

    /// Find a method by name and descriptor.
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods.iter().find(|m| {
            self.constant_pool.resolve_utf8(m.name_index) == Some(name)
                && self.constant_pool.resolve_utf8(m.descriptor_index) == Some(descriptor)
        })
    }
}

impl Method {
    #[must_use]
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Option<&'a str> {
        pool.resolve_utf8(self.name_index)
    }

    #[must_use]
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Option<&'a str> {
        pool.resolve_utf8(self.descriptor_index)
    }

    #[must_use]
    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::Code(code) => Some(code),
            Attribute::Other { .. } => None,
        })
    }

    #[must_use]
    pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
        self.attributes.iter_mut().find_map(|attr| match attr {
            Attribute::Code(code) => Some(code),
            Attribute::Other { .. } => None,
        })
    }
}

/// Convert a dotted binary class name (`java.lang.Object`, as used by class
/// loaders and this crate's `compile_method_native` selector) to the
/// slashed internal form the constant pool stores (`java/lang/Object`).
#[must_use]
pub fn dotted_to_slashed(name: &str) -> String {
    name.replace('.', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_to_slashed_replaces_dots() {
        assert_eq!(dotted_to_slashed("com.example.Adder"), "com/example/Adder");
        assert_eq!(dotted_to_slashed("Adder"), "Adder");
    }
}
