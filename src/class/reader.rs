use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::Error;

use super::{
    Attribute, Class, ClassAccessFlags, CodeAttribute, ConstantPool, ExceptionTableEntry, Field,
    FieldAccessFlags, Method, MethodAccessFlags,
};

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

pub(super) fn parse(bytes: &[u8]) -> Result<Class, Error> {
    let mut cursor = Cursor::new(bytes);

    let magic = read_u32(&mut cursor, "magic")?;
    if magic != CLASS_MAGIC {
        return Err(Error::MalformedClass(format!(
            "bad magic: expected 0x{CLASS_MAGIC:08x}, got 0x{magic:08x}"
        )));
    }
    let minor_version = read_u16(&mut cursor, "minor_version")?;
    let major_version = read_u16(&mut cursor, "major_version")?;

    let constant_pool = ConstantPool::parse(&mut cursor)?;

    let access_flags =
        ClassAccessFlags::from_bits_truncate(read_u16(&mut cursor, "access_flags")?);
    let this_class = read_u16(&mut cursor, "this_class")?;
    let super_class = read_u16(&mut cursor, "super_class")?;

    let interfaces_count = read_u16(&mut cursor, "interfaces_count")?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(read_u16(&mut cursor, "interface")?);
    }

    let fields_count = read_u16(&mut cursor, "fields_count")?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(parse_field(&mut cursor)?);
    }

    let methods_count = read_u16(&mut cursor, "methods_count")?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(parse_method(&mut cursor)?);
    }

    let attributes_count = read_u16(&mut cursor, "attributes_count")?;
    let mut attributes = Vec::with_capacity(attributes_count as usize);
    for _ in 0..attributes_count {
        attributes.push(parse_attribute(&mut cursor)?);
    }

    Ok(Class {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_field(cursor: &mut Cursor<&[u8]>) -> Result<Field, Error> {
    let access_flags = FieldAccessFlags::from_bits_truncate(read_u16(cursor, "field access_flags")?);
    let name_index = read_u16(cursor, "field name_index")?;
    let descriptor_index = read_u16(cursor, "field descriptor_index")?;
    let attributes_count = read_u16(cursor, "field attributes_count")?;
    let mut attributes = Vec::with_capacity(attributes_count as usize);
    for _ in 0..attributes_count {
        attributes.push(parse_attribute(cursor)?);
    }
    Ok(Field {
        access_flags,
        name_index,
        descriptor_index,
        attributes,
    })
}

fn parse_method(cursor: &mut Cursor<&[u8]>) -> Result<Method, Error> {
    let access_flags = MethodAccessFlags::from_bits_truncate(read_u16(cursor, "method access_flags")?);
    let name_index = read_u16(cursor, "method name_index")?;
    let descriptor_index = read_u16(cursor, "method descriptor_index")?;
    let attributes_count = read_u16(cursor, "method attributes_count")?;
    let mut attributes = Vec::with_capacity(attributes_count as usize);
    for _ in 0..attributes_count {
        attributes.push(parse_attribute(cursor)?);
    }
    Ok(Method {
        access_flags,
        name_index,
        descriptor_index,
        attributes,
    })
}

/// Every attribute this crate doesn't otherwise understand is carried
/// through as raw bytes, keyed by its `name_index`. The reader has no
/// access to the owning class's constant pool here to compare against the
/// literal string `"Code"`, so every attribute is read structurally-opaque
/// first; [`resolve_code_attributes`] re-tags the ones actually named
/// `"Code"` once the pool is available.
fn parse_attribute(cursor: &mut Cursor<&[u8]>) -> Result<Attribute, Error> {
    let name_index = read_u16(cursor, "attribute name_index")?;
    let length = read_u32(cursor, "attribute length")?;
    let mut info = vec![0u8; length as usize];
    cursor
        .read_exact(&mut info)
        .map_err(|e| Error::MalformedClass(format!("attribute info: {e}")))?;
    Ok(Attribute::Other { name_index, info })
}

/// Re-parse `Class`'s `Other` attributes that are actually `Code`, now that
/// the constant pool is available to resolve `name_index` against the
/// literal `"Code"`. Called once, immediately after [`parse`] builds the
/// full class.
pub(super) fn resolve_code_attributes(class: &mut Class) -> Result<(), Error> {
    for method in &mut class.methods {
        for attr in &mut method.attributes {
            if let Attribute::Other { name_index, info } = attr {
                if class.constant_pool.resolve_utf8(*name_index) == Some("Code") {
                    *attr = Attribute::Code(parse_code(&class.constant_pool, info, *name_index)?);
                }
            }
        }
    }
    Ok(())
}

fn parse_code(
    pool: &ConstantPool,
    info: &[u8],
    name_index: u16,
) -> Result<CodeAttribute, Error> {
    let mut cursor = Cursor::new(info);
    let max_stack = read_u16(&mut cursor, "max_stack")?;
    let max_locals = read_u16(&mut cursor, "max_locals")?;
    let code_length = read_u32(&mut cursor, "code_length")?;
    let mut code = vec![0u8; code_length as usize];
    cursor
        .read_exact(&mut code)
        .map_err(|e| Error::MalformedClass(format!("code bytes: {e}")))?;
    let instructions = super::decode_instructions(&code)?;

    let exception_table_length = read_u16(&mut cursor, "exception_table_length")?;
    let mut exception_table = Vec::with_capacity(exception_table_length as usize);
    for _ in 0..exception_table_length {
        exception_table.push(ExceptionTableEntry {
            start_pc: read_u16(&mut cursor, "start_pc")?,
            end_pc: read_u16(&mut cursor, "end_pc")?,
            handler_pc: read_u16(&mut cursor, "handler_pc")?,
            catch_type: read_u16(&mut cursor, "catch_type")?,
        });
    }

    let attributes_count = read_u16(&mut cursor, "code attributes_count")?;
    let mut attributes = Vec::with_capacity(attributes_count as usize);
    for _ in 0..attributes_count {
        attributes.push(parse_attribute(&mut cursor)?);
    }
    let _ = pool;

    Ok(CodeAttribute {
        name_index_hint: name_index,
        max_stack,
        max_locals,
        instructions,
        exception_table,
        attributes,
    })
}

fn read_u16(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<u16, Error> {
    cursor
        .read_u16::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("{field}: {e}")))
}

fn read_u32(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<u32, Error> {
    cursor
        .read_u32::<BigEndian>()
        .map_err(|e| Error::MalformedClass(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_class_bytes() -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // minor
        bytes.extend_from_slice(&61u16.to_be_bytes()); // major (Java 17)
        bytes.extend_from_slice(&1u16.to_be_bytes()); // constant_pool_count = 1 (empty pool)
        bytes.extend_from_slice(&0u16.to_be_bytes()); // access_flags
        bytes.extend_from_slice(&0u16.to_be_bytes()); // this_class
        bytes.extend_from_slice(&0u16.to_be_bytes()); // super_class
        bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // fields_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // methods_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        bytes
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_class_bytes();
        bytes[0] = 0;
        assert!(matches!(parse(&bytes), Err(Error::MalformedClass(_))));
    }

    #[test]
    fn parses_an_empty_class() {
        let bytes = minimal_class_bytes();
        let class = parse(&bytes).unwrap();
        assert_eq!(class.major_version, 61);
        assert!(class.methods.is_empty());
        assert!(class.constant_pool.is_empty());
    }
}
