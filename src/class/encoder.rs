use super::{Attribute, Class, CodeAttribute};

/// Re-encode a [`Class`] into `.class` file bytes. Any attribute this crate
/// parsed structurally (`Code`) is re-emitted from its decoded form; every
/// other attribute is written back byte-for-byte from the raw bytes the
/// reader preserved.
pub(super) fn encode(class: &Class) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&class.minor_version.to_be_bytes());
    out.extend_from_slice(&class.major_version.to_be_bytes());

    encode_constant_pool(class, &mut out);

    out.extend_from_slice(&class.access_flags.bits().to_be_bytes());
    out.extend_from_slice(&class.this_class.to_be_bytes());
    out.extend_from_slice(&class.super_class.to_be_bytes());

    out.extend_from_slice(&(class.interfaces.len() as u16).to_be_bytes());
    for &iface in &class.interfaces {
        out.extend_from_slice(&iface.to_be_bytes());
    }

    out.extend_from_slice(&(class.fields.len() as u16).to_be_bytes());
    for field in &class.fields {
        out.extend_from_slice(&field.access_flags.bits().to_be_bytes());
        out.extend_from_slice(&field.name_index.to_be_bytes());
        out.extend_from_slice(&field.descriptor_index.to_be_bytes());
        encode_attributes(&field.attributes, &mut out);
    }

    out.extend_from_slice(&(class.methods.len() as u16).to_be_bytes());
    for method in &class.methods {
        out.extend_from_slice(&method.access_flags.bits().to_be_bytes());
        out.extend_from_slice(&method.name_index.to_be_bytes());
        out.extend_from_slice(&method.descriptor_index.to_be_bytes());
        encode_attributes(&method.attributes, &mut out);
    }

    encode_attributes(&class.attributes, &mut out);

    out
}

fn encode_constant_pool(class: &Class, out: &mut Vec<u8>) {
    out.extend_from_slice(&(class.constant_pool.len() as u16).to_be_bytes());
    for entry in class.constant_pool.iter().skip(1) {
        encode_constant_entry(entry, out);
    }
}

fn encode_constant_entry(entry: &super::ConstantPoolEntry, out: &mut Vec<u8>) {
    use super::{ConstantPoolEntry as E, ConstantTag as T};
    match entry {
        E::Utf8(s) => {
            out.push(T::Utf8 as u8);
            let bytes = s.as_bytes();
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        E::Integer(v) => {
            out.push(T::Integer as u8);
            out.extend_from_slice(&v.to_be_bytes());
        }
        E::Float(v) => {
            out.push(T::Float as u8);
            out.extend_from_slice(&v.to_be_bytes());
        }
        E::Long(v) => {
            out.push(T::Long as u8);
            out.extend_from_slice(&v.to_be_bytes());
        }
        E::Double(v) => {
            out.push(T::Double as u8);
            out.extend_from_slice(&v.to_be_bytes());
        }
        E::Class { name_index } => {
            out.push(T::Class as u8);
            out.extend_from_slice(&name_index.to_be_bytes());
        }
        E::String { utf8_index } => {
            out.push(T::String as u8);
            out.extend_from_slice(&utf8_index.to_be_bytes());
        }
        E::Fieldref { class_index, name_and_type_index } => {
            out.push(T::Fieldref as u8);
            out.extend_from_slice(&class_index.to_be_bytes());
            out.extend_from_slice(&name_and_type_index.to_be_bytes());
        }
        E::Methodref { class_index, name_and_type_index } => {
            out.push(T::Methodref as u8);
            out.extend_from_slice(&class_index.to_be_bytes());
            out.extend_from_slice(&name_and_type_index.to_be_bytes());
        }
        E::InterfaceMethodref { class_index, name_and_type_index } => {
            out.push(T::InterfaceMethodref as u8);
            out.extend_from_slice(&class_index.to_be_bytes());
            out.extend_from_slice(&name_and_type_index.to_be_bytes());
        }
        E::NameAndType { name_index, descriptor_index } => {
            out.push(T::NameAndType as u8);
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&descriptor_index.to_be_bytes());
        }
        E::Opaque { tag, raw } => {
            out.push(*tag);
            out.extend_from_slice(raw);
        }
        // Long/Double leave an Unusable placeholder at the next index; it
        // occupies no bytes of its own in the encoded pool.
        E::Unusable => {}
    }
}

fn encode_attributes(attributes: &[Attribute], out: &mut Vec<u8>) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attr in attributes {
        encode_attribute(attr, out);
    }
}

fn encode_attribute(attr: &Attribute, out: &mut Vec<u8>) {
    match attr {
        Attribute::Other { name_index, info } => {
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&(info.len() as u32).to_be_bytes());
            out.extend_from_slice(info);
        }
        Attribute::Code(code) => {
            let body = encode_code(code);
            // `Code`'s own name_index was folded away when the reader
            // re-tagged the `Other` attribute; recover the convention by
            // re-deriving it is not possible here without the constant
            // pool, so `Class::encode` always calls this only after the
            // reader has annotated the code with its original name_index
            // via `name_index_hint`.
            out.extend_from_slice(&code.name_index_hint.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
    }
}

fn encode_code(code: &CodeAttribute) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&code.max_stack.to_be_bytes());
    body.extend_from_slice(&code.max_locals.to_be_bytes());
    let encoded = super::encode_instructions(&code.instructions)
        .expect("optimizer output must stay byte-encodable");
    body.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
    body.extend_from_slice(&encoded);
    body.extend_from_slice(&(code.exception_table.len() as u16).to_be_bytes());
    for entry in &code.exception_table {
        body.extend_from_slice(&entry.start_pc.to_be_bytes());
        body.extend_from_slice(&entry.end_pc.to_be_bytes());
        body.extend_from_slice(&entry.handler_pc.to_be_bytes());
        body.extend_from_slice(&entry.catch_type.to_be_bytes());
    }
    encode_attributes(&code.attributes, &mut body);
    body
}
