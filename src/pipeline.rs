//! The public invocation surface (spec.md §6): the five operations a
//! driver calls to analyze, JIT-rewrite, or natively compile a class.

use std::collections::HashMap;
use std::path::Path;

use crate::analyzer::{self, MethodInfo};
use crate::class::{
    dotted_to_slashed, return_kind, Attribute, Class, CodeAttribute, ConstantPool, Method,
    ReturnKind,
};
use crate::codegen::{self, Isa, NativeBlob};
use crate::container::{self, ContainerFormat};
use crate::error::{Error, Result};
use crate::optimizer;

/// Identifies a method uniquely within a class: `(name, descriptor)`
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub descriptor: String,
}

/// Selects a method to compile. `class_name` is accepted in dotted form
/// (`java.lang.Object`) and resolved to the slashed constant-pool form by
/// the reader's naming convention; it is only checked against `class`'s
/// own name, since this crate has no class loader to resolve a *different*
/// class by name (spec.md §1's non-goals exclude dynamic linking).
#[derive(Debug, Clone)]
pub struct MethodSelector {
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
}

/// Classify every method in `class` (C2, applied across the whole class).
/// Pure: calling this twice on the same `class` yields equal maps
/// (spec.md §8, invariant 1).
#[must_use]
pub fn analyze(class: &Class) -> HashMap<MethodKey, MethodInfo> {
    class
        .methods
        .iter()
        .map(|m| (method_key(class, m), analyzer::analyze(m)))
        .collect()
}

/// Run constant folding and dead-code elimination over every method's code
/// and re-encode the class back into loadable class-file bytes. Unknown
/// attributes, field order, and constant-pool entries not touched by the
/// optimizer round-trip unchanged (spec.md §8, invariant 2).
pub fn jit_rewrite(class: &Class) -> Result<Vec<u8>> {
    let mut rewritten = class.clone();
    for method in &mut rewritten.methods {
        if let Some(code) = method.code_mut() {
            optimizer::optimize(&mut code.instructions, &mut rewritten.constant_pool);
        }
    }
    Ok(rewritten.encode())
}

/// Compile a single method to a native executable. Runs the optimizer
/// first (semantics-preserving, so always safe to apply), then the code
/// generator for `isa`, then wraps the result in `format`'s container at
/// `out_path`.
pub fn compile_method_native(
    class: &Class,
    selector: &MethodSelector,
    out_path: &Path,
    format: ContainerFormat,
    isa: Isa,
) -> Result<()> {
    if dotted_to_slashed(&selector.class_name) != class.name().unwrap_or_default() {
        return Err(Error::ClassNotFound(selector.class_name.clone()));
    }
    let method = class
        .find_method(&selector.name, &selector.descriptor)
        .ok_or(Error::NoExecutableMethod)?;

    let blob = compile_one_method(class, method, isa)?;
    container::write(&blob, format, isa, out_path)
}

/// Compile every method in `class` that has a `Code` attribute and a
/// natively-representable return type, concatenating their native blobs in
/// class-file order with no inter-method linkage; entry is the first
/// emitted method's offset (spec.md §5's ordering rule).
pub fn compile_class_native(
    class: &Class,
    out_path: &Path,
    format: ContainerFormat,
    isa: Isa,
) -> Result<()> {
    let mut combined = Vec::new();
    for method in &class.methods {
        if !is_natively_compilable(class, method) {
            continue;
        }
        let blob = compile_one_method(class, method, isa)?;
        combined.extend_from_slice(blob.as_bytes());
    }
    if combined.is_empty() {
        return Err(Error::NoExecutableMethod);
    }
    container::write(&NativeBlob::from_raw(combined), format, isa, out_path)
}

/// Compile a single literal integer expression (`return <literal>;`) into
/// a native executable, without a source class at all. Used for the
/// `compile_expression` scenario in spec.md §6's invocation table.
pub fn compile_expression(
    literal: i32,
    out_path: &Path,
    format: ContainerFormat,
    isa: Isa,
) -> Result<()> {
    let pool = ConstantPool::default();
    let instructions = vec![
        crate::class::Instruction::PushInt(literal),
        crate::class::Instruction::Return(crate::class::Opcode::Ireturn),
    ];
    let blob = codegen::generate(&instructions, &pool, isa);
    container::write(&blob, format, isa, out_path)
}

fn compile_one_method(class: &Class, method: &Method, isa: Isa) -> Result<NativeBlob> {
    if !is_natively_compilable(class, method) {
        return Err(Error::NoExecutableMethod);
    }
    let code = method.code().ok_or(Error::NoExecutableMethod)?;
    let mut instructions = code.instructions.clone();
    let mut pool = class.constant_pool.clone();
    optimizer::optimize(&mut instructions, &mut pool);
    Ok(codegen::generate(&instructions, &pool, isa))
}

/// A method is natively compilable when it has code and its descriptor
/// returns `int` or `void`; anything else has no well-defined place in
/// the code generator's integer return register (spec.md §3's
/// `ReturnKind::Other` note).
fn is_natively_compilable(class: &Class, method: &Method) -> bool {
    method.code().is_some()
        && method
            .descriptor(&class.constant_pool)
            .map(|d| !matches!(return_kind(d), ReturnKind::Other))
            .unwrap_or(false)
}

fn method_key(class: &Class, method: &Method) -> MethodKey {
    MethodKey {
        name: method.name(&class.constant_pool).unwrap_or_default().to_owned(),
        descriptor: method
            .descriptor(&class.constant_pool)
            .unwrap_or_default()
            .to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_key_round_trips_name_and_descriptor() {
        let key = MethodKey {
            name: "f".to_string(),
            descriptor: "()I".to_string(),
        };
        assert_eq!(key.name, "f");
        assert_eq!(key.descriptor, "()I");
    }
}
