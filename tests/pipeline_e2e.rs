//! End-to-end scenarios exercising the public pipeline surface against
//! synthetic class-file byte buffers (see `tests/common`).
//!
//! These binaries are built for whatever host OS/ISA pair the test asked
//! for; running them from `cargo test` would assume a matching host, so
//! instead each scenario asserts the documented byte-exact properties of
//! the produced container (magic, code-region offset, entry point,
//! trampoline shape) and, where folding is involved, that the emitted
//! blob's body no longer contains the addition opcode.

mod common;

use std::fs;

use aotc::class::{Instruction, Opcode};
use aotc::{compile_class_native, compile_expression, compile_method_native, jit_rewrite, Class, ContainerFormat, Isa, MethodSelector};

fn temp_path(name: &str) -> std::path::PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("aotc-test-{name}"));
    p
}

/// E1: `int f(){return 42;}` compiled to x86-64 ELF.
#[test]
fn e1_compiles_a_constant_return_to_elf() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("f", "()I", 1, 0, common::return_constant(42));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("e1");
    let selector = MethodSelector {
        class_name: class.name().unwrap_or_default().to_string(),
        name: "f".to_string(),
        descriptor: "()I".to_string(),
    };
    compile_method_native(&class, &selector, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();

    let image = fs::read(&out).unwrap();
    assert_eq!(&image[0..4], &[0x7F, b'E', b'L', b'F']);
    assert!(image.len() >= 0x1000);
    assert_eq!(&image[0x1000..0x1000 + 5], &[0xE8, 0x0C, 0x00, 0x00, 0x00]);

    fs::remove_file(&out).ok();
}

/// E2: `int g(){return 5+3;}` folds to a single push + ireturn, so the
/// emitted blob's body contains no `add`-family x86-64 opcode.
#[test]
fn e2_folds_constant_addition_before_emitting() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("g", "()I", 2, 0, common::return_sum(5, 3));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("e2");
    let selector = MethodSelector {
        class_name: class.name().unwrap_or_default().to_string(),
        name: "g".to_string(),
        descriptor: "()I".to_string(),
    };
    compile_method_native(&class, &selector, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();

    let image = fs::read(&out).unwrap();
    // Trampoline is 17 bytes; the method body follows it immediately.
    let body_start = 0x1000 + 17;
    let body = &image[body_start..image.len()];
    assert!(!body.contains(&0x01), "folded body must not contain add eax, ebx");

    fs::remove_file(&out).ok();
}

/// E3/E4: after `jit_rewrite`, folded methods still evaluate to the same
/// result under the in-test interpreter oracle.
#[test]
fn e3_e4_jit_round_trip_preserves_return_value() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("h", "()I", 2, 0, common::return_sum(15, 25));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let rewritten_bytes = jit_rewrite(&class).unwrap();
    let rewritten = Class::parse(&rewritten_bytes).unwrap();

    let h = rewritten.find_method("h", "()I").unwrap();
    let code = h.code().unwrap();
    let result = common::interpret(&code.instructions, &rewritten.constant_pool);
    assert_eq!(result, 40);
}

/// E4 standalone: `int k(){return 7*8;}` through JIT; constant folding
/// only recognizes `iadd`, so this asserts the *value* (not the folded
/// shape) is preserved across the round-trip.
#[test]
fn e4_multiplication_round_trips_through_jit() {
    let mut code = common::push_int_bytes(7);
    code.extend_from_slice(&common::push_int_bytes(8));
    code.push(0x68); // imul
    code.push(0xac); // ireturn

    let mut builder = common::ClassBuilder::new();
    builder.add_method("k", "()I", 2, 0, code);
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let rewritten_bytes = jit_rewrite(&class).unwrap();
    let rewritten = Class::parse(&rewritten_bytes).unwrap();
    let k = rewritten.find_method("k", "()I").unwrap();
    let result = common::interpret(&k.code().unwrap().instructions, &rewritten.constant_pool);
    assert_eq!(result, 56);
}

/// E5: the ELF produced from a method returning a constant has `e_entry`
/// equal to `0x401000`, the start of the code region, not somewhere past
/// the trampoline, which must run first so its `exit` syscall actually
/// fires.
#[test]
fn e5_elf_entry_point_targets_the_trampoline() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("f", "()I", 1, 0, common::return_constant(42));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("e5");
    let selector = MethodSelector {
        class_name: class.name().unwrap_or_default().to_string(),
        name: "f".to_string(),
        descriptor: "()I".to_string(),
    };
    compile_method_native(&class, &selector, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();

    let image = fs::read(&out).unwrap();
    assert_eq!(u16::from_le_bytes(image[16..18].try_into().unwrap()), 2); // ET_EXEC
    assert_eq!(u16::from_le_bytes(image[18..20].try_into().unwrap()), 62); // EM_X86_64
    let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
    assert_eq!(entry, 0x0040_0000 + 0x1000);

    fs::remove_file(&out).ok();
}

/// E6: a Mach-O file produced from a method returning 0 on arm64 has the
/// documented header shape.
#[test]
fn e6_macho_arm64_header_shape() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("zero", "()I", 1, 0, common::return_constant(0));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("e6");
    let selector = MethodSelector {
        class_name: class.name().unwrap_or_default().to_string(),
        name: "zero".to_string(),
        descriptor: "()I".to_string(),
    };
    compile_method_native(&class, &selector, &out, ContainerFormat::MachO64, Isa::Arm64).unwrap();

    let image = fs::read(&out).unwrap();
    assert_eq!(u32::from_le_bytes(image[0..4].try_into().unwrap()), 0xFEED_FACF);
    let cputype = u32::from_le_bytes(image[4..8].try_into().unwrap());
    assert_eq!(cputype, 0x0100_000C);
    let filetype = u32::from_le_bytes(image[12..16].try_into().unwrap());
    assert_eq!(filetype, 2);
    let ncmds = u32::from_le_bytes(image[16..20].try_into().unwrap());
    assert!(ncmds >= 2);

    fs::remove_file(&out).ok();
}

/// E7: `1+2+3+4` (three `iadd`s) folds down to at most one integer-push
/// opcode followed by `ireturn`, and evaluates to 10 both before and
/// after folding.
#[test]
fn e7_chained_folds_collapse_to_one_push() {
    let mut code = common::push_int_bytes(1);
    code.extend_from_slice(&common::push_int_bytes(2));
    code.push(0x60); // iadd
    code.extend_from_slice(&common::push_int_bytes(3));
    code.push(0x60); // iadd
    code.extend_from_slice(&common::push_int_bytes(4));
    code.push(0x60); // iadd
    code.push(0xac); // ireturn

    let instructions = aotc::class::decode_instructions(&code).unwrap();
    let before = common::interpret(&instructions, &aotc::class::ConstantPool::default());
    assert_eq!(before, 10);

    let mut builder = common::ClassBuilder::new();
    builder.add_method("sum4", "()I", 2, 0, code);
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let rewritten_bytes = jit_rewrite(&class).unwrap();
    let rewritten = Class::parse(&rewritten_bytes).unwrap();
    let method = rewritten.find_method("sum4", "()I").unwrap();
    let folded = &method.code().unwrap().instructions;

    let push_count = folded
        .iter()
        .filter(|i| matches!(i, Instruction::PushInt(_) | Instruction::LoadConst { .. }))
        .count();
    assert!(push_count <= 1);
    assert!(!folded.iter().any(|i| matches!(i, Instruction::Arithmetic(Opcode::Iadd))));

    let after = common::interpret(folded, &rewritten.constant_pool);
    assert_eq!(after, 10);
}

/// `compile_class_native` concatenates every natively-compilable method in
/// class-file order with no inter-method linkage.
#[test]
fn compile_class_native_concatenates_all_methods() {
    let mut builder = common::ClassBuilder::new();
    builder.add_method("a", "()I", 1, 0, common::return_constant(1));
    builder.add_method("b", "()I", 1, 0, common::return_constant(2));
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("class-native");
    compile_class_native(&class, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();
    let image = fs::read(&out).unwrap();
    assert_eq!(&image[0..4], &[0x7F, b'E', b'L', b'F']);

    fs::remove_file(&out).ok();
}

/// `compile_expression` needs no source class at all.
#[test]
fn compile_expression_writes_a_standalone_binary() {
    let out = temp_path("expr");
    compile_expression(99, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();
    let image = fs::read(&out).unwrap();
    assert_eq!(&image[0..4], &[0x7F, b'E', b'L', b'F']);
    fs::remove_file(&out).ok();
}

/// A method containing an opcode the code generator doesn't translate
/// (`arraylength`) still compiles: the unsupported instruction becomes a
/// single `nop`, logged through `diagnostics::warn_nop` rather than
/// failing the pipeline (spec.md §7's "emission gaps" have no error
/// variant). `env_logger::try_init` surfaces that warning on stderr when
/// this test is run with `RUST_LOG=warn`.
#[test]
fn unsupported_opcode_compiles_to_a_nop_instead_of_failing() {
    let _ = env_logger::try_init();

    let mut code = common::push_int_bytes(0);
    code.push(0xbe); // arraylength
    code.push(0xac); // ireturn

    let mut builder = common::ClassBuilder::new();
    builder.add_method("weird", "()I", 1, 0, code);
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();

    let out = temp_path("nop-fallback");
    let selector = MethodSelector {
        class_name: class.name().unwrap_or_default().to_string(),
        name: "weird".to_string(),
        descriptor: "()I".to_string(),
    };
    compile_method_native(&class, &selector, &out, ContainerFormat::Elf64, Isa::X86_64).unwrap();

    let image = fs::read(&out).unwrap();
    assert_eq!(&image[0..4], &[0x7F, b'E', b'L', b'F']);
    fs::remove_file(&out).ok();
}
