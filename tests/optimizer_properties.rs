//! Property-style coverage for the optimizer's constant folding (spec.md
//! §8's property-test mandate): random constants near the 32-bit wrap
//! boundary, and random three-op `iadd` chains, compared against the
//! in-test interpreter oracle. No `quickcheck`/`proptest` dependency is
//! added (the teacher crate carries none); a small hand-rolled linear
//! congruential generator supplies the randomness instead.

mod common;

use aotc::class::{Instruction, Opcode};
use aotc::{jit_rewrite, Class};

/// A minimal, deterministic LCG so repeated test runs are reproducible
/// without needing a `rand` dependency.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 32) as u32
    }

    fn next_i32(&mut self) -> i32 {
        self.next_u32() as i32
    }
}

/// Build a method body that pushes every value in `values` via `ldc_w`
/// (a real constant-pool int load, valid for any `i32`) and folds
/// successive values with `iadd`, then `ireturn`s the total.
///
/// Every constant goes through `ldc_w` rather than the narrower
/// `bipush`/`sipush` forms: `Instruction::PushInt` only ever holds values
/// producible by those single-opcode forms, so random values outside
/// `i16` range (which this property test deliberately exercises near the
/// `i32` boundary) must be routed through the constant pool like any real
/// `ldc`-sized literal would be.
fn sum_class(values: &[i32]) -> (Class, Vec<u8>) {
    let mut builder = common::ClassBuilder::new();
    let mut code = Vec::new();
    for (i, &v) in values.iter().enumerate() {
        let index = builder.push_integer(v);
        code.extend_from_slice(&common::ldc_w_bytes(index));
        if i > 0 {
            code.push(0x60); // iadd
        }
    }
    code.push(0xac); // ireturn
    builder.add_method("m", "()I", values.len() as u16, 0, code.clone());
    let bytes = builder.build();
    let class = Class::parse(&bytes).unwrap();
    (class, code)
}

fn fold_and_interpret(values: &[i32]) -> (i32, i32) {
    let (class, code) = sum_class(values);
    let instructions = aotc::class::decode_instructions(&code).unwrap();
    let before = common::interpret(&instructions, &class.constant_pool);

    let rewritten_bytes = jit_rewrite(&class).unwrap();
    let rewritten = Class::parse(&rewritten_bytes).unwrap();
    let method = rewritten.find_method("m", "()I").unwrap();
    let after = common::interpret(&method.code().unwrap().instructions, &rewritten.constant_pool);

    (before, after)
}

#[test]
fn folding_preserves_value_for_constants_near_i32_boundaries() {
    let boundary_values: Vec<i32> = vec![
        i32::MAX,
        i32::MAX - 1,
        i32::MIN,
        i32::MIN + 1,
        0,
        -1,
        1,
        i32::MAX / 2,
        i32::MIN / 2,
    ];

    for &a in &boundary_values {
        for &b in &boundary_values {
            let (before, after) = fold_and_interpret(&[a, b]);
            assert_eq!(before, after, "folding changed the result for {a} + {b}");
            assert_eq!(before, a.wrapping_add(b));
        }
    }
}

#[test]
fn folding_preserves_value_for_random_three_term_chains() {
    let mut rng = Lcg(0x5eed_1234_cafe_babe);

    for _ in 0..200 {
        let a = rng.next_i32();
        let b = rng.next_i32();
        let c = rng.next_i32();

        let (before, after) = fold_and_interpret(&[a, b, c]);
        assert_eq!(before, after);
        assert_eq!(before, a.wrapping_add(b).wrapping_add(c));
    }
}

/// A chain long enough to exercise the optimizer's sliding window more
/// than once still collapses fully and evaluates identically.
#[test]
fn folding_preserves_value_for_longer_chains() {
    let mut rng = Lcg(0x0ff1_ce00_dead_beef);

    for _ in 0..50 {
        let values: Vec<i32> = (0..6).map(|_| rng.next_i32()).collect();
        let (before, after) = fold_and_interpret(&values);
        let expected = values.iter().fold(0i32, |acc, v| acc.wrapping_add(*v));
        assert_eq!(before, expected);
        assert_eq!(before, after);
    }
}

#[test]
fn folded_chain_collapses_arithmetic_opcodes() {
    let (class, code) = sum_class(&[1, 2, 3, 4]);
    let _ = aotc::class::decode_instructions(&code).unwrap();

    let rewritten_bytes = jit_rewrite(&class).unwrap();
    let rewritten = Class::parse(&rewritten_bytes).unwrap();
    let method = rewritten.find_method("m", "()I").unwrap();
    let folded = &method.code().unwrap().instructions;

    assert!(!folded.iter().any(|i| matches!(i, Instruction::Arithmetic(Opcode::Iadd))));
    let result = common::interpret(folded, &rewritten.constant_pool);
    assert_eq!(result, 10);
}
