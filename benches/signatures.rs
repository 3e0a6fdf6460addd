//! Benchmarks for signature operations.
//!
//! Tests the hot paths of the signature model:
//! - Canonical hashing (drives the type-spec deduplication index)
//! - Strict and reference matching
//! - Generic substitution, including the no-op short-circuit
//! - Instruction decoding of a small method body

extern crate cilforge;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use cilforge::prelude::*;

fn deep_signature(module: &CilModule) -> TypeSigRc {
    let list = module
        .type_ref(
            "System.Collections.Generic",
            "List`1",
            ResolutionScope::AssemblyRef("System.Collections".into()),
            BindingOptions::DEFAULT,
        )
        .unwrap()
        .unwrap();
    Arc::new(TypeSig::Pointer {
        element: Arc::new(TypeSig::vector(Arc::new(TypeSig::GenericInst {
            definition: list.signature(),
            args: vec![module.cache().intrinsic(IntrinsicKind::I4)],
        }))),
        by_ref: false,
    })
}

fn open_signature(module: &CilModule) -> TypeSigRc {
    Arc::new(TypeSig::vector(
        module
            .cache()
            .generic_parameter(0, GenericParameterKind::Type)
            .unwrap(),
    ))
}

/// Benchmark canonical hashing of a nested composite signature.
fn bench_canonical_hash(c: &mut Criterion) {
    let module = CilModule::new("bench.dll");
    let signature = deep_signature(&module);

    c.bench_function("sig_canonical_hash", |b| {
        b.iter(|| black_box(black_box(&signature).canonical_hash()));
    });
}

/// Benchmark strict matching of two structurally equal composites.
fn bench_strict_match(c: &mut Criterion) {
    let module = CilModule::new("bench.dll");
    let left = deep_signature(&module);
    let right = deep_signature(&module);

    c.bench_function("sig_strict_match", |b| {
        b.iter(|| black_box(left.matches(black_box(&right), SignatureComparison::Strict)));
    });
}

/// Benchmark the substitution short-circuit on a generic-free signature.
fn bench_substitution_noop(c: &mut Criterion) {
    let module = CilModule::new("bench.dll");
    let signature = deep_signature(&module);
    let map = GenericMap::new(vec![module.cache().intrinsic(IntrinsicKind::String)], Vec::new());

    c.bench_function("sig_substitution_noop", |b| {
        b.iter(|| black_box(black_box(&signature).map_generic_arguments(&map)));
    });
}

/// Benchmark substituting an open vector signature.
fn bench_substitution_open(c: &mut Criterion) {
    let module = CilModule::new("bench.dll");
    let signature = open_signature(&module);
    let map = GenericMap::new(vec![module.cache().intrinsic(IntrinsicKind::I4)], Vec::new());

    c.bench_function("sig_substitution_open", |b| {
        b.iter(|| black_box(black_box(&signature).map_generic_arguments(&map)));
    });
}

/// Benchmark decoding a small method body end to end.
fn bench_decode_small_body(c: &mut Criterion) {
    let il = vec![
        0x02, // ldarg.0
        0x1F, 0x10, // ldc.i4.s 16
        0x58, // add
        0x28, 0x01, 0x00, 0x00, 0x0A, // call
        0x2A, // ret
    ];
    let len = il.len() as u32;
    let mut body = MethodBody::with_il("bench", il);
    let root = body.create_block();
    body.set_root_block(root).unwrap();
    let seq = body.create_original_sequence(0, len);
    body.add_instruction_sequence(root, seq).unwrap();

    c.bench_function("decode_small_body", |b| {
        b.iter(|| {
            let mut reader = InstructionReader::new(&body, &[]);
            reader.enter_instruction_block(root).unwrap();
            reader.enter_instruction_sequence(seq).unwrap();
            let mut count = 0;
            while reader.read_instruction().unwrap() {
                count += 1;
            }
            black_box(count)
        });
    });
}

criterion_group!(
    benches,
    bench_canonical_hash,
    bench_strict_match,
    bench_substitution_noop,
    bench_substitution_open,
    bench_decode_small_body
);
criterion_main!(benches);
