// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `tessera_property`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::string::String;
use std::sync::Once;
use std::vec::Vec;

use tessera_property::{
    ModifierError, ObjectKey, Precedence, PropertyManager, PropertyTypeBuilder, PropertyValue,
    SourceOwner,
};

const STYLE: SourceOwner = SourceOwner::new(1);

fn bench_property(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: PropertyValue={} ObjectKey={}",
            core::mem::size_of::<PropertyValue>(),
            core::mem::size_of::<ObjectKey>(),
        );
    });

    let mut manager = PropertyManager::new();
    let width = manager
        .register(PropertyTypeBuilder::new("Width", 0.0_f32))
        .unwrap();
    let font_size = manager
        .register(PropertyTypeBuilder::new("FontSize", 12.0_f32).inherited(true))
        .unwrap();

    // A small inheritance chain: 0 <- 1 <- ... <- N-1
    let chain_len: usize = 16;
    let nodes: Vec<ObjectKey> = (0..chain_len)
        .map(|_| manager.create_object().unwrap())
        .collect();
    manager.set(nodes[0], font_size, 16.0).unwrap();
    let leaf = nodes[chain_len - 1];
    let parents = |key: ObjectKey| {
        let idx = nodes.iter().position(|n| *n == key)?;
        idx.checked_sub(1).map(|parent| nodes[parent])
    };

    let local = manager.create_object().unwrap();
    manager.set(local, width, 100.0).unwrap();

    let styled = manager.create_object().unwrap();
    manager
        .add_value_source(styled, width, 50.0, Precedence::Style, STYLE)
        .unwrap();
    manager
        .add_value_source(styled, width, 25.0, Precedence::Class, STYLE)
        .unwrap();

    let modified = manager.create_object().unwrap();
    manager.set(modified, width, 100.0).unwrap();
    manager
        .add_value_modifier(modified, width, |v| match v {
            PropertyValue::Float(f) => {
                *f *= 0.5;
                Ok(())
            }
            _ => Err(ModifierError::new("not a float")),
        })
        .unwrap();

    let group_member = manager.create_object().unwrap();
    let group_key = manager.create_property_group().unwrap();
    manager.set(group_key, width, 75.0).unwrap();
    manager.add_property_group(group_member, group_key).unwrap();

    let bare = manager.create_object().unwrap();

    let mut group = c.benchmark_group("property/resolve");

    group.bench_function("local", |b| {
        b.iter(|| black_box(manager.get(local, width)));
    });

    group.bench_function("style", |b| {
        b.iter(|| black_box(manager.get(styled, width)));
    });

    group.bench_function("modifier", |b| {
        b.iter(|| black_box(manager.get(modified, width)));
    });

    group.bench_function("group", |b| {
        b.iter(|| black_box(manager.get(group_member, width)));
    });

    group.bench_function("default", |b| {
        b.iter(|| black_box(manager.get_default(bare, width)));
    });

    group.bench_function(BenchmarkId::new("inherited", chain_len), |b| {
        b.iter(|| black_box(manager.get_inherited(leaf, font_size, &parents)));
    });

    group.finish();

    let mut group = c.benchmark_group("property/resolve_string");

    let text = manager
        .register(PropertyTypeBuilder::new("Text", String::new()))
        .unwrap();
    let labelled = manager.create_object().unwrap();
    manager
        .set(
            labelled,
            text,
            "hello world hello world hello world".to_string(),
        )
        .unwrap();

    group.bench_function("local_clone", |b| {
        b.iter(|| black_box(manager.get(labelled, text)));
    });

    group.finish();

    let mut group = c.benchmark_group("property/mutate");

    group.bench_function("set/f32/no_handler", |b| {
        b.iter_batched(
            || {
                let mut manager = PropertyManager::new();
                let width = manager
                    .register(PropertyTypeBuilder::new("Width", 0.0_f32))
                    .unwrap();
                let node = manager.create_object().unwrap();
                (manager, width, node)
            },
            |(mut manager, width, node)| {
                black_box(manager.set(node, width, 123.0)).unwrap();
                black_box(manager);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("set/f32/with_handler", |b| {
        b.iter_batched(
            || {
                let mut manager = PropertyManager::new();
                let width = manager
                    .register(PropertyTypeBuilder::new("Width", 0.0_f32))
                    .unwrap();
                manager
                    .add_notification_handler(None, width, |_, change| {
                        black_box(change);
                    })
                    .unwrap();
                let node = manager.create_object().unwrap();
                (manager, width, node)
            },
            |(mut manager, width, node)| {
                black_box(manager.set(node, width, 123.0)).unwrap();
                black_box(manager);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("set/string", |b| {
        b.iter_batched(
            || {
                let mut manager = PropertyManager::new();
                let text = manager
                    .register(PropertyTypeBuilder::new("Text", String::new()))
                    .unwrap();
                let node = manager.create_object().unwrap();
                (manager, text, node)
            },
            |(mut manager, text, node)| {
                black_box(manager.set(node, text, String::from("hello world"))).unwrap();
                black_box(manager);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("add_remove_style_source", |b| {
        let mut manager = PropertyManager::new();
        let width = manager
            .register(PropertyTypeBuilder::new("Width", 0.0_f32))
            .unwrap();
        let node = manager.create_object().unwrap();
        manager.set(node, width, 1.0).unwrap();
        b.iter(|| {
            let handle = manager
                .add_value_source(node, width, 2.0, Precedence::Style, STYLE)
                .unwrap();
            black_box(manager.remove_value_source(node, width, handle, STYLE));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_property);
criterion_main!(benches);
