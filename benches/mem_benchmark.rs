use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rampart::mem::{copy, copy_trivial, memcpy, memset};
use rampart::{new_array, new_object, resize_array};

fn bench_copies(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bulk Copy");

    for len in [64usize, 4096] {
        group.bench_with_input(BenchmarkId::new("copy_from_slice", len), &len, |b, &len| {
            let src = vec![1u8; len];
            let mut dst = vec![0u8; len];
            b.iter(|| dst.copy_from_slice(black_box(&src)))
        });

        group.bench_with_input(BenchmarkId::new("memcpy", len), &len, |b, &len| {
            let src = new_array::<u8>(len);
            let dst = new_array::<u8>(len);
            b.iter(|| memcpy(&dst, black_box(&src), len))
        });

        group.bench_with_input(BenchmarkId::new("copy_trivial", len), &len, |b, &len| {
            let src = new_array::<u8>(len);
            let dst = new_array::<u8>(len);
            b.iter(|| copy_trivial(&dst, black_box(&src), len))
        });

        group.bench_with_input(BenchmarkId::new("copy", len), &len, |b, &len| {
            let src = new_array::<u8>(len);
            let dst = new_array::<u8>(len);
            b.iter(|| copy(&dst, black_box(&src), len))
        });

        group.bench_with_input(BenchmarkId::new("memset", len), &len, |b, &len| {
            let dst = new_array::<u8>(len);
            b.iter(|| memset(&dst, black_box(0xAB), len))
        });
    }

    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tagged Allocation");

    group.bench_function("Box::new", |b| {
        b.iter(|| black_box(Box::new(black_box(42u64))))
    });

    group.bench_function("new_object + free", |b| {
        b.iter(|| {
            let mut p = new_object(black_box(42u64));
            unsafe { p.free() };
        })
    });

    group.bench_function("resize_array 16 -> 32", |b| {
        b.iter_batched(
            || new_array::<u64>(16),
            |a| {
                let mut grown = unsafe { resize_array(a, 32) };
                unsafe { grown.free() };
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_copies, bench_allocation);
criterion_main!(benches);
