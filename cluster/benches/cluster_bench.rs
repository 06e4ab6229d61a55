use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facesort_cluster::{normalize, Clusterer};

fn random_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    v
}

fn make_faces(people: usize, per_person: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut out = Vec::with_capacity(people * per_person);
    for p in 0..people {
        let centroid = random_vec(dim, p as u64 + 1);
        for i in 0..per_person {
            let jitter = random_vec(dim, (p * 1000 + i) as u64 + 7);
            out.push(
                centroid
                    .iter()
                    .zip(&jitter)
                    .map(|(c, j)| c + j * 0.1)
                    .collect(),
            );
        }
    }
    out
}

fn bench_normalize(c: &mut Criterion) {
    let faces = make_faces(10, 20, 128);
    c.bench_function("normalize_128d_200faces", |b| {
        b.iter(|| {
            let _ = black_box(normalize(black_box(&faces)));
        });
    });
}

fn bench_cluster(c: &mut Criterion) {
    let clusterer = Clusterer::default();
    let faces = make_faces(10, 20, 128);
    c.bench_function("cluster_128d_200faces_10people", |b| {
        b.iter(|| {
            let _ = black_box(clusterer.cluster(black_box(&faces)));
        });
    });

    let faces = make_faces(25, 40, 512);
    c.bench_function("cluster_512d_1000faces_25people", |b| {
        b.iter(|| {
            let _ = black_box(clusterer.cluster(black_box(&faces)));
        });
    });
}

criterion_group!(benches, bench_normalize, bench_cluster);
criterion_main!(benches);
