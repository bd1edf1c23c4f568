// benches/extend.rs
// Criterion benchmarks for the NAM extension paths (ungapped vs gapped).

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use syncmap::aligner::Aligner;
use syncmap::extend::extend_nam;
use syncmap::nam::Nam;
use syncmap::read::Read;
use syncmap::references::References;

const READ_LEN: usize = 150;

fn make_references(len: usize, seed: u64) -> References {
    let mut rng = StdRng::seed_from_u64(seed);
    let sequence: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    References::new(vec!["bench_ref".to_string()], vec![sequence])
}

fn make_nam(ref_start: i32, read_len: i32) -> Nam {
    Nam {
        nam_id: 0,
        ref_start,
        ref_end: ref_start + read_len,
        query_start: 0,
        query_end: read_len,
        ref_id: 0,
        n_hits: 10,
        score: read_len as f32,
        is_rc: false,
    }
}

fn bench_extend(c: &mut Criterion) {
    let references = make_references(100_000, 0xC0FFEE);
    let aligner = Aligner::default();
    let start = 50_000usize;

    // Clean read: ungapped fast path
    let clean = Read::new(&references.sequences[0][start..start + READ_LEN]);

    // Read with a 2-base deletion: gapped path
    let mut gapped_seq = references.sequences[0][start..start + READ_LEN + 2].to_vec();
    gapped_seq.drain(70..72);
    let gapped = Read::new(&gapped_seq);

    let mut group = c.benchmark_group("extend_nam");
    group.throughput(Throughput::Bytes(READ_LEN as u64));

    group.bench_function("hamming_fast_path", |b| {
        let nam = make_nam(start as i32, READ_LEN as i32);
        b.iter(|| {
            black_box(extend_nam(
                &aligner,
                black_box(&nam),
                &references,
                &clean,
                true,
            ))
        })
    });

    group.bench_function("gapped_path", |b| {
        let nam = make_nam(start as i32, READ_LEN as i32);
        b.iter(|| {
            black_box(extend_nam(
                &aligner,
                black_box(&nam),
                &references,
                &gapped,
                false,
            ))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_extend);
criterion_main!(benches);
