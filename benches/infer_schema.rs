use std::fmt::Write;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use ppmidb::schema::{InferOptions, infer_schema};
use ppmidb::source::repair_content;

fn generate_visits(rows: usize) -> String {
    let mut content = String::from("PATNO,EVENT_ID,INFODT,ORIG_ENTRY,SCORE,NOTE\n");
    for i in 0..rows {
        let event = match i % 3 {
            0 => "BL",
            1 => "V01",
            _ => "V02",
        };
        let day = (i % 28) + 1;
        let score = if i % 7 == 0 {
            String::new()
        } else {
            format!("{}.{}", i % 40, i % 10)
        };
        writeln!(
            content,
            "{},{event},2024-01-{day:02},01/2024,{score},\"said \\\"ok\\\" at {i}\"",
            3000 + i
        )
        .expect("row");
    }
    content
}

fn bench_infer_schema(c: &mut Criterion) {
    let raw = generate_visits(50_000);
    let repaired = repair_content("Visits_20250401.csv", &raw);

    let mut group = c.benchmark_group("schema_inference");

    group.bench_function("repair_content", |b| {
        b.iter(|| repair_content("Visits_20250401.csv", &raw));
    });

    group.bench_function("infer_default", |b| {
        b.iter_batched(
            InferOptions::default,
            |options| infer_schema(&repaired, &options).expect("infer"),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("infer_decimals", |b| {
        b.iter_batched(
            || InferOptions {
                parse_dates: true,
                infer_decimals: true,
            },
            |options| infer_schema(&repaired, &options).expect("infer"),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_infer_schema);
criterion_main!(benches);
