use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use style_imitator::style::{profile, CoherenceFilter};
use style_imitator::transcript;

fn profile_benchmark(c: &mut Criterion) {
    let messages: Vec<String> = (0..200)
        .map(|i| {
            format!(
                "Слушай, ну это {} раз уже, давай завтра созвонимся? 😂 короче решим",
                i
            )
        })
        .collect();

    c.bench_function("profile_200_messages", |b| {
        b.iter(|| {
            let fingerprint = profile(black_box(&messages));
            black_box(fingerprint.keywords.len());
        });
    });
}

fn coherence_benchmark(c: &mut Criterion) {
    let filter = CoherenceFilter::default();
    let raw = "Да ладно, я же говорил что приду, просто опоздаю минут на десять, не кипишуй!"
        .repeat(3);
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("coherence_filter_long_reply", |b| {
        b.iter(|| {
            let (reply, outcome) = filter.apply(black_box(&raw), &[], &mut rng);
            black_box((reply.len(), outcome));
        });
    });
}

fn extract_benchmark(c: &mut Criterion) {
    let html = sample_export(500);

    c.bench_function("extract_500_message_export", |b| {
        b.iter(|| {
            let extraction = transcript::extract(black_box(&html), None);
            black_box(extraction.messages.len());
        });
    });
}

fn sample_export(messages: usize) -> String {
    let mut html = String::from(
        r#"<html><body><div class="page_header"><div class="text bold">Alice</div></div><div class="history">"#,
    );
    for i in 0..messages {
        let author = if i % 3 == 0 { "Alice" } else { "Bob" };
        html.push_str(&format!(
            r#"<div class="message default" id="message{i}"><div class="body"><div class="pull_right date details" title="12.03.2024 18:01:02 UTC+03:00">18:01</div><div class="from_name">{author}</div><div class="text">сообщение номер {i} про тренировку &amp; кофе</div></div></div>"#
        ));
    }
    html.push_str("</div></body></html>");
    html
}

criterion_group!(
    text_processing,
    profile_benchmark,
    coherence_benchmark,
    extract_benchmark
);
criterion_main!(text_processing);
