use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sonarsift::matcher::WordMatcher;
use sonarsift::parse::{parse_banner, parse_probe};

fn bench_filter(c: &mut Criterion) {
    let banner = r#"{"data":"PGh0bWw+PGJvZHk+aGVsbG8gd29ybGQ8L2JvZHk+PC9odG1sPg==","host":"a.com","ip":"1.2.3.4","path":"/","port":80,"vhost":"a.com"}"#;
    let probe = "1700000000,10.0.0.5,5353,224.0.0.251,5353,1,64,payload";
    let matcher = WordMatcher::new("world", true).unwrap();

    c.bench_function("parse_banner_and_match", |b| {
        b.iter(|| {
            let (_, payload) = parse_banner(black_box(banner.as_bytes())).unwrap();
            black_box(matcher.matches(&payload))
        })
    });

    c.bench_function("parse_probe", |b| {
        b.iter(|| {
            let out = parse_probe(black_box(probe));
            black_box(out)
        })
    });
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
