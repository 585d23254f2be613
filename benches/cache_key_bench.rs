use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netdispatch::http::httpcache::{CacheKey, ResponseCache};
use netdispatch::http::serializer;
use netdispatch::Params;
use url::Url;

fn search_params() -> Params {
    Params::new()
        .with("q", "rust async http")
        .with("page", 4_i64)
        .with("limit", 50_i64)
        .with("sort", "relevance")
        .with("safe", true)
        .with("lat", 51.5072)
}

fn benchmark_cache_key(c: &mut Criterion) {
    let url = Url::parse("https://api.x.com/v2/search?lang=en#results").unwrap();
    let params = search_params();

    c.bench_function("cache_key_new", |b| {
        b.iter(|| CacheKey::new("GET", black_box(&url), black_box(&params)))
    });
}

fn benchmark_cache_lookup(c: &mut Criterion) {
    let cache = ResponseCache::default();
    let url = Url::parse("https://api.x.com/v2/search").unwrap();
    let keys: Vec<CacheKey> = (0..500)
        .map(|i| CacheKey::new("GET", &url, &search_params().with("page", i as i64)))
        .collect();
    for key in &keys {
        cache.store(key.clone(), Bytes::from_static(br#"{"items":[]}"#));
    }

    c.bench_function("cache_lookup_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(cache.lookup(&keys[i]))
        })
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let body = br#"{"items":[{"id":1,"name":"a","tag":null},{"id":2,"name":"b","tag":null}],"next":null,"total":2}"#;

    c.bench_function("decode_remove_null", |b| {
        b.iter(|| serializer::decode(black_box(body), true))
    });
    c.bench_function("decode_keep_null", |b| {
        b.iter(|| serializer::decode(black_box(body), false))
    });
}

criterion_group!(
    benches,
    benchmark_cache_key,
    benchmark_cache_lookup,
    benchmark_decode
);
criterion_main!(benches);
