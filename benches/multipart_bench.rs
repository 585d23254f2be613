use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use netdispatch::http::multipart::{self, FilePart};
use netdispatch::{ContentType, Params, RequestDescriptor, RequestMethod};
use url::Url;

fn benchmark_encode_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("multipart_encode");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let files = [FilePart::new("file", "photo.jpg", Bytes::from(vec![0x5a; size]))];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &files, |b, files| {
            b.iter(|| {
                multipart::encode(
                    [("album", "trip".to_string()), ("caption", "sunset".to_string())],
                    black_box(files),
                    "Boundary-bench",
                )
            })
        });
    }
    group.finish();
}

fn benchmark_upload_to_wire(c: &mut Criterion) {
    let url = Url::parse("http://api.test/upload").unwrap();
    let params = Params::new().with("album", "trip").with("index", 3_i64);
    let descriptor = RequestDescriptor::new(RequestMethod::Upload, url)
        .with_params(params)
        .with_files(vec![FilePart::new(
            "file",
            "photo.png",
            Bytes::from(vec![1u8; 32 * 1024]),
        )]);

    c.bench_function("upload_to_wire", |b| {
        b.iter(|| black_box(&descriptor).to_wire_with_boundary("B1"))
    });
}

fn benchmark_form_post_to_wire(c: &mut Criterion) {
    let url = Url::parse("http://api.test/form").unwrap();
    let params: Params = (0..20).map(|i| (format!("field{i}"), format!("value {i}"))).collect();
    let descriptor =
        RequestDescriptor::new(RequestMethod::Post(ContentType::FormUrlencoded), url).with_params(params);

    c.bench_function("form_post_to_wire", |b| {
        b.iter(|| black_box(&descriptor).to_wire())
    });
}

criterion_group!(
    benches,
    benchmark_encode_sizes,
    benchmark_upload_to_wire,
    benchmark_form_post_to_wire
);
criterion_main!(benches);
