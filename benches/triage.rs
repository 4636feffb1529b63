use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::path::Path;

use mailtriage::classify::classify;
use mailtriage::parser::body::{extract_body, DEFAULT_BODY_CAP};
use mailtriage::parser::mime::parse_raw_message;
use mailtriage::source::{MboxSource, MessageSource};

fn fixture_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("inbox.mbox")
}

fn bench_fetch_mbox(c: &mut Criterion) {
    let path = fixture_path();
    c.bench_function("fetch_unread_inbox", |b| {
        b.iter(|| {
            let mut source = MboxSource::new(&path);
            source.fetch_unread(30).unwrap().len()
        })
    });
}

fn bench_extract_html(c: &mut Criterion) {
    let mut raw = String::from(
        "Content-Type: multipart/alternative; boundary=b\n\n--b\nContent-Type: text/html\n\n",
    );
    raw.push_str("<style>td { padding: 0 }</style><table>");
    for i in 0..500 {
        raw.push_str(&format!("<tr><td>Row {i} &amp; more</td><td><b>bold</b></td></tr>"));
    }
    raw.push_str("</table>\n--b--\n");
    let message = parse_raw_message("bench", raw.as_bytes());

    c.bench_function("extract_body_html_table", |b| {
        b.iter(|| extract_body(black_box(&message), DEFAULT_BODY_CAP))
    });
}

fn bench_classify(c: &mut Criterion) {
    let body = "Here is our monthly update with nothing actionable. ".repeat(40);
    c.bench_function("classify_informational_2k", |b| {
        b.iter(|| classify(black_box("Newsletter"), black_box(&body)))
    });
}

criterion_group!(benches, bench_fetch_mbox, bench_extract_html, bench_classify);
criterion_main!(benches);
