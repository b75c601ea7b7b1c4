use criterion::{black_box, criterion_group, criterion_main, Criterion};
use redline_parser::{parse, serialize};

fn body_with_paragraphs(count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for i in 0..count {
        xml.push_str(&format!(
            r#"<w:p w:rsidR="00A1"><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Paragraph {i} </w:t></w:r><w:ins w:id="{i}" w:author="Bench" w:date="2024-01-01T00:00:00Z"><w:r><w:t>inserted &amp; kept</w:t></w:r></w:ins><w:del w:id="{d}" w:author="Bench"><w:r><w:delText>gone</w:delText></w:r></w:del></w:p>"#,
            d = i + count
        ));
    }
    xml.push_str("</w:body></w:document>");
    xml
}

fn parse_small_body(c: &mut Criterion) {
    let source = body_with_paragraphs(10);
    c.bench_function("parse_small_body", |b| b.iter(|| parse(black_box(&source))));
}

fn parse_large_body(c: &mut Criterion) {
    let source = body_with_paragraphs(2_000);
    c.bench_function("parse_large_body", |b| b.iter(|| parse(black_box(&source))));
}

fn roundtrip_large_body(c: &mut Criterion) {
    let source = body_with_paragraphs(2_000);
    let doc = parse(&source).unwrap();
    c.bench_function("serialize_large_body", |b| b.iter(|| serialize(black_box(&doc))));
}

criterion_group!(benches, parse_small_body, parse_large_body, roundtrip_large_body);
criterion_main!(benches);
