use criterion::{criterion_group, criterion_main, Criterion};
use oncoseek_core::TermProcessor;

const ABSTRACT: &str = "Background: Immune checkpoint inhibitors have changed the treatment of \
advanced melanoma and non-small cell lung cancer. We reviewed outcomes for patients receiving \
combination immunotherapy across twelve oncology centres, measuring progression-free survival, \
overall survival and treatment-related adverse events. Results suggest durable responses in a \
subset of patients with high tumour mutational burden.";

fn bench_term_frequencies(c: &mut Criterion) {
    let processor = TermProcessor::default();
    c.bench_function("term_frequencies_abstract", |b| b.iter(|| processor.term_frequencies(ABSTRACT, None)));
    c.bench_function("detect_language_abstract", |b| b.iter(|| processor.detect_language(ABSTRACT)));
}

criterion_group!(benches, bench_term_frequencies);
criterion_main!(benches);
