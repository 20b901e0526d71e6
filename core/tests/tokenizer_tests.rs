use oncoseek_core::{Language, TermProcessor};

#[test]
fn it_normalizes_and_stems() {
    let terms = TermProcessor::default().term_frequencies("Running Runners RUN! The café menu.", None);
    // Stemming to "run" should appear
    assert!(terms.contains_key("run"));
    // NFKC keeps the composed accent
    assert!(terms.contains_key("café"));
}

#[test]
fn it_filters_stopwords() {
    let terms = TermProcessor::default().term_frequencies("The quick brown fox and the lazy dog", None);
    assert!(!terms.contains_key("the"));
    assert!(!terms.contains_key("and"));
    assert!(terms.contains_key("quick"));
}

#[test]
fn filtered_tokens_never_become_terms() {
    let processor = TermProcessor::default();
    let terms = processor.term_frequencies("an ;;; -- which Oncology ONCOLOGY oncology", Some(Language::English));
    // "an" is too short, ";;;" and "--" are punctuation, "which" is a stopword.
    assert_eq!(terms.values().copied().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn casing_does_not_split_stems() {
    let processor = TermProcessor::default();
    let lower = processor.term_frequencies("metastasis", None);
    let upper = processor.term_frequencies("METASTASIS", None);
    assert_eq!(lower, upper);
    assert_eq!(lower.len(), 1);
}

#[test]
fn spanish_text_uses_spanish_stopwords_and_stemmer() {
    let processor = TermProcessor::default();
    let analysis = processor.analyze("los tratamientos para el cáncer de los pacientes", None);
    assert_eq!(analysis.language, Language::Spanish);
    assert!(!analysis.terms.contains_key("los"));
    assert!(!analysis.terms.contains_key("para"));
    assert_eq!(analysis.terms.len(), 3);
}

#[test]
fn processing_is_deterministic() {
    let processor = TermProcessor::default();
    let text = "Immunotherapy outcomes for lymphoma patients, 2019–2023.";
    assert_eq!(processor.analyze(text, None), processor.analyze(text, None));
    assert_eq!(processor.query_terms(text, None), processor.query_terms(text, None));
}

#[test]
fn query_terms_are_distinct() {
    let terms = TermProcessor::default().query_terms("tumor tumors TUMOR growth", None);
    assert_eq!(terms, vec!["growth".to_string(), "tumor".to_string()]);
}
