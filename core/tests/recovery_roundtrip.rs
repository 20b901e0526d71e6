use oncoseek_core::{
    Document, DocumentType, InvertedIndex, Language, Source, StagingManager, StagingState, Store,
    TermProcessor,
};
use tempfile::tempdir;

fn harvested_batch() -> InvertedIndex {
    let processor = TermProcessor::default();
    let mut index = InvertedIndex::new();
    let pubmed = index.stage_source(Source::new("PubMed", "https://pubmed.ncbi.nlm.nih.gov/"));
    let site = index.stage_source(
        Source::new("Cancer Research UK", "https://www.cancerresearchuk.org").with_icon(Some(vec![1, 2, 3])),
    );
    let texts = [
        (pubmed, "Chemotherapy response in metastatic breast cancer patients"),
        (site, "Living with cancer: support for patients and families"),
        (pubmed, "Radiotherapy dosage and tumour control in lung cancer"),
    ];
    for (n, (source, text)) in texts.iter().enumerate() {
        let analysis = processor.analyze(text, None);
        let key = index
            .stage_document(
                Document::new(format!("doc {n}"), text, DocumentType::Paper, format!("https://doc/{n}"), *source)
                    .with_language(analysis.language),
            )
            .unwrap();
        index.record_terms(key, &analysis.terms).unwrap();
    }
    index
}

fn snapshot(store: &Store) -> (Vec<oncoseek_core::SourceRecord>, Vec<oncoseek_core::DocumentRecord>, Vec<Option<oncoseek_core::TermRecord>>, Vec<Vec<(u64, u32)>>) {
    let documents = store.documents().unwrap();
    let terms = ["cancer", "patient", "chemotherapi", "tumour"];
    (
        store.sources().unwrap(),
        documents,
        terms.iter().map(|t| store.term(t).unwrap()).collect(),
        terms.iter().map(|t| store.postings(t).unwrap()).collect(),
    )
}

#[test]
fn resumed_commit_equals_direct_commit() {
    // Direct path.
    let direct_dir = tempdir().unwrap();
    let direct_store = Store::open(direct_dir.path().join("db")).unwrap();
    let mut direct = StagingManager::new(direct_dir.path().join("staging"));
    direct.stage(harvested_batch()).unwrap();
    direct.commit(&direct_store).unwrap();

    // Crash between staging and commit, then resume in a fresh process.
    let crash_dir = tempdir().unwrap();
    {
        let mut staging = StagingManager::new(crash_dir.path().join("staging"));
        staging.stage(harvested_batch()).unwrap();
        assert_eq!(staging.state(), StagingState::Staged);
    }
    let resumed_store = Store::open(crash_dir.path().join("db")).unwrap();
    let mut resumed = StagingManager::new(crash_dir.path().join("staging"));
    assert!(resumed.has_record());
    resumed.load().unwrap();
    resumed.commit(&resumed_store).unwrap();
    assert!(!resumed.has_record());

    assert_eq!(snapshot(&direct_store), snapshot(&resumed_store));
    assert_eq!(direct_store.statistics().unwrap(), resumed_store.statistics().unwrap());
    assert_eq!(resumed_store.documents().unwrap()[1].language, Language::English);
}

#[test]
fn discarded_record_is_not_committed() {
    let dir = tempdir().unwrap();
    {
        let mut staging = StagingManager::new(dir.path().join("staging"));
        staging.stage(harvested_batch()).unwrap();
    }
    let mut staging = StagingManager::new(dir.path().join("staging"));
    staging.discard().unwrap();
    assert!(!staging.has_record());
    assert!(staging.load().is_err());
}
