/// Oncology vocabulary searched by the paper APIs when nothing else is configured.
pub const DEFAULT_QUERY_TERMS: &[&str] = &[
    "cancer",
    "oncology",
    "tumor",
    "carcinoma",
    "metastasis",
    "chemotherapy",
    "radiotherapy",
    "leukemia",
    "lymphoma",
    "melanoma",
];

pub const DEFAULT_MAX_RESULTS: usize = 10;

/// What to ask each paper API for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuery {
    pub terms: Vec<String>,
    pub max_results: usize,
    /// Download and extract PDF bodies instead of indexing title and summary only.
    pub use_full_text: bool,
}

impl Default for PaperQuery {
    fn default() -> Self {
        Self {
            terms: DEFAULT_QUERY_TERMS.iter().map(|t| t.to_string()).collect(),
            max_results: DEFAULT_MAX_RESULTS,
            use_full_text: false,
        }
    }
}

impl PaperQuery {
    pub fn new(terms: Vec<String>, max_results: usize, use_full_text: bool) -> Self {
        Self { terms, max_results, use_full_text }
    }

    /// Terms ORed together, the form every supported API understands.
    pub fn disjunction(&self) -> String {
        self.terms.join(" OR ")
    }
}
