use crate::Language;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Tokens shorter than this (in characters) never become terms.
pub const MIN_TERM_LEN: usize = 3;

/// Stemmed term -> frequency, ordered for deterministic iteration.
pub type TermFrequencies = BTreeMap<String, u32>;

const ENGLISH_WORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "just","let's","me","more","most","mustn't","my","myself",
    "no","nor","not","now","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","will","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
];

const SPANISH_WORDS: &[&str] = &[
    "a","al","algo","algunas","algunos","ante","antes","como","con","contra","cual","cuando",
    "de","del","desde","donde","durante","e","el","él","ella","ellas","ellos","en","entre","era","erais","eran","eras","eres","es","esa","esas","ese","eso","esos","esta","está","estaba","estado","estamos","están","estar","estas","estás","este","esto","estos","estoy","fue","fueron","fui",
    "ha","había","han","has","hasta","hay","he","la","las","le","les","lo","los",
    "más","me","mi","mí","mis","mucho","muchos","muy","nada","ni","no","nos","nosotros","nuestra","nuestras","nuestro","nuestros",
    "o","os","otra","otras","otro","otros","para","pero","poco","por","porque",
    "que","qué","quien","quienes","se","sea","sean","ser","será","si","sí","sido","siendo","sin","sobre","sois","somos","son","soy","su","sus","suya","suyo",
    "también","tanto","te","tenemos","tener","tengo","ti","tiene","tienen","todo","todos","tu","tú","tus","tuyo",
    "un","una","uno","unos","vosotros","vuestra","vuestro","y","ya","yo"
];

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"\w+|[^\w\s]+").expect("valid regex");
    static ref ENGLISH_STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref SPANISH_STEMMER: Stemmer = Stemmer::create(Algorithm::Spanish);
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = ENGLISH_WORDS.iter().copied().collect();
    static ref SPANISH_STOPWORDS: HashSet<&'static str> = SPANISH_WORDS.iter().copied().collect();
}

pub fn is_stopword(token: &str, language: Language) -> bool {
    match language {
        Language::English => ENGLISH_STOPWORDS.contains(token),
        Language::Spanish => SPANISH_STOPWORDS.contains(token),
    }
}

fn stemmer(language: Language) -> &'static Stemmer {
    match language {
        Language::English => &ENGLISH_STEMMER,
        Language::Spanish => &SPANISH_STEMMER,
    }
}

fn is_punctuation(token: &str) -> bool {
    token.chars().all(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

fn is_alphabetic(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

/// NFKC normalization followed by lowercasing.
fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Result of running the processor over one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub language: Language,
    pub terms: TermFrequencies,
}

impl Analysis {
    /// Sum of all term frequencies, i.e. the indexed length of the text.
    pub fn length(&self) -> u64 {
        self.terms.values().map(|f| u64::from(*f)).sum()
    }
}

/// Turns raw text into stemmed index terms. Deterministic for a given text and language.
#[derive(Debug, Clone)]
pub struct TermProcessor {
    min_term_len: usize,
    fallback: Language,
}

impl Default for TermProcessor {
    fn default() -> Self {
        Self::new(MIN_TERM_LEN, Language::English)
    }
}

impl TermProcessor {
    pub fn new(min_term_len: usize, fallback: Language) -> Self {
        Self { min_term_len, fallback }
    }

    pub fn fallback(&self) -> Language {
        self.fallback
    }

    /// Picks the language whose stopwords occur strictly most often; otherwise the fallback.
    pub fn detect_language(&self, text: &str) -> Language {
        let normalized = normalize(text);
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&normalized).map(|m| m.as_str()).collect();
        self.detect_tokens(&tokens)
    }

    fn detect_tokens(&self, tokens: &[&str]) -> Language {
        let mut best = self.fallback;
        let mut best_hits = tokens.iter().filter(|t| is_stopword(t, self.fallback)).count();
        for language in Language::ALL {
            if language == self.fallback {
                continue;
            }
            let hits = tokens.iter().filter(|t| is_stopword(t, language)).count();
            if hits > best_hits {
                best = language;
                best_hits = hits;
            }
        }
        best
    }

    pub fn analyze(&self, text: &str, hint: Option<Language>) -> Analysis {
        let normalized = normalize(text);
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&normalized).map(|m| m.as_str()).collect();
        let language = hint.unwrap_or_else(|| self.detect_tokens(&tokens));
        let stemmer = stemmer(language);

        let mut terms = TermFrequencies::new();
        for token in tokens {
            if !is_alphabetic(token)
                || token.chars().count() < self.min_term_len
                || is_stopword(token, language)
                || is_punctuation(token)
            {
                continue;
            }
            let stem = stemmer.stem(token).into_owned();
            *terms.entry(stem).or_insert(0) += 1;
        }

        Analysis { language, terms }
    }

    pub fn term_frequencies(&self, text: &str, hint: Option<Language>) -> TermFrequencies {
        self.analyze(text, hint).terms
    }

    /// Distinct stems of a query, in lexicographic order.
    pub fn query_terms(&self, query: &str, hint: Option<Language>) -> Vec<String> {
        self.term_frequencies(query, hint).into_keys().collect()
    }
}
