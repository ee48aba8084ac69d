use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeSet, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Tokenize text into stemmed unigrams using NFKC normalization, lowercase,
/// punctuation stripping, and stopword removal. Deterministic: identical
/// input always yields identical tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) {
            continue;
        }
        tokens.push(STEMMER.stem(token).to_string());
    }
    tokens
}

/// Unigrams plus adjacent bigrams over the unigram stream. This is the
/// token stream the vocabulary, TF-IDF vectors, and BM25 statistics all
/// share; bigrams are space-joined.
pub fn ngrams(text: &str) -> Vec<String> {
    let unigrams = tokenize(text);
    let mut out = Vec::with_capacity(unigrams.len().saturating_mul(2));
    out.extend(unigrams.iter().cloned());
    for pair in unigrams.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

/// Canonical query text used as the feedback-record key: the unigram
/// stream joined by single spaces. Pattern signatures and feedback keys
/// deliberately share one normalization path.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Sorted unique unigram set — the query's pattern-cache signature.
pub fn signature(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_stems() {
        let toks = tokenize("Failing FAILED failure! The café's menu.");
        assert!(toks.contains(&"fail".to_string()));
        assert!(toks.contains(&"failur".to_string()));
        // Unicode normalization: café -> cafe (stemmed unchanged)
        assert!(toks.iter().any(|t| t.starts_with("caf")));
    }

    #[test]
    fn filters_stopwords() {
        let toks = tokenize("the value of the field is not valid");
        assert!(!toks.contains(&"the".to_string()));
        assert!(!toks.contains(&"is".to_string()));
        assert!(toks.contains(&"valid".to_string()));
    }

    #[test]
    fn ngrams_include_adjacent_bigrams() {
        let toks = ngrams("negative value quantity");
        assert!(toks.contains(&"negat".to_string()));
        assert!(toks.contains(&"negat valu".to_string()));
        assert!(toks.contains(&"valu quantiti".to_string()));
        // No bigram spans the full trigram
        assert!(!toks.iter().any(|t| t.split(' ').count() > 2));
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(ngrams("the and of").is_empty());
    }

    #[test]
    fn signature_is_sorted_and_unique() {
        let sig = signature("timeout error timeout");
        let items: Vec<&String> = sig.iter().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0] < items[1]);
    }
}
