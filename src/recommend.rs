use crate::corpus::Corpus;
use crate::record::Recommendation;

pub const DEFAULT_TOP_K: usize = 10;

/// Cheapest offers on the exact route, each scored by its absolute distance
/// from `predicted_price`.
///
/// Results are ordered by price, not by score. Equal prices keep corpus
/// order. An unmatched route yields an empty list.
pub fn recommend(
    corpus: &Corpus,
    origin: &str,
    destination: &str,
    predicted_price: f64,
    top_k: usize,
) -> Vec<Recommendation> {
    let mut matches: Vec<Recommendation> = corpus
        .records()
        .iter()
        .filter(|record| record.route_is(origin, destination))
        .map(|record| Recommendation {
            record: record.clone(),
            score: (record.price - predicted_price).abs(),
        })
        .collect();
    // stable: ties stay in corpus order
    matches.sort_by(|a, b| a.record.price.total_cmp(&b.record.price));
    matches.truncate(top_k);
    matches
}
