//! Journal-profile similarity: z-scored numeric features compared by
//! cosine, with an optional topic-overlap component.

use serde::Serialize;

use super::JournalCandidate;

const FEATURE_COUNT: usize = 5;

/// Candidates with fewer non-null numeric features than this carry too
/// little signal; they are dropped rather than imputed into the cosine.
const MIN_KNOWN_FEATURES: usize = 3;

const W_NUMERIC: f64 = 0.7;
const W_THEMATIC: f64 = 0.3;

#[derive(Debug, Clone, Serialize)]
pub struct SimilarJournal {
    pub rank: usize,
    pub numeric_similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thematic_similarity: Option<f64>,
    pub combined_similarity: f64,
    #[serde(flatten)]
    pub journal: JournalCandidate,
}

fn features(journal: &JournalCandidate) -> [Option<f64>; FEATURE_COUNT] {
    [
        journal.two_yr_mean_citedness,
        journal.works_ref_year.map(|v| v as f64),
        journal.cites_ref_year.map(|v| v as f64),
        journal.works_count.map(|v| v as f64),
        journal.cited_by_count.map(|v| v as f64),
    ]
}

fn known_features(journal: &JournalCandidate) -> usize {
    features(journal).iter().filter(|f| f.is_some()).count()
}

/// Standardizes each feature column to zero mean and unit variance across
/// all rows. Zero-variance columns standardize to 0 everywhere. Missing
/// values are imputed as raw 0 before standardization.
fn standardize(rows: &[[Option<f64>; FEATURE_COUNT]]) -> Vec<[f64; FEATURE_COUNT]> {
    let n = rows.len() as f64;
    let mut out = vec![[0.0_f64; FEATURE_COUNT]; rows.len()];
    if rows.is_empty() {
        return out;
    }

    for col in 0..FEATURE_COUNT {
        let raw: Vec<f64> = rows.iter().map(|r| r[col].unwrap_or(0.0)).collect();
        let mean = raw.iter().sum::<f64>() / n;
        let variance = raw.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            for (row, value) in raw.iter().enumerate() {
                out[row][col] = (value - mean) / std_dev;
            }
        }
    }
    out
}

/// Cosine of two standardized vectors, clamped to [0, 1]. Negative cosines
/// (strongly dissimilar profiles) report as 0.
fn cosine(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Jaccard overlap of top topic IDs. 0 when either set is empty.
fn topic_jaccard(a: &JournalCandidate, b: &JournalCandidate) -> f64 {
    let set_a = a.topic_ids();
    let set_b = b.topic_ids();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Ranks pool journals by similarity to the reference. The reference itself
/// and thin candidates (under 3 of 5 known features) are excluded before
/// standardization.
pub fn find_similar(
    reference: &JournalCandidate,
    pool: Vec<JournalCandidate>,
    top_n: usize,
    use_thematic: bool,
) -> Vec<SimilarJournal> {
    let candidates: Vec<JournalCandidate> = pool
        .into_iter()
        .filter(|j| j.source_id != reference.source_id)
        .filter(|j| known_features(j) >= MIN_KNOWN_FEATURES)
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    // Reference joins the pool for standardization so its vector lives on
    // the same scale, then occupies row 0.
    let mut rows: Vec<[Option<f64>; FEATURE_COUNT]> = Vec::with_capacity(candidates.len() + 1);
    rows.push(features(reference));
    rows.extend(candidates.iter().map(features));
    let standardized = standardize(&rows);
    let reference_vector = standardized[0];

    let mut results: Vec<SimilarJournal> = candidates
        .into_iter()
        .zip(standardized.into_iter().skip(1))
        .map(|(journal, vector)| {
            let numeric = cosine(&reference_vector, &vector);
            let thematic = use_thematic.then(|| topic_jaccard(reference, &journal));
            let combined = match thematic {
                Some(t) => W_NUMERIC * numeric + W_THEMATIC * t,
                None => numeric,
            };
            SimilarJournal {
                rank: 0,
                numeric_similarity: numeric,
                thematic_similarity: thematic,
                combined_similarity: combined,
                journal,
            }
        })
        .collect();

    results.sort_by(|a, b| b.combined_similarity.total_cmp(&a.combined_similarity));
    results.truncate(top_n);
    for (i, entry) in results.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    results
}
