use std::cmp::Ordering;

/// A class name paired with the probability the model assigned to it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Label {
    pub label: String,
    pub probability: f32,
}

/// Pair each probability with the label at the same index and sort by
/// probability, highest first. Ties keep index order and NaN sorts last.
pub fn rank(probabilities: &[f32], labels: &[String]) -> Vec<Label> {
    if probabilities.len() != labels.len() {
        log::warn!(
            "Model produced {} probabilities for {} labels, ignoring the unmatched tail",
            probabilities.len(),
            labels.len()
        );
    }

    let mut ranked: Vec<Label> = probabilities
        .iter()
        .zip(labels)
        .map(|(&probability, label)| Label {
            label: label.clone(),
            probability,
        })
        .collect();

    ranked.sort_by(|a, b| descending(a.probability, b.probability));
    ranked
}

pub fn top_k(mut labels: Vec<Label>, k: usize) -> Vec<Label> {
    labels.truncate(k);
    labels
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
