use crate::anki::{ContentMap, ModelInfo, BASIC_MODEL};

/// Pick the note type whose fields best fit the content keys.
///
/// Every type with at least one field is scored; the highest score wins and ties go to
/// the type listed first. Falls back to "Basic" when no type can be scored.
pub fn infer_best_type(content: &ContentMap, catalog: &[ModelInfo]) -> String {
    let keys: Vec<String> = content.keys().map(|k| k.to_lowercase()).collect();

    let mut best: Option<(&str, f64)> = None;
    for model in catalog.iter().filter(|m| !m.fields.is_empty()) {
        let score = score_type(&keys, model);
        log::debug!("Note type {} scored {:.3}", model.name, score);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((&model.name, score));
        }
    }

    best.map(|(name, _)| name.to_string())
        .unwrap_or_else(|| BASIC_MODEL.to_string())
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn score_type(keys: &[String], model: &ModelInfo) -> f64 {
    let fields: Vec<String> = model.fields.iter().map(|f| f.to_lowercase()).collect();
    let mut score = 0.0;

    for key in keys {
        if fields.iter().any(|f| f == key) {
            score += 2.0;
        } else if fields.iter().any(|f| overlaps(f, key)) {
            score += 1.0;
        }
    }

    let name = model.name.to_lowercase();
    if keys.iter().any(|k| k.contains(&name)) {
        score += 0.5;
    }

    let matched = fields
        .iter()
        .filter(|f| keys.iter().any(|k| overlaps(f, k)))
        .count();
    score += (matched as f64 / fields.len() as f64) * 2.0;

    score
}
