use crate::anki::{ContentMap, FieldMap, ModelInfo};

/// Alternative content keys accepted for common field names.
const ALIASES: &[(&str, &[&str])] = &[
    ("front", &["question", "term", "frontside"]),
    ("back", &["answer", "definition", "backside"]),
    ("text", &["cloze_text", "cloze text", "content", "main_content"]),
];

fn aliases_for(field: &str) -> Option<&'static [&'static str]> {
    let field = field.to_lowercase();
    ALIASES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, aliases)| *aliases)
}

/// Assign content entries to the fields of `model`.
///
/// Runs an exact pass, then a partial (substring) pass, then an alias pass. Each content
/// key and each field is used at most once. Fields left without a match are absent from
/// the result.
pub fn map_content(content: &ContentMap, model: &ModelInfo) -> FieldMap {
    let mut mapping = FieldMap::new();
    let mut remaining: Vec<(&str, &str)> = content
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    for field in &model.fields {
        let field_lower = field.to_lowercase();
        if let Some(pos) = remaining
            .iter()
            .position(|(key, _)| key.to_lowercase() == field_lower)
        {
            let (_, value) = remaining.remove(pos);
            mapping.insert(field.clone(), value.to_string());
        }
    }

    for field in &model.fields {
        if mapping.contains_key(field) {
            continue;
        }
        let field_lower = field.to_lowercase();

        // Longest overlap wins; equal lengths keep the earlier key.
        let mut best: Option<(usize, usize)> = None;
        for (pos, (key, _)) in remaining.iter().enumerate() {
            let key_lower = key.to_lowercase();
            let overlap = if field_lower.contains(&key_lower) {
                key_lower.len()
            } else if key_lower.contains(&field_lower) {
                field_lower.len()
            } else {
                0
            };
            if overlap > best.map_or(0, |(_, top)| top) {
                best = Some((pos, overlap));
            }
        }

        if let Some((pos, _)) = best {
            let (_, value) = remaining.remove(pos);
            mapping.insert(field.clone(), value.to_string());
        }
    }

    for field in &model.fields {
        if mapping.contains_key(field) {
            continue;
        }
        let Some(aliases) = aliases_for(field) else {
            continue;
        };
        for alias in aliases {
            if let Some(pos) = remaining
                .iter()
                .position(|(key, _)| key.to_lowercase() == *alias)
            {
                let (_, value) = remaining.remove(pos);
                mapping.insert(field.clone(), value.to_string());
                break;
            }
        }
    }

    if !remaining.is_empty() {
        log::debug!(
            "Content keys left unmapped for {}: {:?}",
            model.name,
            remaining.iter().map(|(k, _)| *k).collect::<Vec<_>>()
        );
    }

    mapping
}
