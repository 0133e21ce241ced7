use crate::anki::{is_cloze_model, FieldMap};
use crate::error::GatewayError;

pub fn has_cloze_markers(text: &str) -> bool {
    text.contains("{{c") && text.contains("}}")
}

pub fn check_cloze_text(text: &str, field: &str) -> Result<(), GatewayError> {
    if has_cloze_markers(text) {
        Ok(())
    } else {
        Err(GatewayError::ClozeSyntax {
            field: field.to_string(),
            received: text.to_string(),
        })
    }
}

/// Cloze rule shared by every creation path.
///
/// Only applies to cloze note types. A non-empty `Text` or `Front` value must carry the
/// markers; without one, any field carrying them is accepted.
pub fn check_cloze_fields(model_name: &str, fields: &FieldMap) -> Result<(), GatewayError> {
    if !is_cloze_model(model_name) {
        return Ok(());
    }

    let primary = fields.iter().find(|(name, value)| {
        let name = name.to_lowercase();
        (name == "text" || name == "front") && !value.is_empty()
    });
    if let Some((name, value)) = primary {
        return check_cloze_text(value, name);
    }

    if fields.values().any(|v| has_cloze_markers(v)) {
        Ok(())
    } else {
        Err(GatewayError::ClozeSyntax {
            field: "Text".to_string(),
            received: String::new(),
        })
    }
}
