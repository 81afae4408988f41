//! Section style normalization.
//!
//! Stored styles are free-form JSON. Every read goes through
//! [`normalize_styles`], which yields exactly the keys of [`STYLE_DEFAULTS`].

use serde_json::{Map, Value};

/// The fixed style keys and their defaults.
pub const STYLE_DEFAULTS: [(&str, &str); 8] = [
    ("background_color", "transparent"),
    ("text_color", "inherit"),
    ("heading_color", "inherit"),
    ("font_size", "medium"),
    ("padding_top", "md"),
    ("padding_bottom", "md"),
    ("container_width", "default"),
    ("custom_css_class", ""),
];

/// Default styles as a JSON object.
pub fn default_styles() -> Map<String, Value> {
    STYLE_DEFAULTS
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
        .collect()
}

/// Merge stored styles over the defaults.
///
/// Known keys holding a string or number override the default; numbers are
/// stored as their string form. Unknown keys and other value kinds are dropped.
pub fn normalize_styles(stored: &Value) -> Map<String, Value> {
    let mut styles = default_styles();
    let Some(stored) = stored.as_object() else {
        return styles;
    };

    for (key, default) in styles.iter_mut() {
        match stored.get(key) {
            Some(Value::String(s)) => *default = Value::String(s.clone()),
            Some(Value::Number(n)) => *default = Value::String(n.to_string()),
            _ => {}
        }
    }

    styles
}

/// Apply a partial style update to stored styles and normalize the result.
pub fn merge_styles(stored: &Value, patch: &Value) -> Map<String, Value> {
    let mut merged = normalize_styles(stored);
    for (key, value) in normalize_patch(patch) {
        merged.insert(key, value);
    }
    merged
}

/// Known keys of a patch, coerced like [`normalize_styles`].
fn normalize_patch(patch: &Value) -> Vec<(String, Value)> {
    let Some(patch) = patch.as_object() else {
        return Vec::new();
    };
    STYLE_DEFAULTS
        .iter()
        .filter_map(|(key, _)| match patch.get(*key) {
            Some(Value::String(s)) => Some(((*key).to_string(), Value::String(s.clone()))),
            Some(Value::Number(n)) => Some(((*key).to_string(), Value::String(n.to_string()))),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(map: &Map<String, Value>) -> Vec<&str> {
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn default_keys() -> Vec<&'static str> {
        let mut keys: Vec<&str> = STYLE_DEFAULTS.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn empty_or_non_object_yields_defaults() {
        for stored in [json!({}), json!(null), json!("red"), json!([1, 2])] {
            assert_eq!(normalize_styles(&stored), default_styles());
        }
    }

    #[test]
    fn stored_values_override_known_keys_only() {
        let stored = json!({
            "background_color": "#000",
            "padding_top": 48,
            "z_index": "99",
            "animation": "fade"
        });
        let styles = normalize_styles(&stored);

        assert_eq!(keys(&styles), default_keys());
        assert_eq!(styles["background_color"], "#000");
        assert_eq!(styles["padding_top"], "48");
        assert_eq!(styles["text_color"], "inherit");
    }

    #[test]
    fn null_and_structured_values_keep_default() {
        let stored = json!({"text_color": null, "font_size": {"px": 12}, "heading_color": true});
        let styles = normalize_styles(&stored);
        assert_eq!(styles["text_color"], "inherit");
        assert_eq!(styles["font_size"], "medium");
        assert_eq!(styles["heading_color"], "inherit");
    }

    #[test]
    fn merge_applies_patch_over_stored() {
        let stored = json!({"background_color": "#fff", "text_color": "#111"});
        let patch = json!({"text_color": "#222", "unknown": "x"});
        let merged = merge_styles(&stored, &patch);

        assert_eq!(keys(&merged), default_keys());
        assert_eq!(merged["background_color"], "#fff");
        assert_eq!(merged["text_color"], "#222");
    }
}
