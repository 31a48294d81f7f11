//! Best-effort parsing of a bundle's `config.json` descriptor.
//!
//! Descriptor schemas vary between model families, so every field is
//! extracted independently: a field with an unexpected type is left empty and
//! never fails the parse.

use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

/// Filename of the descriptor inside a bundle directory.
pub const DESCRIPTOR_FILE: &str = "config.json";

/// Parameter-count labels like `7B`, `1.7b`, `135M`, `350 thousand`.
static PARAMETER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*(k|thousand|m|million|b|billion|t|trillion)?$")
        .expect("parameter label regex is valid")
});

/// Known descriptor fields, each independently optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    pub architectures: Option<Vec<String>>,
    pub model_type: Option<String>,
    pub hidden_size: Option<u64>,
    pub quantization_bits: Option<u64>,
}

impl Descriptor {
    /// Extract known fields from descriptor JSON text.
    ///
    /// Malformed JSON or a non-object document yields an empty descriptor.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::default(),
        }
    }

    /// Read and parse the descriptor in `bundle_dir`, if it can be read.
    pub fn read(bundle_dir: &Path) -> Option<Self> {
        std::fs::read_to_string(bundle_dir.join(DESCRIPTOR_FILE))
            .ok()
            .map(|text| Self::parse(&text))
    }

    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let architectures = object
            .get("architectures")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|items| !items.is_empty());

        let model_type = object
            .get("model_type")
            .and_then(Value::as_str)
            .map(str::to_string);

        let hidden_size = object.get("hidden_size").and_then(as_positive_integer);

        let quantization_bits = object
            .get("quantization")
            .and_then(|q| q.get("bits"))
            .and_then(as_positive_integer);

        Self {
            architectures,
            model_type,
            hidden_size,
            quantization_bits,
        }
    }

    /// Model family: the first declared architecture.
    pub fn family(&self) -> Option<String> {
        self.architectures
            .as_ref()
            .and_then(|a| a.first())
            .cloned()
    }

    /// Rough parameter-size label derived from the hidden dimension.
    ///
    /// This is an order-of-magnitude hint for display only; the hidden size
    /// alone does not determine the parameter count.
    pub fn parameter_size_label(&self) -> Option<String> {
        self.hidden_size
            .map(|hidden| format!("{}M", hidden.saturating_mul(1000) / 1024))
    }

    /// Quantization level such as `4bit`, when declared.
    pub fn quantization_label(&self) -> Option<String> {
        self.quantization_bits.map(|bits| format!("{}bit", bits))
    }
}

/// Accept integers and integral floats (`4096` or `4096.0`).
fn as_positive_integer(value: &Value) -> Option<u64> {
    value.as_u64().filter(|n| *n > 0).or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f > 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

/// Convert a parameter-size label to an absolute count.
///
/// ```
/// use mlx_store::descriptor::parse_parameter_count;
///
/// assert_eq!(parse_parameter_count("7B"), Some(7_000_000_000));
/// assert_eq!(parse_parameter_count("1.7b"), Some(1_700_000_000));
/// assert_eq!(parse_parameter_count("135M"), Some(135_000_000));
/// assert_eq!(parse_parameter_count("huge"), None);
/// ```
pub fn parse_parameter_count(label: &str) -> Option<u64> {
    let normalized = label.trim().to_lowercase().replace(',', "");
    let captures = PARAMETER_LABEL.captures(&normalized)?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let multiplier = match captures.get(2).map(|m| m.as_str()) {
        None => 1.0,
        Some("k" | "thousand") => 1e3,
        Some("m" | "million") => 1e6,
        Some("b" | "billion") => 1e9,
        Some(_) => 1e12,
    };
    Some((number * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_descriptor() {
        let descriptor = Descriptor::parse(
            r#"{
                "architectures": ["LlamaForCausalLM"],
                "model_type": "llama",
                "hidden_size": 2048,
                "quantization": {"group_size": 64, "bits": 4},
                "vocab_size": 128256
            }"#,
        );
        assert_eq!(descriptor.family().as_deref(), Some("LlamaForCausalLM"));
        assert_eq!(descriptor.model_type.as_deref(), Some("llama"));
        assert_eq!(descriptor.parameter_size_label().as_deref(), Some("2000M"));
        assert_eq!(descriptor.quantization_label().as_deref(), Some("4bit"));
    }

    #[test]
    fn test_mismatched_fields_are_left_empty() {
        let descriptor = Descriptor::parse(
            r#"{"architectures": "LlamaForCausalLM", "hidden_size": "big", "quantization": true}"#,
        );
        assert_eq!(descriptor, Descriptor::default());
    }

    #[test]
    fn test_malformed_and_non_object_documents() {
        assert_eq!(Descriptor::parse("{oops"), Descriptor::default());
        assert_eq!(Descriptor::parse("[1, 2]"), Descriptor::default());
    }

    #[test]
    fn test_float_hidden_size() {
        let descriptor = Descriptor::parse(r#"{"hidden_size": 4096.0}"#);
        assert_eq!(descriptor.hidden_size, Some(4096));
        let descriptor = Descriptor::parse(r#"{"hidden_size": 40.5}"#);
        assert_eq!(descriptor.hidden_size, None);
    }

    #[test]
    fn test_parse_parameter_count() {
        assert_eq!(parse_parameter_count("7b"), Some(7_000_000_000));
        assert_eq!(parse_parameter_count(" 3 billion "), Some(3_000_000_000));
        assert_eq!(parse_parameter_count("2000M"), Some(2_000_000_000));
        assert_eq!(parse_parameter_count("350K"), Some(350_000));
        assert_eq!(parse_parameter_count("7,000,000,000"), Some(7_000_000_000));
        assert_eq!(parse_parameter_count(""), None);
        assert_eq!(parse_parameter_count("7x"), None);
    }
}
