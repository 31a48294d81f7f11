//! Model format detection for paths and references.

use crate::descriptor::DESCRIPTOR_FILE;
use crate::manifest::has_weights;
use crate::reference::looks_like_bundle_reference;
use std::fmt;
use std::path::Path;

/// On-disk model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Gguf,
    Mlx,
}

impl ModelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Gguf => "GGUF",
            ModelFormat::Mlx => "MLX",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a local path or hub reference.
///
/// A `.gguf` file is GGUF; a directory with a descriptor and weights is MLX;
/// a relative hub-style reference naming an MLX bundle is MLX. Anything else
/// falls back to GGUF, the format single-file models have always used.
pub fn detect_format(path_or_reference: &str) -> ModelFormat {
    let path = Path::new(path_or_reference);

    let is_gguf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gguf"))
        .unwrap_or(false);
    if is_gguf {
        return ModelFormat::Gguf;
    }

    if path.is_dir() && path.join(DESCRIPTOR_FILE).is_file() && has_weights(path) {
        return ModelFormat::Mlx;
    }

    if path_or_reference.contains('/')
        && !path.is_absolute()
        && looks_like_bundle_reference(path_or_reference)
    {
        return ModelFormat::Mlx;
    }

    ModelFormat::Gguf
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gguf_extension() {
        assert_eq!(detect_format("/models/llama.Q4_K_M.GGUF"), ModelFormat::Gguf);
    }

    #[test]
    fn test_bundle_directory_is_mlx() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("config.json"), "{}").unwrap();
        let path = temp_dir.path().to_string_lossy().to_string();
        assert_eq!(detect_format(&path), ModelFormat::Gguf);

        std::fs::write(temp_dir.path().join("model.safetensors"), b"w").unwrap();
        assert_eq!(detect_format(&path), ModelFormat::Mlx);
    }

    #[test]
    fn test_hub_reference() {
        assert_eq!(detect_format("mlx-community/SmolLM2-1.7B-Instruct-4bit"), ModelFormat::Mlx);
        assert_eq!(detect_format("someone/qwen-mlx-q4"), ModelFormat::Mlx);
        assert_eq!(detect_format("someone/plain-model"), ModelFormat::Gguf);
    }

    #[test]
    fn test_display() {
        assert_eq!(ModelFormat::Mlx.to_string(), "MLX");
        assert_eq!(ModelFormat::Gguf.to_string(), "GGUF");
    }
}
