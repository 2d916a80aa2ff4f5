use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Directory, below an install location, that holds model files.
pub const MODEL_DIR_NAME: &str = "cartographer_models";

/// File extension of distributable model files.
pub const MODEL_EXTENSION: &str = "onnx";

/// The nucleic acid component a trained model segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    Phos,
    Sugar,
    Base,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown model type '{0}'. Expected one of: phos, sugar, base")]
pub struct UnknownModelKind(pub String);

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Phos, ModelKind::Sugar, ModelKind::Base];

    pub const fn name(&self) -> &'static str {
        match self {
            ModelKind::Phos => "phos",
            ModelKind::Sugar => "sugar",
            ModelKind::Base => "base",
        }
    }

    /// File name of the model, e.g. `phos.onnx`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name(), MODEL_EXTENSION)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = UnknownModelKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModelKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_file_names_are_lowercase() {
        assert_eq!(ModelKind::Phos.to_string(), "phos");
        assert_eq!(ModelKind::Sugar.file_name(), "sugar.onnx");
        assert_eq!(ModelKind::Base.file_name(), "base.onnx");
    }

    #[test]
    fn parsing_accepts_known_names_only() {
        assert_eq!("PHOS".parse::<ModelKind>(), Ok(ModelKind::Phos));
        assert_eq!(" base ".parse::<ModelKind>(), Ok(ModelKind::Base));
        assert_eq!(
            "rna".parse::<ModelKind>(),
            Err(UnknownModelKind("rna".to_string()))
        );
    }
}
