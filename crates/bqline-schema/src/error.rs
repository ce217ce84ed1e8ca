//! Stage-tagged generation errors and their process exit codes

use std::fmt;

/// Generation stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Event handling, download, spreadsheet parsing
    Generate,
    Datasets,
    Tables,
    Schema,
    Upload,
}

impl Stage {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Generate => 100,
            Self::Datasets => 101,
            Self::Tables => 102,
            Self::Schema => 103,
            Self::Upload => 104,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Datasets => "datasets",
            Self::Tables => "tables",
            Self::Schema => "schema",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct GenerateError {
    pub stage: Stage,
    pub source: anyhow::Error,
}

impl GenerateError {
    pub fn exit_code(&self) -> u8 {
        self.stage.exit_code()
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {:#}", self.stage, self.source)
    }
}

impl std::error::Error for GenerateError {}

/// Attach a [`Stage`] to a fallible step
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, GenerateError>;
}

impl<T> StageExt<T> for anyhow::Result<T> {
    fn stage(self, stage: Stage) -> Result<T, GenerateError> {
        self.map_err(|source| GenerateError { stage, source })
    }
}
