use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TspliceError {
    #[error("Unknown gene identifier: {0}")]
    UnknownGene(String),

    #[error("Invalid gene name identified: {}", format_invalid_list(.0))]
    InvalidGenes(Vec<String>),

    #[error("No gene names were provided")]
    EmptyGeneList,

    /// The gene resolved but a table needed to draw it has no row for it.
    #[error("Gene {gene} is missing from {table}")]
    MissingGeometry { gene: String, table: &'static str },

    #[error("Unknown isoform: {0}")]
    UnknownIsoform(String),

    #[error("Read feature tables are not available in this data directory")]
    FeaturesUnavailable,

    #[error("Failed to read {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rendered SVG: {0}")]
    Svg(String),

    #[error("PDF conversion failed for {gene}: {reason}")]
    Pdf { gene: String, reason: String },

    #[error("Export aborted at {gene}: {source}")]
    Export {
        gene: String,
        #[source]
        source: Box<TspliceError>,
    },
}

impl TspliceError {
    /// Validation errors are shown to the user; everything else aborts the request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TspliceError::UnknownGene(_)
                | TspliceError::InvalidGenes(_)
                | TspliceError::EmptyGeneList
                | TspliceError::UnknownIsoform(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TspliceError>;

/// Joins invalid names for display, cutting the list after the first 50 entries.
pub fn format_invalid_list(names: &[String]) -> String {
    if names.len() > 50 {
        format!("{}etc...", names[..50].join(", "))
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_invalid_list_is_joined() {
        let names = vec!["foo".to_string(), "bar".to_string()];
        assert_eq!(format_invalid_list(&names), "foo, bar");
    }

    #[test]
    fn long_invalid_list_is_truncated_at_fifty() {
        let names: Vec<String> = (0..60).map(|i| format!("g{}", i)).collect();
        let out = format_invalid_list(&names);
        assert!(out.starts_with("g0, g1"));
        assert!(out.contains("g49etc..."));
        assert!(!out.contains("g50"));
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(TspliceError::UnknownGene("x".into()).is_validation());
        assert!(TspliceError::InvalidGenes(vec![]).is_validation());
        assert!(!TspliceError::FeaturesUnavailable.is_validation());
        let missing = TspliceError::MissingGeometry { gene: "x".into(), table: "genes" };
        assert!(!missing.is_validation());
        assert_eq!(missing.to_string(), "Gene x is missing from genes");
    }
}
