use thiserror::Error;

use crate::prelude::{FitError, OpticsError, SpreadError};

/// Errors raised while estimating the emittance of a scan.
/// Each one identifies the sample set (experiment or axis) and,
/// where relevant, the field setting it applies to.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no measurement provided")]
    NoMeasurement,
    /// A [crate::prelude::FieldMeasurement] must hold one or two uniquely named sets
    #[error("field {field}: invalid sample sets {names:?}")]
    InvalidSampleSets { field: f64, names: Vec<String> },
    #[error("field {field}: expected sample sets {expected:?}, found {found:?}")]
    MismatchedSampleSets {
        field: f64,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("unknown sample set \"{0}\"")]
    UnknownSampleSet(String),
    #[error("sample set \"{set}\" at field {field}: {source}")]
    Spread {
        set: String,
        field: f64,
        source: SpreadError,
    },
    #[error("field {field}: {source}")]
    Optics { field: f64, source: OpticsError },
    #[error("sample set \"{set}\": {source}")]
    Fit { set: String, source: FitError },
    /// The fit converged but describes an impossible beam matrix
    #[error("sample set \"{set}\": non physical fit (a.c - b²/4 = {determinant:e}, a = {a:e})")]
    NonPhysicalFit {
        set: String,
        determinant: f64,
        a: f64,
    },
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),
}

/// Errors raised when parsing measurement tables
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {found} column(s) does not match {expected} layout")]
    ColumnLayout {
        line: usize,
        expected: &'static str,
        found: usize,
    },
    #[error("line {line}: invalid number \"{content}\"")]
    InvalidNumber { line: usize, content: String },
    #[error("table does not contain any data")]
    EmptyTable,
}
