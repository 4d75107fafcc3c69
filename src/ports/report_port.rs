//! Report output port trait.

use std::path::{Path, PathBuf};

use crate::domain::batch::BatchReport;
use crate::domain::error::LagcastError;

pub trait ReportPort {
    /// Write every artefact for `report` under `output_dir` and return the
    /// paths written.
    fn write_report(
        &self,
        report: &BatchReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LagcastError>;
}
