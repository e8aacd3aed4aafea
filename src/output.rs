//! Result types returned by conversion and merge jobs.

use crate::config::{ConversionMode, OutputFormat};
use crate::error::FileFailure;
use serde::{Deserialize, Serialize};

/// Output bytes of one transcoded file.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    /// Set when the file was converted through a degraded path.
    pub fallback: Option<Fallback>,
}

impl Transcoded {
    pub fn exact(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            fallback: None,
        }
    }

    pub fn degraded(bytes: Vec<u8>, fallback: Fallback) -> Self {
        Self {
            bytes,
            fallback: Some(fallback),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }
}

/// A documented lower-quality conversion path that was taken instead of
/// failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// HTML could not be rasterised; tags were stripped and the remaining
    /// text was placed as plain text.
    MarkupStripped { reason: String },
}

/// One artifact handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArtifact {
    /// Position of the source file in the job snapshot (0-based).
    pub index: usize,
    /// Source file name.
    pub source: String,
    /// Derived output file name.
    pub name: String,
    /// Size of the artifact in bytes.
    pub bytes: usize,
    pub fallback: Option<Fallback>,
}

/// Summary of a finished conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub mode: ConversionMode,
    /// `None` for to-PDF jobs.
    pub output_format: Option<OutputFormat>,
    pub total_files: usize,
    /// Exported artifacts, ordered by source index.
    pub exported: Vec<ExportedArtifact>,
    /// Failures recorded under `FailurePolicy::ContinueOnError`, by index.
    pub failures: Vec<FileFailure>,
    pub batches: usize,
    pub total_duration_ms: u64,
}

impl JobSummary {
    pub fn converted(&self) -> usize {
        self.exported.len()
    }

    pub fn degraded(&self) -> impl Iterator<Item = &ExportedArtifact> {
        self.exported.iter().filter(|a| a.fallback.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.exported.len() == self.total_files
    }

    /// One-line user-facing summary.
    pub fn message(&self) -> String {
        if self.failures.is_empty() {
            format!("{} files converted successfully", self.converted())
        } else {
            format!(
                "{}/{} files converted ({} failed)",
                self.converted(),
                self.total_files,
                self.failures.len()
            )
        }
    }
}

/// Merged PDF bytes plus bookkeeping.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub pdf: Vec<u8>,
    pub summary: MergeSummary,
}

/// Summary of a finished merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSummary {
    pub files: usize,
    pub pages: usize,
    /// Name the merged PDF was exported under, if it was exported.
    pub output_name: Option<String>,
    pub bytes: usize,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(index: usize, fallback: Option<Fallback>) -> ExportedArtifact {
        ExportedArtifact {
            index,
            source: format!("f{index}.txt"),
            name: format!("f{index}.pdf"),
            bytes: 100,
            fallback,
        }
    }

    #[test]
    fn summary_message_counts_files() {
        let s = JobSummary {
            mode: ConversionMode::ToPdf,
            output_format: None,
            total_files: 2,
            exported: vec![artifact(0, None), artifact(1, None)],
            failures: vec![],
            batches: 1,
            total_duration_ms: 5,
        };
        assert!(s.is_complete());
        assert_eq!(s.message(), "2 files converted successfully");
    }

    #[test]
    fn degraded_artifacts_are_distinguishable() {
        let s = JobSummary {
            mode: ConversionMode::ToPdf,
            output_format: None,
            total_files: 2,
            exported: vec![
                artifact(0, None),
                artifact(
                    1,
                    Some(Fallback::MarkupStripped {
                        reason: "no renderer".into(),
                    }),
                ),
            ],
            failures: vec![],
            batches: 1,
            total_duration_ms: 5,
        };
        let degraded: Vec<_> = s.degraded().map(|a| a.index).collect();
        assert_eq!(degraded, vec![1]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("markup_stripped"));
    }

    #[test]
    fn partial_summary_message() {
        let s = JobSummary {
            mode: ConversionMode::FromPdf,
            output_format: Some(OutputFormat::Html),
            total_files: 3,
            exported: vec![artifact(0, None)],
            failures: vec![
                FileFailure {
                    index: 1,
                    name: "b.pdf".into(),
                    error: "corrupt".into(),
                },
                FileFailure {
                    index: 2,
                    name: "c.pdf".into(),
                    error: "corrupt".into(),
                },
            ],
            batches: 1,
            total_duration_ms: 5,
        };
        assert!(!s.is_complete());
        assert_eq!(s.message(), "1/3 files converted (2 failed)");
    }
}
