//! End-to-end repair of one file.
//!
//! annotate → detect defects → request fixes → patch → write, strictly in
//! that order. A failed oracle call degrades to a sentinel instead of
//! aborting; only local I/O and workspace violations are errors.

use crate::config::RepairConfig;
use crate::fix::{parse_fix_response, request_fixes, ActionKeywords};
use crate::grammar::Parsed;
use crate::oracle::Oracle;
use crate::patch::{apply_operations, EditOperation, PatchResult};
use crate::report::{detect_defects, ErrorReport};
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::source::SourceFile;
use crate::writer::{write_if_modified, WriteError, WriteOutcome};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("workspace check failed: {0}")]
    Safety(#[from] SafetyError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write: {0}")]
    Write(#[from] WriteError),
}

/// Which oracle round trip a sentinel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DefectAnalysis,
    FixSuggestion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DefectAnalysis => write!(f, "defect analysis"),
            Stage::FixSuggestion => write!(f, "fix suggestion"),
        }
    }
}

/// Everything one run learned about a file.
#[derive(Debug, Clone)]
pub struct RepairReport {
    pub path: PathBuf,
    pub original: String,
    pub defects: Parsed<ErrorReport>,
    pub operations: Parsed<EditOperation>,
    pub patch: PatchResult,
}

#[derive(Debug, Clone)]
#[must_use = "RepairOutcome reports what happened to the file"]
pub enum RepairOutcome {
    /// The oracle reported no defects
    Clean { path: PathBuf },
    /// Defect analysis failed; nothing else was attempted
    OracleUnavailable {
        path: PathBuf,
        stage: Stage,
        reason: String,
    },
    /// Edits were requested but the file was not modified
    Unchanged(Box<RepairReport>),
    /// The file was rewritten
    Repaired(Box<RepairReport>),
    /// Dry run: the file would have been rewritten
    WouldRepair(Box<RepairReport>),
}

impl RepairOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RepairOutcome::Clean { path } | RepairOutcome::OracleUnavailable { path, .. } => path,
            RepairOutcome::Unchanged(report)
            | RepairOutcome::Repaired(report)
            | RepairOutcome::WouldRepair(report) => &report.path,
        }
    }

    pub fn report(&self) -> Option<&RepairReport> {
        match self {
            RepairOutcome::Unchanged(report)
            | RepairOutcome::Repaired(report)
            | RepairOutcome::WouldRepair(report) => Some(report),
            _ => None,
        }
    }
}

/// Runs the repair sequence against one oracle.
pub struct Pipeline<'a> {
    oracle: &'a dyn Oracle,
    config: &'a RepairConfig,
    guard: Option<&'a WorkspaceGuard>,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(oracle: &'a dyn Oracle, config: &'a RepairConfig) -> Self {
        Self {
            oracle,
            config,
            guard: None,
            dry_run: false,
        }
    }

    /// Refuse files the guard rejects.
    pub fn with_guard(mut self, guard: &'a WorkspaceGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Compute everything but never write.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self, path: &Path) -> Result<RepairOutcome, PipelineError> {
        let path = match self.guard {
            Some(guard) => guard.validate_path(path)?,
            None => path.to_path_buf(),
        };

        let source = SourceFile::read(&path).map_err(|source| PipelineError::Read {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), lines = source.len(), "Analysing file");

        let annotated = self.config.annotator().annotate(&source.lines);

        let defects = detect_defects(self.oracle, self.config, &annotated);
        if let Some(reason) = &defects.failure {
            warn!(path = %path.display(), %reason, "Stopping: defect analysis unavailable");
            return Ok(RepairOutcome::OracleUnavailable {
                path,
                stage: Stage::DefectAnalysis,
                reason: reason.clone(),
            });
        }
        if defects.items.is_empty() {
            debug!(path = %path.display(), "No defects reported");
            return Ok(RepairOutcome::Clean { path });
        }

        let operations = request_fixes(self.oracle, self.config, &annotated, &defects.items);
        if let Some(reason) = &operations.failure {
            warn!(path = %path.display(), %reason, "Fix suggestion unavailable");
        }

        let patch = apply_operations(&source.lines, &operations.items);
        let modified = patch.modified;

        let written = if modified && !self.dry_run {
            if let Some(guard) = self.guard {
                guard.revalidate(&path)?;
            }
            Some(write_if_modified(&source, &patch)?)
        } else {
            None
        };

        let report = Box::new(RepairReport {
            original: source.content(),
            path: source.path,
            defects,
            operations,
            patch,
        });

        Ok(match written {
            Some(WriteOutcome::Written { .. }) => RepairOutcome::Repaired(report),
            Some(WriteOutcome::Unchanged { .. }) => RepairOutcome::Unchanged(report),
            None if modified => RepairOutcome::WouldRepair(report),
            None => RepairOutcome::Unchanged(report),
        })
    }
}

/// Patch `source` with a recorded fix response, without any oracle.
pub fn patch_from_response(
    source: &SourceFile,
    response: &str,
    keywords: &ActionKeywords,
) -> (Parsed<EditOperation>, PatchResult) {
    let operations = parse_fix_response(response, keywords);
    let patch = apply_operations(&source.lines, &operations.items);
    (operations, patch)
}
