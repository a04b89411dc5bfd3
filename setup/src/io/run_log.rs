//! Run logging helpers for `<output>/runs/`.
//!
//! Every `setup`/`build` invocation leaves one JSON record with the per-step
//! results, independent of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::StepRecord;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub pipeline: String,
    pub started_at: String,
    pub ended_at: String,
    pub failed: bool,
    pub halted_at: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl RunMeta {
    pub fn new(
        pipeline: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        halted_at: Option<String>,
        steps: Vec<StepRecord>,
    ) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            started_at: started_at.to_rfc3339(),
            ended_at: ended_at.to_rfc3339(),
            failed: halted_at.is_some(),
            halted_at,
            steps,
        }
    }
}

/// Path of the record for a run started at `started_at`.
pub fn run_log_path(runs_dir: &Path, pipeline: &str, started_at: DateTime<Utc>) -> PathBuf {
    runs_dir.join(format!(
        "{}-{pipeline}.json",
        started_at.format("%Y%m%dT%H%M%S%.3fZ")
    ))
}

pub fn write_run_log(
    runs_dir: &Path,
    started_at: DateTime<Utc>,
    meta: &RunMeta,
) -> Result<PathBuf> {
    fs::create_dir_all(runs_dir)
        .with_context(|| format!("create runs dir {}", runs_dir.display()))?;
    let path = run_log_path(runs_dir, &meta.pipeline, started_at);
    let mut buf = serde_json::to_string_pretty(meta)?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::core::types::{StepFailure, StepResult};

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, secs)
            .single()
            .expect("valid time")
    }

    #[test]
    fn run_log_paths_are_stable() {
        let path = run_log_path(Path::new("/p/run/runs"), "setup", at(5));
        assert_eq!(
            path,
            PathBuf::from("/p/run/runs/20261018T093005.000Z-setup.json")
        );
    }

    #[test]
    fn writes_run_log_with_failed_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs_dir = temp.path().join("runs");
        let steps = vec![
            StepRecord {
                name: "build-toolkit".to_string(),
                result: StepResult::Failed(StepFailure::ExternalProcess {
                    command: "cmake --build build".to_string(),
                    exit_code: Some(2),
                }),
                best_effort: false,
                duration_ms: 12,
            },
        ];
        let meta = RunMeta::new("build", at(0), at(7), Some("build-toolkit".to_string()), steps);

        let path = write_run_log(&runs_dir, at(0), &meta).expect("write");

        let raw = fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["pipeline"], "build");
        assert_eq!(value["failed"], true);
        assert_eq!(value["halted_at"], "build-toolkit");
        assert_eq!(value["started_at"], "2026-10-18T09:30:00+00:00");
        assert_eq!(value["steps"][0]["result"]["status"], "failed");
        assert_eq!(value["steps"][0]["result"]["failure"]["exit_code"], 2);
    }
}
