//! Validate stage: external conformance tools plus the built-in feed check.
//!
//! Validator outcomes are reported, never propagated. Only failing to write
//! the report or the log files is an error.

pub mod feed_check;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ValidatorConfig;
use crate::gtfs::GtfsFeed;
use crate::output::write_json;
use feed_check::{Finding, Severity};

pub const REPORT_FILE: &str = "validation_report.json";
pub const FEED_CHECK: &str = "feed-check";

/// A third-party validator invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct ExternalValidator {
    pub name: String,
    /// `None` when the tool is not configured; the validator is skipped.
    pub program: Option<String>,
    /// Arguments with `{feed}` and `{output}` placeholders.
    pub args: Vec<String>,
}

impl ExternalValidator {
    /// MobilityData `gtfs-validator` and `gtfsvtor`, enabled when their
    /// paths are configured.
    pub fn defaults(config: &ValidatorConfig) -> Vec<Self> {
        let strings = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        let jar = config
            .gtfs_validator_jar
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        vec![
            ExternalValidator {
                name: "gtfs-validator".to_string(),
                program: config.gtfs_validator_jar.as_ref().map(|_| config.java.clone()),
                args: strings(&["-jar", &jar, "-i", "{feed}", "-o", "{output}"]),
            },
            ExternalValidator {
                name: "gtfsvtor".to_string(),
                program: config.gtfsvtor_bin.as_ref().map(|p| p.display().to_string()),
                args: strings(&["{feed}", "-o", "{output}/validation.html"]),
            },
        ]
    }

    pub fn arguments(&self, feed: &Path, output: &Path) -> Vec<String> {
        let feed = feed.display().to_string();
        let output = output.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{feed}", &feed).replace("{output}", &output))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Warning,
    Failed,
    Skipped,
    Unavailable,
}

#[derive(Debug, Serialize)]
pub struct ValidatorReport {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl ValidatorReport {
    fn new(name: &str, status: Status) -> Self {
        Self {
            name: name.to_string(),
            status,
            exit_code: None,
            output: None,
            log: None,
            error: None,
            findings: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub timestamp: DateTime<Utc>,
    pub feed: PathBuf,
    pub validators: Vec<ValidatorReport>,
}

impl ValidationReport {
    pub fn get(&self, name: &str) -> Option<&ValidatorReport> {
        self.validators.iter().find(|v| v.name == name)
    }
}

/// Runs one external validator. Its output goes to `{output_dir}/{name}/`
/// and its exit status, stdout and stderr to `{output_dir}/{name}.log`.
pub async fn run_external(
    validator: &ExternalValidator,
    feed: &Path,
    output_dir: &Path,
) -> Result<ValidatorReport> {
    let Some(program) = validator.program.as_deref() else {
        info!(validator = %validator.name, "Validator not configured, skipping");
        return Ok(ValidatorReport::new(&validator.name, Status::Skipped));
    };

    let output = output_dir.join(&validator.name);
    fs::create_dir_all(&output)
        .with_context(|| format!("cannot create {}", output.display()))?;
    let args = validator.arguments(feed, &output);

    info!(validator = %validator.name, program, ?args, "Running validator");
    let result = Command::new(program).args(&args).output().await;

    let mut report = ValidatorReport::new(&validator.name, Status::Unavailable);
    report.output = Some(output);
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            warn!(validator = %validator.name, program, error = %e, "Validator could not be started");
            report.error = Some(format!("cannot run {program}: {e}"));
            return Ok(report);
        }
    };

    let log_path = output_dir.join(format!("{}.log", validator.name));
    let mut log = format!(
        "$ {} {}\nexit status: {}\n--- stdout ---\n",
        program,
        args.join(" "),
        run.status
    )
    .into_bytes();
    log.extend_from_slice(&run.stdout);
    log.extend_from_slice(b"\n--- stderr ---\n");
    log.extend_from_slice(&run.stderr);
    fs::write(&log_path, log).with_context(|| format!("cannot write {}", log_path.display()))?;

    report.exit_code = run.status.code();
    report.log = Some(log_path);
    report.status = if run.status.success() {
        Status::Passed
    } else {
        Status::Failed
    };
    info!(validator = %validator.name, status = ?report.status, exit_code = ?report.exit_code, "Validator finished");
    Ok(report)
}

/// Reads the feed and runs the structural checks on it.
pub fn run_feed_check(feed: &Path) -> ValidatorReport {
    let mut report = ValidatorReport::new(FEED_CHECK, Status::Passed);
    match GtfsFeed::from_zip(feed) {
        Ok(gtfs) => {
            report.findings = feed_check::check(&gtfs);
            report.status = match report.findings.iter().map(|f| f.severity).max() {
                None => Status::Passed,
                Some(Severity::Warning) => Status::Warning,
                Some(Severity::Error) => Status::Failed,
            };
        }
        Err(e) => {
            report.status = Status::Failed;
            report.error = Some(format!("{:#}", anyhow::Error::from(e)));
        }
    }
    info!(
        validator = FEED_CHECK,
        status = ?report.status,
        findings = report.findings.len(),
        "Feed check finished"
    );
    report
}

/// Validate stage: every configured validator in turn, then the report.
#[tracing::instrument(skip(validators))]
pub async fn run(
    feed: &Path,
    output_dir: &Path,
    validators: &[ExternalValidator],
) -> Result<ValidationReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    let mut reports = Vec::new();
    for validator in validators {
        reports.push(run_external(validator, feed, output_dir).await?);
    }
    reports.push(run_feed_check(feed));

    let report = ValidationReport {
        timestamp: Utc::now(),
        feed: feed.to_path_buf(),
        validators: reports,
    };
    write_json(&output_dir.join(REPORT_FILE), &report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("bmtc_gtfs_validate_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let config = ValidatorConfig {
            java: "java".to_string(),
            gtfs_validator_jar: Some(PathBuf::from("/opt/gtfs-validator.jar")),
            gtfsvtor_bin: None,
        };
        let validators = ExternalValidator::defaults(&config);

        assert_eq!(validators[0].program.as_deref(), Some("java"));
        assert_eq!(
            validators[0].arguments(Path::new("gtfs/bmtc.zip"), Path::new("out/gtfs-validator")),
            vec!["-jar", "/opt/gtfs-validator.jar", "-i", "gtfs/bmtc.zip", "-o", "out/gtfs-validator"]
        );
        assert_eq!(validators[1].program, None);
        assert_eq!(
            validators[1].arguments(Path::new("f.zip"), Path::new("o")),
            vec!["f.zip", "-o", "o/validation.html"]
        );
    }

    #[tokio::test]
    async fn test_unconfigured_validator_is_skipped() {
        let dir = temp_dir("skipped");
        let validators = ExternalValidator::defaults(&ValidatorConfig::default());

        let report = run_external(&validators[1], Path::new("missing.zip"), &dir).await.unwrap();

        assert_eq!(report.status, Status::Skipped);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let dir = temp_dir("unavailable");
        let validator = ExternalValidator {
            name: "nope".to_string(),
            program: Some("/definitely/not/a/validator".to_string()),
            args: vec!["{feed}".to_string()],
        };

        let report = run_external(&validator, Path::new("missing.zip"), &dir).await.unwrap();

        assert_eq!(report.status, Status::Unavailable);
        assert!(report.error.is_some());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_feed_still_writes_report() {
        let dir = temp_dir("report");

        let report = run(Path::new("/no/such/feed.zip"), &dir, &[]).await.unwrap();

        assert_eq!(report.get(FEED_CHECK).map(|r| r.status), Some(Status::Failed));
        assert!(dir.join(REPORT_FILE).exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
