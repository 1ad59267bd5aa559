//! CSV 结果文件

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use idcheck_core::PipelineReport;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STATUS_VALID: &str = "有效";
const STATUS_INVALID: &str = "无效";
const NOT_FOUND: &str = "未找到";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 结果文件中的一行，字段名即表头
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub filename: String,
    pub extracted_id: String,
    pub verification_status: String,
    pub timestamp: String,
}

impl ResultRecord {
    pub fn from_report(image: &Path, report: &PipelineReport, now: DateTime<Local>) -> Self {
        let filename = image
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| image.display().to_string());

        Self {
            filename,
            extracted_id: report
                .candidate
                .clone()
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            verification_status: if report.valid {
                STATUS_VALID
            } else {
                STATUS_INVALID
            }
            .to_string(),
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// 追加写入的结果文件，表头只在文件为空时写一次
///
/// `lock` 只在同一个 `ResultLog` 被多个线程共享时起作用：它保证“检查表头”和“追加一行”
/// 作为整体执行。多个进程同时写同一个文件不在保证范围内。
pub struct ResultLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResultRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("创建目录失败: {}", dir.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("打开结果文件失败: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(record)
            .with_context(|| format!("写入结果文件失败: {}", self.path.display()))?;
        writer.flush()?;

        log::debug!("[Records] 已写入 {}: {}", self.path.display(), record.filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use idcheck_verify::DiagnosticCode;

    fn report(candidate: Option<&str>, valid: bool) -> PipelineReport {
        PipelineReport {
            candidate: candidate.map(str::to_string),
            valid,
            diagnostic_code: if valid {
                DiagnosticCode::Valid
            } else {
                DiagnosticCode::NotFound
            },
            diagnostic_message: String::new(),
            fields: None,
            partial_matches: Vec::new(),
            found_by: None,
            recognized_text: Vec::new(),
            attempts: 0,
            engine_failures: Vec::new(),
            engines: Vec::new(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap()
    }

    #[test]
    fn test_record_from_report() {
        let record = ResultRecord::from_report(
            Path::new("/scans/batch1/card.jpg"),
            &report(Some("11010519491231002X"), true),
            now(),
        );
        assert_eq!(record.filename, "card.jpg");
        assert_eq!(record.extracted_id, "11010519491231002X");
        assert_eq!(record.verification_status, "有效");
        assert_eq!(record.timestamp, "2024-03-05 09:07:01");

        let record = ResultRecord::from_report(Path::new("blank.png"), &report(None, false), now());
        assert_eq!(record.extracted_id, "未找到");
        assert_eq!(record.verification_status, "无效");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::new(dir.path().join("out").join("results.csv"));

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            let record = ResultRecord::from_report(Path::new(name), &report(None, false), now());
            log.append(&record).unwrap();
        }

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "filename,extracted_id,verification_status,timestamp");
        assert_eq!(lines[1], "a.jpg,未找到,无效,2024-03-05 09:07:01");
        assert_eq!(content.matches("filename").count(), 1);
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "filename,extracted_id,verification_status,timestamp\nold.jpg,未找到,无效,2024-01-01 00:00:00\n",
        )
        .unwrap();

        let log = ResultLog::new(&path);
        let record = ResultRecord::from_report(
            Path::new("new.jpg"),
            &report(Some("440524198001010013"), true),
            now(),
        );
        log.append(&record).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.matches("filename").count(), 1);
        assert!(content.ends_with("new.jpg,440524198001010013,有效,2024-03-05 09:07:01\n"));
    }

    #[test]
    fn test_shared_log_concurrent_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::new(dir.path().join("results.csv"));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let log = &log;
                scope.spawn(move || {
                    for i in 0..5 {
                        let name = format!("w{}-{}.jpg", worker, i);
                        let record =
                            ResultRecord::from_report(Path::new(&name), &report(None, false), now());
                        log.append(&record).unwrap();
                    }
                });
            }
        });

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 41);
        assert_eq!(lines[0], "filename,extracted_id,verification_status,timestamp");
        assert_eq!(content.matches("filename").count(), 1);
        assert!(lines[1..].iter().all(|line| line.ends_with(",未找到,无效,2024-03-05 09:07:01")));
    }
}
