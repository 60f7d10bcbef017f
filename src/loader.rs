//! Document loader.
//!
//! Reads the top level of the data directory into [`Document`]s.
//!
//! | Extension | Strategy | Documents per file |
//! |-----------|----------|--------------------|
//! | `.csv` | comma-delimited, header row | one per non-blank record |
//! | `.tsv` | tab-delimited, header row | one per non-blank record |
//! | anything else | whole file as UTF-8 | one, unless whitespace-only |
//!
//! Hidden files, subdirectories, and files matching `loader.exclude_globs`
//! are skipped. A file that cannot be read or parsed is skipped as a whole
//! and reported in [`LoadReport::failures`]; it never contributes partial
//! rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use rag_harness_core::error::{LoadFailure, RetrievalError};
use rag_harness_core::models::{Document, SourceMetadata};

use crate::config::LoaderConfig;

/// Outcome of scanning the data directory.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Names of files that produced at least one document.
    pub files_loaded: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

/// Load every usable document from `data_dir`.
///
/// # Errors
///
/// - [`RetrievalError::Configuration`] when `data_dir` is not a directory or
///   an exclude glob is invalid.
/// - [`RetrievalError::EmptyCorpus`] when no file yields a document.
pub fn load_documents(
    data_dir: &Path,
    config: &LoaderConfig,
) -> Result<LoadReport, RetrievalError> {
    if !data_dir.is_dir() {
        return Err(RetrievalError::Configuration(format!(
            "data directory does not exist: {}",
            data_dir.display()
        )));
    }

    let exclude_set = build_globset(&config.exclude_globs)?;
    let mut report = LoadReport::default();

    let walker = WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| data_dir.to_path_buf());
                record_failure(&mut report, path, e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || exclude_set.is_match(&name) {
            debug!(file = %name, "skipping file");
            continue;
        }

        let path = entry.path();
        match load_file(path) {
            Ok(docs) if docs.is_empty() => {
                debug!(file = %name, "file has no content");
            }
            Ok(docs) => {
                debug!(file = %name, documents = docs.len(), "loaded file");
                report.documents.extend(docs);
                report.files_loaded.push(name);
            }
            Err(reason) => record_failure(&mut report, path.to_path_buf(), reason),
        }
    }

    if report.documents.is_empty() {
        return Err(RetrievalError::EmptyCorpus {
            data_dir: data_dir.to_path_buf(),
        });
    }

    Ok(report)
}

/// Names of the regular, non-hidden files at the top level of `data_dir`.
///
/// Returns an empty list when the directory is missing.
pub fn data_files(data_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

fn record_failure(report: &mut LoadReport, path: PathBuf, reason: String) {
    let failure = LoadFailure { path, reason };
    warn!("skipping {}", failure);
    report.failures.push(failure);
}

fn load_file(path: &Path) -> Result<Vec<Document>, String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => load_tabular(path, b','),
        "tsv" => load_tabular(path, b'\t'),
        _ => load_text(path),
    }
}

fn load_text(path: &Path) -> Result<Vec<Document>, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = String::from_utf8(bytes).map_err(|_| "invalid UTF-8".to_string())?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Document::new(
        text,
        SourceMetadata::text(path.display().to_string()),
    )])
}

fn load_tabular(path: &Path, delimiter: u8) -> Result<Vec<Document>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let source = path.display().to_string();
    let mut documents = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        let mut fields = BTreeMap::new();
        let mut lines = Vec::with_capacity(headers.len());
        for (column, value) in headers.iter().zip(record.iter()) {
            lines.push(format!("{}: {}", column, value));
            fields.insert(column.to_string(), value.to_string());
        }

        documents.push(Document::new(
            lines.join("\n"),
            SourceMetadata::tabular(source.clone(), row, fields),
        ));
    }

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RetrievalError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            RetrievalError::Configuration(format!("invalid exclude glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RetrievalError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::models::SourceFormat;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &[u8]) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_text_and_tabular_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b_notes.txt", b"Opening hours are 9 to 5.");
        write(
            tmp.path(),
            "a_faq.csv",
            b"question,answer\nWhere?,Lisbon\nWhen?,Monday\n",
        );

        let report = load_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(report.files_loaded, vec!["a_faq.csv", "b_notes.txt"]);
        assert!(report.failures.is_empty());
        assert_eq!(report.documents.len(), 3);

        let first = &report.documents[0];
        assert_eq!(first.text, "question: Where?\nanswer: Lisbon");
        assert_eq!(first.metadata.format, SourceFormat::Tabular);
        assert_eq!(first.metadata.row, Some(0));
        assert_eq!(first.metadata.fields.get("answer").map(String::as_str), Some("Lisbon"));
        assert_eq!(report.documents[1].metadata.row, Some(1));

        let text = &report.documents[2];
        assert_eq!(text.text, "Opening hours are 9 to 5.");
        assert_eq!(text.metadata.format, SourceFormat::Text);
        assert!(text.metadata.source.ends_with("b_notes.txt"));
    }

    #[test]
    fn test_tsv_and_uppercase_extension() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "prices.TSV", b"item\tprice\ncoffee\t1.20\n");

        let report = load_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].text, "item: coffee\nprice: 1.20");
    }

    #[test]
    fn test_blank_rows_and_whitespace_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "rows.csv", b"a,b\n , \nx,y\n");
        write(tmp.path(), "blank.txt", b"   \n\t\n");

        let report = load_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].metadata.row, Some(1));
        assert_eq!(report.files_loaded, vec!["rows.csv"]);
    }

    #[test]
    fn test_hidden_excluded_and_nested_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.md", b"keep me");
        write(tmp.path(), ".hidden.txt", b"secret");
        write(tmp.path(), "old.bak", b"stale");
        fs::create_dir(tmp.path().join("nested")).unwrap();
        write(&tmp.path().join("nested"), "deep.txt", b"deep");

        let config = LoaderConfig {
            exclude_globs: vec!["*.bak".to_string()],
        };
        let report = load_documents(tmp.path(), &config).unwrap();
        assert_eq!(report.files_loaded, vec!["keep.md"]);
        assert_eq!(report.documents.len(), 1);
    }

    #[test]
    fn test_bad_files_are_reported_and_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.txt", b"usable text");
        write(tmp.path(), "binary.txt", &[0xff, 0xfe, 0x00, 0x80]);
        write(tmp.path(), "ragged.csv", b"a,b\n1,2\n3,4,5\n");

        let report = load_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(report.files_loaded, vec!["good.txt"]);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].path.ends_with("binary.txt"));
        assert_eq!(report.failures[0].reason, "invalid UTF-8");
        assert!(report.failures[1].path.ends_with("ragged.csv"));
    }

    #[test]
    fn test_empty_directory_is_empty_corpus() {
        let tmp = TempDir::new().unwrap();
        let err = load_documents(tmp.path(), &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyCorpus { .. }));
    }

    #[test]
    fn test_only_failures_is_empty_corpus() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "binary.txt", &[0xff, 0xfe]);
        let err = load_documents(tmp.path(), &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyCorpus { data_dir } if data_dir == tmp.path()));
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err =
            load_documents(&tmp.path().join("absent"), &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
    }

    #[test]
    fn test_invalid_glob() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"a");
        let config = LoaderConfig {
            exclude_globs: vec!["[".to_string()],
        };
        assert!(matches!(
            load_documents(tmp.path(), &config),
            Err(RetrievalError::Configuration(_))
        ));
    }

    #[test]
    fn test_data_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "z.txt", b"z");
        write(tmp.path(), "a.csv", b"a");
        write(tmp.path(), ".git", b"x");
        assert_eq!(data_files(tmp.path()), vec!["a.csv", "z.txt"]);
        assert!(data_files(&tmp.path().join("missing")).is_empty());
    }
}
