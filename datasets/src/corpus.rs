//! Title/score corpus loading from the tabular item dump.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::{info, warn};

/// Column layout written by the item fetcher.
pub const CORPUS_COLUMNS: [&str; 7] = ["by", "id", "score", "url", "title", "time", "type"];

/// Errors raised while loading a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// The header lacks a column the pipeline consumes.
    #[error("corpus is missing required column `{0}`")]
    MissingColumn(&'static str),
    /// The file has no bytes at all.
    #[error("corpus file {} is empty", .0.display())]
    EmptyFile(PathBuf),
    /// Every row was filtered out.
    #[error("no usable records among {rows} rows after dropping missing titles and scores")]
    NoUsableRecords { rows: usize },
}

/// One usable title/score pair.
#[derive(Clone, Debug, PartialEq)]
pub struct CorpusRecord {
    /// 0-based data row in the source file, kept through filtering.
    pub row: usize,
    pub id: Option<u64>,
    pub title: String,
    pub score: f64,
}

/// Counts of rows seen and dropped while loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub missing_title: usize,
    pub missing_score: usize,
}

impl LoadReport {
    pub fn kept(&self) -> usize {
        self.rows - self.missing_title - self.missing_score
    }
}

/// Positions of the consumed columns in the header.
struct ColumnIndex {
    id: Option<usize>,
    title: usize,
    score: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, CorpusError> {
        let position = |name: &str| headers.iter().position(|header| header == name);
        Ok(Self {
            id: position("id"),
            title: position("title").ok_or(CorpusError::MissingColumn("title"))?,
            score: position("score").ok_or(CorpusError::MissingColumn("score"))?,
        })
    }
}

/// Filtered corpus in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct Corpus {
    records: Vec<CorpusRecord>,
    report: LoadReport,
}

impl Corpus {
    pub fn records(&self) -> &[CorpusRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CorpusRecord> {
        self.records
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses CSV content, dropping rows whose title is missing or blank and
/// rows whose score is missing or not a finite number.
///
/// Header names are trimmed. Short rows are accepted and their absent
/// trailing fields count as missing.
pub fn read_corpus<R: Read>(reader: R) -> Result<Corpus, CorpusError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);
    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        report.rows += 1;

        let Some(title) = record
            .get(columns.title)
            .filter(|title| !title.trim().is_empty())
        else {
            report.missing_title += 1;
            continue;
        };
        let Some(score) = record
            .get(columns.score)
            .and_then(|score| score.trim().parse::<f64>().ok())
            .filter(|score| score.is_finite())
        else {
            report.missing_score += 1;
            continue;
        };
        let id = columns
            .id
            .and_then(|index| record.get(index))
            .and_then(|id| id.trim().parse().ok());
        records.push(CorpusRecord {
            row,
            id,
            title: title.to_string(),
            score,
        });
    }

    if report.missing_title > 0 || report.missing_score > 0 {
        warn!(
            missing_title = report.missing_title,
            missing_score = report.missing_score,
            "dropped corpus rows"
        );
    }
    if records.is_empty() {
        return Err(CorpusError::NoUsableRecords { rows: report.rows });
    }
    info!(rows = report.rows, kept = records.len(), "corpus loaded");
    Ok(Corpus { records, report })
}

/// Memory-mapped corpus file.
pub struct MmapCorpus {
    path: PathBuf,
    mmap: Mmap,
}

impl MmapCorpus {
    pub fn open(path: &Path) -> Result<Self, CorpusError> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(CorpusError::EmptyFile(path.to_path_buf()));
        }
        // The mapping is read once, up front, and not expected to change underneath.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Corpus, CorpusError> {
        read_corpus(&self.mmap[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "by,id,score,url,title,time,type\n";

    #[test]
    fn drops_missing_titles_and_scores_keeping_row_positions() {
        let body = format!(
            "{HEADER}\
             alice,10,5,http://a,Great news today,1,story\n\
             bob,11,1,,,2,story\n\
             carol,12,,,No score here,3,story\n\
             dave,13,7,,   ,4,story\n\
             erin,14,3,,Another title,5,story\n"
        );
        let corpus = read_corpus(body.as_bytes()).unwrap();
        let rows: Vec<usize> = corpus.records().iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 4]);
        assert_eq!(corpus.records()[0].title, "Great news today");
        assert_eq!(corpus.records()[0].score, 5.0);
        assert_eq!(corpus.records()[1].id, Some(14));
        assert_eq!(
            corpus.report(),
            LoadReport {
                rows: 5,
                missing_title: 2,
                missing_score: 1
            }
        );
        assert_eq!(corpus.report().kept(), 2);
    }

    #[test]
    fn non_numeric_score_counts_as_missing() {
        let body = format!("{HEADER}a,1,lots,,Title,1,story\nb,2,2.5,,Other,1,story\n");
        let corpus = read_corpus(body.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.report().missing_score, 1);
    }

    #[test]
    fn padded_header_names_still_bind_columns() {
        let body = "by, id, score, url, title, time, type\na,1,4,,Padded header,1,story\n";
        let corpus = read_corpus(body.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.records()[0].title, "Padded header");
        assert_eq!(corpus.records()[0].id, Some(1));
    }

    #[test]
    fn short_rows_are_dropped_not_fatal() {
        let body = format!("{HEADER}a,1,3,,Complete row,1,story\nb,2,4,,Short\nc,3\n");
        let corpus = read_corpus(body.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.records()[1].title, "Short");
        assert_eq!(corpus.records()[1].row, 1);
        assert_eq!(
            corpus.report(),
            LoadReport {
                rows: 3,
                missing_title: 1,
                missing_score: 0
            }
        );
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let body = "by,id,url,title\na,1,,Hello\n";
        assert!(matches!(
            read_corpus(body.as_bytes()),
            Err(CorpusError::MissingColumn("score"))
        ));
    }

    #[test]
    fn corpus_without_usable_rows_is_fatal() {
        let body = format!("{HEADER}a,1,3,,,1,story\n");
        assert!(matches!(
            read_corpus(body.as_bytes()),
            Err(CorpusError::NoUsableRecords { rows: 1 })
        ));
    }

    #[test]
    fn mmap_corpus_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{HEADER}a,1,3,,Hello world,1,story\n").unwrap();
        file.flush().unwrap();

        let mapped = MmapCorpus::open(file.path()).unwrap();
        let corpus = mapped.load().unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(mapped.path(), file.path());
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            MmapCorpus::open(file.path()),
            Err(CorpusError::EmptyFile(_))
        ));
    }
}
