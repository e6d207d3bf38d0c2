//! Line-delimited JSON corpus source.
//!
//! Each line is one product-question record carrying `question_text` and a
//! list of `answers`; only the first answer is consumed. A configurable
//! cutoff bounds how many records are read, so ingestion is bounded rather
//! than streaming-to-completion by default.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::types::TextRecord;

/// Raw record shape as found in the corpus file. Fields other than the
/// question and its answers are present in the data but not consumed.
#[derive(Debug, Deserialize)]
struct RawRecord {
    question_text: String,
    #[serde(default)]
    answers: Vec<RawAnswer>,
}

#[derive(Debug, Deserialize)]
struct RawAnswer {
    answer_text: String,
}

/// Reader for a line-delimited JSON question-answer corpus.
#[derive(Debug, Clone)]
pub struct CorpusReader {
    path: PathBuf,
    cutoff: Option<usize>,
}

impl CorpusReader {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cutoff: None,
        }
    }

    /// Limits how many records are read. `None` reads the whole file.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: Option<usize>) -> Self {
        self.cutoff = cutoff;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads up to `cutoff` records, in source order.
    ///
    /// Records with an empty question or an empty answer list are skipped
    /// with a warning; the cutoff counts accepted records only. A line that
    /// fails to decode is a hard error since it usually means the file is
    /// not the expected format.
    pub fn read(&self) -> PipelineResult<Vec<TextRecord>> {
        let file = File::open(&self.path).map_err(|source| PipelineError::CorpusRead {
            path: self.path.clone(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            if let Some(cutoff) = self.cutoff
                && records.len() >= cutoff
            {
                break;
            }

            let line = line.map_err(|source| PipelineError::CorpusRead {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let line_number = index + 1;
            let raw: RawRecord =
                serde_json::from_str(&line).map_err(|e| PipelineError::CorpusDecode {
                    line: line_number,
                    reason: e.to_string(),
                })?;

            let Some(first_answer) = raw.answers.into_iter().next() else {
                warn!(line = line_number, "skipping record with no answers");
                continue;
            };
            let Some(record) = TextRecord::new(raw.question_text, first_answer.answer_text) else {
                warn!(line = line_number, "skipping record with empty question");
                continue;
            };
            records.push(record);
        }

        debug!(
            path = %self.path.display(),
            count = records.len(),
            "corpus read complete"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn corpus_line(question: &str, answers: &[&str]) -> String {
        let answers: Vec<serde_json::Value> = answers
            .iter()
            .map(|a| serde_json::json!({"answer_text": a}))
            .collect();
        serde_json::json!({
            "question_id": "Tx1",
            "question_text": question,
            "asin": "B000LSZ2D6",
            "answers": answers,
        })
        .to_string()
    }

    fn write_corpus(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn reads_records_in_source_order_taking_first_answer() {
        let file = write_corpus(&[
            corpus_line("does this work with xbox?", &["yes with an adapter", "maybe"]),
            corpus_line("is this waterproof?", &["no"]),
        ]);

        let records = CorpusReader::new(file.path()).read().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question(), "does this work with xbox?");
        assert_eq!(records[0].answer(), "yes with an adapter");
        assert_eq!(records[1].question(), "is this waterproof?");
    }

    #[test]
    fn cutoff_bounds_ingestion_to_exact_count() {
        let lines: Vec<String> = (0..5)
            .map(|i| corpus_line(&format!("question {i}?"), &["answer"]))
            .collect();
        let file = write_corpus(&lines);

        let records = CorpusReader::new(file.path())
            .with_cutoff(Some(2))
            .read()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question(), "question 0?");
        assert_eq!(records[1].question(), "question 1?");
    }

    #[test]
    fn skips_records_without_answers_or_question() {
        let file = write_corpus(&[
            corpus_line("unanswered?", &[]),
            corpus_line("", &["orphan answer"]),
            corpus_line("kept?", &["yes"]),
        ]);

        let records = CorpusReader::new(file.path()).read().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question(), "kept?");
    }

    #[test]
    fn skipped_records_do_not_consume_the_cutoff() {
        let file = write_corpus(&[
            corpus_line("unanswered?", &[]),
            corpus_line("first kept?", &["a"]),
            corpus_line("second kept?", &["b"]),
        ]);

        let records = CorpusReader::new(file.path())
            .with_cutoff(Some(2))
            .read()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question(), "first kept?");
    }

    #[test]
    fn malformed_line_is_a_hard_error() {
        let file = write_corpus(&[
            corpus_line("fine?", &["yes"]),
            "{not json".to_string(),
        ]);

        let err = CorpusReader::new(file.path()).read().unwrap_err();
        match err {
            PipelineError::CorpusDecode { line, .. } => assert_eq!(line, 2),
            other => panic!("expected CorpusDecode, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = CorpusReader::new("/nonexistent/corpus.json")
            .read()
            .unwrap_err();
        assert_eq!(err.status_code(), "CORPUS_READ_ERROR");
    }
}
