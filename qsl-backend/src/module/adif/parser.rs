///! ADIF document parser
///!
///! Drives the tokenizer and record parser over a whole log file.

use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use super::record::parse_record;
use super::tokenizer::{split_records, strip_header};
use crate::error::LogError;
use crate::module::logbook::QsoLog;

/// ADIF log parser
pub struct AdifParser;

impl AdifParser {
    /// Read and parse an ADIF file. Only I/O failures are reported.
    pub async fn parse_file<P: AsRef<Path>>(path: P) -> Result<QsoLog, LogError> {
        let path = path.as_ref();
        let bytes = fs::read(path).await.map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8_lossy(&bytes);
        let log = Self::parse_str(&text);

        info!("Parsed {} QSOs from {:?}", log.len(), path);
        Ok(log)
    }

    /// Parse ADIF text. Malformed or incomplete records are dropped.
    pub fn parse_str(text: &str) -> QsoLog {
        let body = strip_header(text);

        let mut qsos = Vec::new();
        let mut skipped = 0usize;
        for chunk in split_records(body) {
            match parse_record(chunk) {
                Ok(qso) => qsos.push(qso),
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping ADIF record: {}", e);
                }
            }
        }

        if skipped > 0 {
            debug!("Skipped {} invalid ADIF records", skipped);
        }

        QsoLog::new(qsos)
    }
}
