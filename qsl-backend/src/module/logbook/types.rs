///! Logbook data types

use chrono::{DateTime, Utc};
use qsl_common::Qso;
use serde::Serialize;
use std::path::PathBuf;

/// Parsed QSOs in file order. Never modified after parsing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QsoLog {
    qsos: Vec<Qso>,
}

impl QsoLog {
    pub fn new(qsos: Vec<Qso>) -> Self {
        Self { qsos }
    }

    pub fn qsos(&self) -> &[Qso] {
        &self.qsos
    }

    pub fn len(&self) -> usize {
        self.qsos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qsos.is_empty()
    }
}

impl From<Vec<Qso>> for QsoLog {
    fn from(qsos: Vec<Qso>) -> Self {
        Self::new(qsos)
    }
}

/// The log currently being served, together with where and when it was loaded
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    /// ADIF file this snapshot was read from
    pub path: PathBuf,
    /// When the file was parsed
    pub loaded_at: DateTime<Utc>,
    pub log: QsoLog,
}
