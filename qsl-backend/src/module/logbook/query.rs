///! Logbook queries
///!
///! Read-only views over a [`QsoLog`]: fuzzy lookup by call sign and time,
///! per-call listings, counts, "latest" rankings and the QSL hall of fame.

use chrono::{DateTime, Duration, Utc};
use qsl_common::Qso;
use std::collections::{BTreeMap, HashSet};

use super::types::QsoLog;

/// Trim and upper-case a user supplied call sign.
pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

impl QsoLog {
    /// Find the QSO with `callsign` closest to `target`, at most
    /// `tolerance_minutes` away (inclusive). Ties go to the earlier record in the log.
    /// A tolerance outside chrono's range matches nothing.
    pub fn search(&self, callsign: &str, target: DateTime<Utc>, tolerance_minutes: i64) -> Option<&Qso> {
        let callsign = normalize_callsign(callsign);
        let tolerance = Duration::try_minutes(tolerance_minutes)?;

        let mut best: Option<(&Qso, Duration)> = None;
        for qso in self.qsos().iter().filter(|q| q.call == callsign) {
            let Some(ts) = qso.timestamp else {
                continue;
            };

            let diff = (ts - target).abs();
            if diff > tolerance {
                continue;
            }
            if best.is_none_or(|(_, best_diff)| diff < best_diff) {
                best = Some((qso, diff));
            }
        }

        best.map(|(qso, _)| qso)
    }

    /// All QSOs with `callsign`, in log order.
    pub fn by_callsign(&self, callsign: &str) -> Vec<&Qso> {
        let callsign = normalize_callsign(callsign);
        self.qsos().iter().filter(|q| q.call == callsign).collect()
    }

    pub fn total_count(&self) -> usize {
        self.len()
    }

    /// Number of distinct non-empty `COUNTRY` values.
    pub fn unique_countries_count(&self) -> usize {
        self.qsos()
            .iter()
            .filter(|q| !q.country.is_empty())
            .map(|q| q.country.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Up to `limit` QSOs, newest first. QSOs without a timestamp sort last;
    /// equal timestamps keep log order.
    pub fn latest(&self, limit: usize) -> Vec<&Qso> {
        let mut qsos: Vec<&Qso> = self.qsos().iter().collect();
        qsos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        qsos.truncate(limit);
        qsos
    }

    /// The QSO with the latest timestamp, ignoring QSOs without one.
    pub fn latest_one(&self) -> Option<&Qso> {
        let mut latest: Option<(&Qso, DateTime<Utc>)> = None;
        for qso in self.qsos() {
            let Some(ts) = qso.timestamp else {
                continue;
            };
            if latest.is_none_or(|(_, latest_ts)| ts > latest_ts) {
                latest = Some((qso, ts));
            }
        }
        latest.map(|(qso, _)| qso)
    }

    /// One QSO per call sign with a received paper QSL, sorted by call sign.
    /// A QSO with an operator name beats one without.
    pub fn confirmed_unique(&self) -> Vec<&Qso> {
        let mut seen: BTreeMap<&str, &Qso> = BTreeMap::new();

        for qso in self.qsos().iter().filter(|q| q.qsl_rcvd.is_confirmed()) {
            let keep_existing = seen
                .get(qso.call.as_str())
                .is_some_and(|existing| !existing.name.is_empty() || qso.name.is_empty());
            if !keep_existing {
                seen.insert(qso.call.as_str(), qso);
            }
        }

        seen.into_values().collect()
    }
}
