use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// QSL confirmation status as carried by the ADIF `*_SENT` / `*_RCVD` fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QslStatus {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
    #[serde(rename = "R")]
    Requested,
    #[serde(rename = "I")]
    Invalid,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl QslStatus {
    /// Map a raw ADIF value onto a status. Anything outside Y/N/R/I is `Unknown`.
    pub fn from_adif(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "Y" => QslStatus::Yes,
            "N" => QslStatus::No,
            "R" => QslStatus::Requested,
            "I" => QslStatus::Invalid,
            _ => QslStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QslStatus::Yes => "Y",
            QslStatus::No => "N",
            QslStatus::Requested => "R",
            QslStatus::Invalid => "I",
            QslStatus::Unknown => "",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, QslStatus::Yes)
    }
}

impl std::fmt::Display for QslStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logged contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Qso {
    /// Other station's call sign, upper case, e.g. "W1AW"
    pub call: String,
    /// Start date, "YYYYMMDD"
    pub qso_date: String,
    /// Start time (UTC), "HHMMSS"
    pub time_on: String,
    /// End date, "YYYYMMDD"
    pub qso_date_off: String,
    /// End time (UTC), "HHMMSS"
    pub time_off: String,
    pub band: String,
    pub mode: String,
    pub freq: String,
    pub rst_sent: String,
    pub rst_rcvd: String,
    pub qth: String,
    pub name: String,
    pub comment: String,
    /// Other station's Maidenhead locator
    pub gridsquare: String,
    pub country: String,
    pub dxcc: String,
    /// Logging station's Maidenhead locator
    pub my_gridsquare: String,
    pub station_callsign: String,
    pub my_rig: String,
    pub my_antenna: String,
    pub tx_pwr: String,
    pub qsl_sent: QslStatus,
    pub qsl_rcvd: QslStatus,
    pub lotw_qsl_sent: QslStatus,
    pub lotw_qsl_rcvd: QslStatus,
    pub eqsl_qsl_sent: QslStatus,
    pub eqsl_qsl_rcvd: QslStatus,
    /// Start of contact derived from `qso_date` + `time_on`
    pub timestamp: Option<DateTime<Utc>>,
}

impl Qso {
    /// "2024-01-15 14:30:00 UTC", falling back to the raw fields
    pub fn format_qso_time(&self) -> String {
        match self.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => format!("{} {} UTC", self.qso_date, self.time_on),
        }
    }

    /// "YYYYMMDD" -> "YYYY-MM-DD"
    pub fn format_date(&self) -> String {
        if self.qso_date.len() == 8 {
            if let (Some(y), Some(m), Some(d)) = (
                self.qso_date.get(0..4),
                self.qso_date.get(4..6),
                self.qso_date.get(6..8),
            ) {
                return format!("{}-{}-{}", y, m, d);
            }
        }
        self.qso_date.clone()
    }

    /// "HHMMSS" -> "HH:MM"
    pub fn format_time(&self) -> String {
        if let (Some(h), Some(m)) = (self.time_on.get(0..2), self.time_on.get(2..4)) {
            return format!("{}:{}", h, m);
        }
        self.time_on.clone()
    }

    /// ISO 3166-1 alpha-2 code used for flag images, empty if unknown
    pub fn flag_code(&self) -> &'static str {
        crate::country::flag_code(&self.country).unwrap_or("")
    }

    pub fn has_grids(&self) -> bool {
        !self.gridsquare.is_empty() && !self.my_gridsquare.is_empty()
    }
}

/// Human friendly relative time, e.g. "3 days ago"
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 12 * MONTH;

    let delta = now.signed_duration_since(then).num_seconds();
    let (secs, suffix) = if delta < 0 {
        (-delta, "from now")
    } else {
        (delta, "ago")
    };

    // (upper bound, singular text, divisor for the plural form)
    let magnitudes: [(i64, &str, i64); 15] = [
        (1, "now", 0),
        (2, "1 second", 0),
        (MINUTE, "seconds", 1),
        (2 * MINUTE, "1 minute", 0),
        (HOUR, "minutes", MINUTE),
        (2 * HOUR, "1 hour", 0),
        (DAY, "hours", HOUR),
        (2 * DAY, "1 day", 0),
        (WEEK, "days", DAY),
        (2 * WEEK, "1 week", 0),
        (MONTH, "weeks", WEEK),
        (2 * MONTH, "1 month", 0),
        (YEAR, "months", MONTH),
        (18 * MONTH, "1 year", 0),
        (2 * YEAR, "2 years", 0),
    ];

    for (bound, text, divisor) in magnitudes {
        if secs < bound {
            return match (text, divisor) {
                ("now", _) => "now".to_string(),
                (_, 0) => format!("{} {}", text, suffix),
                (_, d) => format!("{} {} {}", secs / d, text, suffix),
            };
        }
    }

    format!("{} years {}", secs / YEAR, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Qso {
        Qso {
            call: "W1AW".to_string(),
            qso_date: "20240115".to_string(),
            time_on: "143000".to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()),
            ..Qso::default()
        }
    }

    #[test]
    fn test_format_date_and_time() {
        let qso = sample();
        assert_eq!(qso.format_date(), "2024-01-15");
        assert_eq!(qso.format_time(), "14:30");
        assert_eq!(qso.format_qso_time(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn test_format_falls_back_to_raw() {
        let qso = Qso {
            qso_date: "2024011".to_string(),
            time_on: "14".to_string(),
            ..Qso::default()
        };
        assert_eq!(qso.format_date(), "2024011");
        assert_eq!(qso.format_time(), "14");
        assert_eq!(qso.format_qso_time(), "2024011 14 UTC");
    }

    #[test]
    fn test_qsl_status_from_adif() {
        assert_eq!(QslStatus::from_adif("Y"), QslStatus::Yes);
        assert_eq!(QslStatus::from_adif("n"), QslStatus::No);
        assert_eq!(QslStatus::from_adif(" R "), QslStatus::Requested);
        assert_eq!(QslStatus::from_adif("I"), QslStatus::Invalid);
        assert_eq!(QslStatus::from_adif(""), QslStatus::Unknown);
        assert_eq!(QslStatus::from_adif("V"), QslStatus::Unknown);
    }

    #[test]
    fn test_qsl_status_serializes_as_code() {
        let json = serde_json::to_string(&QslStatus::Requested).unwrap();
        assert_eq!(json, "\"R\"");
        let json = serde_json::to_string(&QslStatus::Unknown).unwrap();
        assert_eq!(json, "\"\"");
    }

    #[test]
    fn test_flag_code() {
        let mut qso = sample();
        qso.country = "Fed. Rep. of Germany".to_string();
        assert_eq!(qso.flag_code(), "de");
        qso.country = "Atlantis".to_string();
        assert_eq!(qso.flag_code(), "");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now, now), "now");
        assert_eq!(time_ago(now - Duration::seconds(30), now), "30 seconds ago");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(time_ago(now - Duration::days(3), now), "3 days ago");
        assert_eq!(time_ago(now - Duration::days(15), now), "2 weeks ago");
        assert_eq!(time_ago(now - Duration::days(100), now), "3 months ago");
        assert_eq!(time_ago(now - Duration::days(400), now), "1 year ago");
        assert_eq!(time_ago(now + Duration::hours(2), now), "2 hours from now");
    }
}
