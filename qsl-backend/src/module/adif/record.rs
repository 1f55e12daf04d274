///! ADIF record parser
///!
///! Maps tokenized fields onto a [`Qso`], derives the timestamp and
///! rejects records without a call sign or date.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use qsl_common::{Qso, QslStatus};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

use super::tokenizer::{RawField, tokenize};

/// Every ADIF field this logbook understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdifField {
    Call,
    QsoDate,
    TimeOn,
    QsoDateOff,
    TimeOff,
    Band,
    Mode,
    Freq,
    RstSent,
    RstRcvd,
    Qth,
    Name,
    Comment,
    GridSquare,
    Country,
    Dxcc,
    MyGridSquare,
    StationCallsign,
    MyRig,
    MyAntenna,
    TxPwr,
    QslSent,
    QslRcvd,
    LotwQslSent,
    LotwQslRcvd,
    EqslQslSent,
    EqslQslRcvd,
}

static FIELD_TABLE: LazyLock<HashMap<&'static str, AdifField>> = LazyLock::new(|| {
    use AdifField::*;
    [
        ("call", Call),
        ("qso_date", QsoDate),
        ("time_on", TimeOn),
        ("qso_date_off", QsoDateOff),
        ("time_off", TimeOff),
        ("band", Band),
        ("mode", Mode),
        ("freq", Freq),
        ("rst_sent", RstSent),
        ("rst_rcvd", RstRcvd),
        ("qth", Qth),
        ("name", Name),
        ("comment", Comment),
        ("gridsquare", GridSquare),
        ("country", Country),
        ("dxcc", Dxcc),
        ("my_gridsquare", MyGridSquare),
        ("station_callsign", StationCallsign),
        ("my_rig", MyRig),
        ("my_antenna", MyAntenna),
        ("tx_pwr", TxPwr),
        ("qsl_sent", QslSent),
        ("qsl_rcvd", QslRcvd),
        ("lotw_qsl_sent", LotwQslSent),
        ("lotw_qsl_rcvd", LotwQslRcvd),
        ("eqsl_qsl_sent", EqslQslSent),
        ("eqsl_qsl_rcvd", EqslQslRcvd),
    ]
    .into_iter()
    .collect()
});

impl AdifField {
    /// Look up a field by its ADIF name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        FIELD_TABLE.get(name.trim().to_lowercase().as_str()).copied()
    }

    /// Write a (trimmed) value into the matching slot of `qso`
    pub fn apply(self, qso: &mut Qso, value: &str) {
        let value = value.trim();
        if self == AdifField::Call {
            qso.call = value.to_uppercase();
        } else if let Some(slot) = self.status_slot(qso) {
            *slot = QslStatus::from_adif(value);
        } else if let Some(slot) = self.text_slot(qso) {
            *slot = value.to_string();
        }
    }

    fn status_slot(self, qso: &mut Qso) -> Option<&mut QslStatus> {
        match self {
            AdifField::QslSent => Some(&mut qso.qsl_sent),
            AdifField::QslRcvd => Some(&mut qso.qsl_rcvd),
            AdifField::LotwQslSent => Some(&mut qso.lotw_qsl_sent),
            AdifField::LotwQslRcvd => Some(&mut qso.lotw_qsl_rcvd),
            AdifField::EqslQslSent => Some(&mut qso.eqsl_qsl_sent),
            AdifField::EqslQslRcvd => Some(&mut qso.eqsl_qsl_rcvd),
            _ => None,
        }
    }

    fn text_slot(self, qso: &mut Qso) -> Option<&mut String> {
        match self {
            AdifField::QsoDate => Some(&mut qso.qso_date),
            AdifField::TimeOn => Some(&mut qso.time_on),
            AdifField::QsoDateOff => Some(&mut qso.qso_date_off),
            AdifField::TimeOff => Some(&mut qso.time_off),
            AdifField::Band => Some(&mut qso.band),
            AdifField::Mode => Some(&mut qso.mode),
            AdifField::Freq => Some(&mut qso.freq),
            AdifField::RstSent => Some(&mut qso.rst_sent),
            AdifField::RstRcvd => Some(&mut qso.rst_rcvd),
            AdifField::Qth => Some(&mut qso.qth),
            AdifField::Name => Some(&mut qso.name),
            AdifField::Comment => Some(&mut qso.comment),
            AdifField::GridSquare => Some(&mut qso.gridsquare),
            AdifField::Country => Some(&mut qso.country),
            AdifField::Dxcc => Some(&mut qso.dxcc),
            AdifField::MyGridSquare => Some(&mut qso.my_gridsquare),
            AdifField::StationCallsign => Some(&mut qso.station_callsign),
            AdifField::MyRig => Some(&mut qso.my_rig),
            AdifField::MyAntenna => Some(&mut qso.my_antenna),
            AdifField::TxPwr => Some(&mut qso.tx_pwr),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required fields (CALL or QSO_DATE)")]
    MissingRequired,
}

/// Build a [`Qso`] from already tokenized fields.
pub fn build_record(fields: &[RawField<'_>]) -> Result<Qso, RecordError> {
    let mut qso = Qso::default();

    for field in fields {
        let Some(kind) = AdifField::from_name(&field.name) else {
            continue;
        };
        let Some(value) = field.value() else {
            continue;
        };
        kind.apply(&mut qso, &value);
    }

    if !qso.qso_date.is_empty() && !qso.time_on.is_empty() {
        qso.timestamp = parse_timestamp(&qso.qso_date, &qso.time_on);
    }

    if qso.call.is_empty() || qso.qso_date.is_empty() {
        return Err(RecordError::MissingRequired);
    }

    Ok(qso)
}

/// Tokenize and build one record chunk.
pub fn parse_record(chunk: &str) -> Result<Qso, RecordError> {
    build_record(&tokenize(chunk))
}

/// Combine "YYYYMMDD" and "HHMMSS" into a UTC instant.
pub fn parse_timestamp(date: &str, time_on: &str) -> Option<DateTime<Utc>> {
    if date.len() != 8 || time_on.len() != 6 {
        return None;
    }
    if !date.bytes().chain(time_on.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let num = |s: &str| s.parse::<u32>().ok();
    let year = date[0..4].parse::<i32>().ok()?;
    let month = num(&date[4..6])?;
    let day = num(&date[6..8])?;
    let hour = num(&time_on[0..2])?;
    let minute = num(&time_on[2..4])?;
    let second = num(&time_on[4..6])?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_lookup_is_case_insensitive() {
        assert_eq!(AdifField::from_name("CALL"), Some(AdifField::Call));
        assert_eq!(AdifField::from_name(" Lotw_Qsl_Rcvd "), Some(AdifField::LotwQslRcvd));
        assert_eq!(AdifField::from_name("app_logger_x"), None);
        assert_eq!(AdifField::from_name("calls"), None);
    }

    #[test]
    fn test_parse_full_record() {
        let qso = parse_record(
            "<call:6> w1aw  <QSO_DATE:8>20240115<TIME_ON:6>143000<BAND:3>20m<MODE:2>CW\
             <NAME:6> Alice<GRIDSQUARE:6>FN31pr<MY_GRIDSQUARE:6>LL75rk\
             <QSL_RCVD:1>Y<LOTW_QSL_SENT:1>R<APP_FOO:3>bar",
        )
        .unwrap();

        assert_eq!(qso.call, "W1AW");
        assert_eq!(qso.qso_date, "20240115");
        assert_eq!(qso.time_on, "143000");
        assert_eq!(qso.band, "20m");
        assert_eq!(qso.mode, "CW");
        assert_eq!(qso.name, "Alice");
        assert_eq!(qso.gridsquare, "FN31pr");
        assert_eq!(qso.my_gridsquare, "LL75rk");
        assert_eq!(qso.qsl_rcvd, QslStatus::Yes);
        assert_eq!(qso.lotw_qsl_sent, QslStatus::Requested);
        assert_eq!(qso.eqsl_qsl_rcvd, QslStatus::Unknown);
        assert_eq!(
            qso.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            parse_record("<QSO_DATE:8>20240115<TIME_ON:6>143000"),
            Err(RecordError::MissingRequired)
        );
        assert_eq!(parse_record("<CALL:4>W1AW"), Err(RecordError::MissingRequired));
        assert_eq!(
            parse_record("<CALL:3>   <QSO_DATE:8>20240115"),
            Err(RecordError::MissingRequired)
        );
    }

    #[test]
    fn test_malformed_time_keeps_record() {
        let qso = parse_record("<CALL:4>W1AW<QSO_DATE:8>20241315<TIME_ON:6>143000").unwrap();
        assert_eq!(qso.timestamp, None);
        let qso = parse_record("<CALL:4>W1AW<QSO_DATE:8>20240115<TIME_ON:4>1430").unwrap();
        assert_eq!(qso.timestamp, None);
        let qso = parse_record("<CALL:4>W1AW<QSO_DATE:8>20240115").unwrap();
        assert_eq!(qso.timestamp, None);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("20231231", "235959"),
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap())
        );
        assert_eq!(parse_timestamp("20230229", "000000"), None);
        assert_eq!(parse_timestamp("20240115", "246000"), None);
        assert_eq!(parse_timestamp("2024-1-5", "143000"), None);
        assert_eq!(parse_timestamp("20240115", "+43000"), None);
    }

    #[test]
    fn test_later_field_overwrites_earlier() {
        let qso = parse_record("<CALL:4>K1AB<QSO_DATE:8>20240115<CALL:4>K1CD").unwrap();
        assert_eq!(qso.call, "K1CD");
    }
}
