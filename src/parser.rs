// 🧾 Field Parser - raw CSV rows and total cell parsers
//
// Every cell of the change-out export arrives as optional text. The parsers
// below turn a cell into a typed value or None; they never fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;

// ============================================================================
// RAW ROW
// ============================================================================

/// One denormalized CSV row, exactly as exported (header names included).
///
/// Empty cells deserialize to `None`; columns missing from the header row are
/// `None` as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvRow {
    // Address
    #[serde(rename = "Location_ICN")]
    pub location_icn: Option<String>,
    #[serde(rename = "Location_Address_Line1")]
    pub location_address_line1: Option<String>,
    #[serde(rename = "Serv_Pt_ID")]
    pub serv_pt_id: Option<String>,
    #[serde(rename = "Mtr_Desc")]
    pub mtr_desc: Option<String>,
    #[serde(rename = "Location_Latitude")]
    pub location_latitude: Option<String>,
    #[serde(rename = "Location_Longitude")]
    pub location_longitude: Option<String>,
    #[serde(rename = "Location_Height")]
    pub location_height: Option<String>,
    #[serde(rename = "Building_Year")]
    pub building_year: Option<String>,
    #[serde(rename = "Building_Status")]
    pub building_status: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
    #[serde(rename = "Zip")]
    pub zip: Option<String>,
    #[serde(rename = "Serv_Est_Date")]
    pub serv_est_date: Option<String>,
    #[serde(rename = "Serv_Year_Final")]
    pub serv_year_final: Option<String>,
    #[serde(rename = "SL_Install_Ticket_Date")]
    pub sl_install_ticket_date: Option<String>,
    #[serde(rename = "SL_Material_US")]
    pub sl_material_us: Option<String>,
    #[serde(rename = "SL_Material_Cust_Side")]
    pub sl_material_cust_side: Option<String>,

    // Meter
    #[serde(rename = "Rte_No")]
    pub rte_no: Option<String>,
    #[serde(rename = "Read_Sequence")]
    pub read_sequence: Option<String>,
    #[serde(rename = "Read_Order")]
    pub read_order: Option<String>,
    #[serde(rename = "Meter_SN")]
    pub meter_sn: Option<String>,
    #[serde(rename = "Meter_Manufacturer")]
    pub meter_manufacturer: Option<String>,
    #[serde(rename = "Meter_Size_Desc")]
    pub meter_size_desc: Option<String>,
    #[serde(rename = "Lat_DD")]
    pub lat_dd: Option<String>,
    #[serde(rename = "Lon_DD")]
    pub lon_dd: Option<String>,

    // Endpoint
    #[serde(rename = "Endpoint_SN")]
    pub endpoint_sn: Option<String>,

    // GIS record
    #[serde(rename = "OBJECTID")]
    pub object_id: Option<String>,
    #[serde(rename = "CollectedBy")]
    pub collected_by: Option<String>,
    #[serde(rename = "DeviceType")]
    pub device_type: Option<String>,
    #[serde(rename = "DeviceID")]
    pub device_id: Option<String>,
    #[serde(rename = "CorrStatus")]
    pub corr_status: Option<String>,
    #[serde(rename = "CorrSource")]
    pub corr_source: Option<String>,
    #[serde(rename = "CreationDateTime")]
    pub creation_date_time: Option<String>,
    #[serde(rename = "UpdateDateTime")]
    pub update_date_time: Option<String>,
    #[serde(rename = "HorizEstAcc")]
    pub horiz_est_acc: Option<String>,
    #[serde(rename = "VertEstAcc")]
    pub vert_est_acc: Option<String>,
    #[serde(rename = "GeomCaptureType")]
    pub geom_capture_type: Option<String>,
    #[serde(rename = "XCurrentMapCS")]
    pub x_current_map_cs: Option<String>,
    #[serde(rename = "YCurrentMapCS")]
    pub y_current_map_cs: Option<String>,
    #[serde(rename = "PDOP")]
    pub pdop: Option<String>,
    #[serde(rename = "HDOP")]
    pub hdop: Option<String>,
    #[serde(rename = "TaskName")]
    pub task_name: Option<String>,
    #[serde(rename = "ProjectName")]
    pub project_name: Option<String>,
    #[serde(rename = "FeatureHeight")]
    pub feature_height: Option<String>,
    #[serde(rename = "AccuracyReporting")]
    pub accuracy_reporting: Option<String>,
    #[serde(rename = "AutoIncrementAlpha")]
    pub auto_increment_alpha: Option<String>,
    #[serde(rename = "AutoIncrementNumeric")]
    pub auto_increment_numeric: Option<String>,
    #[serde(rename = "SL_Size")]
    pub sl_size: Option<String>,
    #[serde(rename = "Class_Source_Util")]
    pub class_source_util: Option<String>,
    #[serde(rename = "Class_Source_Cust")]
    pub class_source_cust: Option<String>,
    #[serde(rename = "SL_Material_All")]
    pub sl_material_all: Option<String>,
}

/// CSV reader configured for the change-out export.
///
/// Cells are trimmed at the source so natural keys compare the same way in
/// memory and in the store. Rows with a short or long field count are still
/// handed to serde instead of failing the whole reader.
pub fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

// ============================================================================
// CELL PARSERS (total functions)
// ============================================================================

/// Text cell: blank is absent.
pub fn parse_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Integer cell: surrounding whitespace and a leading sign are accepted.
pub fn parse_int(value: Option<&str>) -> Option<i32> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<i32>().ok()
}

/// Decimal cell, culture invariant: `.` is the decimal point, `,` only groups
/// thousands, exponent notation is allowed.
pub fn parse_decimal(value: Option<&str>) -> Option<Decimal> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }

    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(decimal) = Decimal::from_str(&cleaned) {
        return Some(decimal);
    }

    // Exponent form, limited to what a 96-bit mantissa can represent.
    let (_, exponent) = cleaned.split_once(['e', 'E'])?;
    let exponent = exponent.parse::<i32>().ok()?;
    if exponent.abs() > 28 {
        return None;
    }
    Decimal::from_scientific(&cleaned).ok()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%B %d, %Y"];

/// Timestamp cell. Offsets are normalized to UTC wall time; bare dates land on
/// midnight.
pub fn parse_datetime(value: Option<&str>) -> Option<NaiveDateTime> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_int_accepts_sign_and_whitespace() {
        assert_eq!(parse_int(Some(" 42 ")), Some(42));
        assert_eq!(parse_int(Some("-7")), Some(-7));
        assert_eq!(parse_int(Some("+7")), Some(7));
    }

    #[test]
    fn test_parse_int_rejects_garbage() {
        assert_eq!(parse_int(None), None);
        assert_eq!(parse_int(Some("")), None);
        assert_eq!(parse_int(Some("   ")), None);
        assert_eq!(parse_int(Some("12a")), None);
        assert_eq!(parse_int(Some("1.5")), None);
        assert_eq!(parse_int(Some("99999999999")), None);
    }

    #[test]
    fn test_parse_decimal_is_culture_invariant() {
        assert_eq!(parse_decimal(Some("41.2551")), Decimal::from_str("41.2551").ok());
        assert_eq!(parse_decimal(Some("1,234.5")), Decimal::from_str("1234.5").ok());
        assert_eq!(parse_decimal(Some("-96.01")), Decimal::from_str("-96.01").ok());
        assert_eq!(parse_decimal(Some("1.5e3")), Decimal::from_str("1500").ok());
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert_eq!(parse_decimal(Some("")), None);
        assert_eq!(parse_decimal(Some(",")), None);
        assert_eq!(parse_decimal(Some("N/A")), None);
        assert_eq!(parse_decimal(Some("1.2.3")), None);
    }

    #[test]
    fn test_parse_datetime_common_forms() {
        let iso = parse_datetime(Some("2023-04-05T13:14:15Z")).unwrap();
        assert_eq!((iso.year(), iso.month(), iso.day(), iso.hour()), (2023, 4, 5, 13));

        let offset = parse_datetime(Some("2023-04-05T13:14:15-05:00")).unwrap();
        assert_eq!(offset.hour(), 18);

        let us = parse_datetime(Some("4/5/2023 1:14:15 PM")).unwrap();
        assert_eq!((us.month(), us.day(), us.hour()), (4, 5, 13));

        let spaced = parse_datetime(Some("2023-04-05 13:14:15.250")).unwrap();
        assert_eq!(spaced.minute(), 14);

        let date_only = parse_datetime(Some("04/05/2023")).unwrap();
        assert_eq!((date_only.day(), date_only.hour()), (5, 0));
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert_eq!(parse_datetime(Some("not a date")), None);
        assert_eq!(parse_datetime(Some("2023-13-45")), None);
        assert_eq!(parse_datetime(Some(" ")), None);
        assert_eq!(parse_datetime(None), None);
    }

    #[test]
    fn test_parsers_are_total_on_arbitrary_input() {
        let samples = [
            "", " ", "\t\n", "-", "+", ".", ",", "e", "1e999999", "NaN", "inf",
            "0x1F", "١٢٣", "💧", "12/31", "31/12/2023", "9999-99-99", "--1",
            "1,,,", "\u{0}", "9223372036854775808", "0.000000000000000000000000000001",
        ];

        for sample in samples {
            let _ = parse_int(Some(sample));
            let _ = parse_decimal(Some(sample));
            let _ = parse_datetime(Some(sample));
            let _ = parse_text(Some(sample));
        }
    }

    #[test]
    fn test_parse_text_blank_is_absent() {
        assert_eq!(parse_text(Some("  ")), None);
        assert_eq!(parse_text(Some(" Main ")), Some("Main".to_string()));
    }

    #[test]
    fn test_csv_reader_maps_headers_and_blanks() {
        let data = "Location_Address_Line1,City,Zip,Meter_SN,Endpoint_SN\n 12 Elm St ,Springfield,,1001,\n";
        let mut reader = csv_reader(data.as_bytes());

        let rows: Vec<CsvRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location_address_line1.as_deref(), Some("12 Elm St"));
        assert_eq!(rows[0].zip, None);
        assert_eq!(rows[0].endpoint_sn, None);
        assert_eq!(rows[0].meter_sn.as_deref(), Some("1001"));
        assert_eq!(rows[0].object_id, None, "missing column is absent");
    }
}
