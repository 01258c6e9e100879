//! AMeDAS URL builders and parsers.

use chrono::{NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::current_slot_hour;
use crate::error::FetchError;

/// Root of the AMeDAS JSON data tree.
pub const AMEDAS_DATA_BASE: &str = "https://www.jma.go.jp/bosai/amedas/data";

/// Plain-text file holding the timestamp of the newest observation.
pub const LATEST_TIME_URL: &str = "https://www.jma.go.jp/bosai/amedas/data/latest_time.txt";

static LATEST_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):\d{2}:\d{2}").unwrap());

static AMDNO: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#&?]amdno=(\d+)").unwrap());

/// Point series URL for one station and 3-hour slot (`hh` is `00`, `03`, ... `21`).
pub fn point_url(code: &str, yyyymmdd: &str, hh: &str) -> String {
    format!("{AMEDAS_DATA_BASE}/point/{code}/{yyyymmdd}_{hh}.json")
}

/// Point series URL of the slot containing `at`.
pub fn point_url_at(code: &str, at: NaiveDateTime) -> String {
    let hh = format!("{:02}", current_slot_hour(at));
    point_url(code, &at.format("%Y%m%d").to_string(), &hh)
}

/// Whole-country snapshot URL for `at`, truncated to the minute.
pub fn map_url_at(at: NaiveDateTime) -> String {
    format!(
        "{AMEDAS_DATA_BASE}/map/{}{:02}00.json",
        at.format("%Y%m%d%H"),
        at.minute()
    )
}

/// Converts a `latest_time.txt` body (`yyyy-mm-ddThh:mm:ss+09:00`) into the
/// `(yyyymmdd, hh)` pair of its point slot.
pub fn latest_time_to_slot(latest_time: &str) -> Result<(String, String), FetchError> {
    let caps = LATEST_TIME
        .captures(latest_time.trim())
        .ok_or_else(|| FetchError::InvalidLatestTime(latest_time.to_string()))?;
    let hour: u32 = caps[4]
        .parse()
        .map_err(|_| FetchError::InvalidLatestTime(latest_time.to_string()))?;
    let slot = hour / 3 * 3;
    Ok((format!("{}{}{}", &caps[1], &caps[2], &caps[3]), format!("{slot:02}")))
}

/// Station code from an AMeDAS page URL such as `.../amedas/#amdno=44132`.
pub fn amdno_from_page_url(url: &str) -> Result<String, FetchError> {
    AMDNO
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| FetchError::MissingStationCode(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_point_url() {
        assert_eq!(
            point_url("44132", "20240101", "06"),
            "https://www.jma.go.jp/bosai/amedas/data/point/44132/20240101_06.json"
        );
    }

    #[test]
    fn test_point_url_at_floors_to_slot() {
        assert_eq!(
            point_url_at("44132", at(14, 50)),
            "https://www.jma.go.jp/bosai/amedas/data/point/44132/20240305_12.json"
        );
        assert_eq!(
            point_url_at("44132", at(0, 0)),
            "https://www.jma.go.jp/bosai/amedas/data/point/44132/20240305_00.json"
        );
    }

    #[test]
    fn test_map_url_at() {
        assert_eq!(
            map_url_at(at(9, 40)),
            "https://www.jma.go.jp/bosai/amedas/data/map/20240305094000.json"
        );
    }

    #[test]
    fn test_latest_time_to_slot() {
        let (date, hh) = latest_time_to_slot("2024-01-01T23:50:00+09:00\n").unwrap();
        assert_eq!(date, "20240101");
        assert_eq!(hh, "21");

        let (_, hh) = latest_time_to_slot("2024-01-01T02:00:00+09:00").unwrap();
        assert_eq!(hh, "00");
    }

    #[test]
    fn test_latest_time_invalid() {
        assert!(matches!(
            latest_time_to_slot("yesterday"),
            Err(FetchError::InvalidLatestTime(_))
        ));
    }

    #[test]
    fn test_amdno_from_page_url() {
        assert_eq!(
            amdno_from_page_url("https://www.jma.go.jp/bosai/amedas/#area_type=offices&amdno=44132")
                .unwrap(),
            "44132"
        );
        assert_eq!(
            amdno_from_page_url("https://www.jma.go.jp/bosai/amedas/#amdno=62078&format=table1h")
                .unwrap(),
            "62078"
        );
        assert!(amdno_from_page_url("https://www.jma.go.jp/bosai/amedas/").is_err());
    }
}
