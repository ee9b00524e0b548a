//! Parsing of Sentinel product titles.
//!
//! Titles follow the ESA naming convention, e.g.
//! `S2A_MSIL2A_20240614T101031_N0510_R022_T32TQM_20240614T161608.SAFE` and
//! `S1A_IW_GRDH_1SDV_20240101T053012_20240101T053037_051922_064618_1B7E.SAFE`.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static S2_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^S2[A-Z]_MSI[A-Z0-9]+_(\d{8}T\d{6})_N\d+_R\d+_([0-9A-Z]+)_\d{8}T\d{6}")
        .unwrap()
});

static S1_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^S1[A-Z]_[A-Z0-9]+_[A-Z0-9]+_[A-Z0-9]+_(\d{8}T\d{6})_(\d{8}T\d{6})_").unwrap()
});

/// Fields extracted from a Sentinel-2 title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S2Title {
    /// Sensing start, `YYYYMMDDTHHMMSS`.
    pub sensing_time: String,
    /// MGRS tile, e.g. `T32TQM`.
    pub tile: String,
}

/// Fields extracted from a Sentinel-1 title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S1Title {
    pub start_time: String,
    pub stop_time: String,
}

/// Parse a Sentinel-2 title. Returns `None` if it does not match the convention.
pub fn parse_s2_title(title: &str) -> Option<S2Title> {
    let caps = S2_TITLE.captures(title)?;
    Some(S2Title {
        sensing_time: caps.get(1)?.as_str().to_string(),
        tile: caps.get(2)?.as_str().to_string(),
    })
}

/// Parse a Sentinel-1 title. Returns `None` if it does not match the convention.
pub fn parse_s1_title(title: &str) -> Option<S1Title> {
    let caps = S1_TITLE.captures(title)?;
    Some(S1Title {
        start_time: caps.get(1)?.as_str().to_string(),
        stop_time: caps.get(2)?.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s2() {
        let t = parse_s2_title("S2A_MSIL2A_20240614T101031_N0510_R022_T32TQM_20240614T161608.SAFE")
            .unwrap();
        assert_eq!(t.sensing_time, "20240614T101031");
        assert_eq!(t.tile, "T32TQM");
    }

    #[test]
    fn test_parse_s2_l1c() {
        let t = parse_s2_title("S2B_MSIL1C_20230102T100409_N0509_R122_T33TUG_20230102T105839.SAFE")
            .unwrap();
        assert_eq!(t.tile, "T33TUG");
    }

    #[test]
    fn test_parse_s1() {
        let t = parse_s1_title(
            "S1A_IW_GRDH_1SDV_20240101T053012_20240101T053037_051922_064618_1B7E.SAFE",
        )
        .unwrap();
        assert_eq!(t.start_time, "20240101T053012");
        assert_eq!(t.stop_time, "20240101T053037");
    }

    #[test]
    fn test_malformed_titles() {
        assert!(parse_s2_title("not a product").is_none());
        assert!(parse_s1_title("S2A_MSIL2A_20240614T101031_N0510_R022_T32TQM").is_none());
        assert!(parse_s1_title("S1A_IW_GRDH_1SDV_2024_20240101T053037_").is_none());
    }
}
