/// GHCN-Daily provenance flag tables.
///
/// Each table maps a single-character code to its official description and
/// the score adjustment it carries. Adding a code is a data change here;
/// the scorer in `quality` never branches on individual codes.
///
/// Source: GHCN-Daily readme (ftp.ncdc.noaa.gov/pub/data/ghcn/daily/readme.txt)

use crate::model::FlagPosition;

/// Deduction for any quality-position code (every QFLAG is a failed check).
pub const CRITICAL_QUALITY_PENALTY: f64 = -20.0;

/// Deduction for measurement codes that mark a derived or estimated value.
pub const WARNING_MEASUREMENT_PENALTY: f64 = -5.0;

/// Largest magnitude a source code may move the score.
pub const MAX_SOURCE_ADJUSTMENT: f64 = 10.0;

pub struct FlagCode {
    pub code: char,
    pub description: &'static str,
    pub adjustment: f64,
}

const fn flag(code: char, description: &'static str, adjustment: f64) -> FlagCode {
    FlagCode { code, description, adjustment }
}

// ---------------------------------------------------------------------------
// MFLAG
// ---------------------------------------------------------------------------

pub static MEASUREMENT_FLAGS: &[FlagCode] = &[
    flag('B', "Precipitation total formed from two 12-hour totals", 0.0),
    flag('D', "Precipitation total formed from four six-hour totals", 0.0),
    flag('H', "Highest or lowest hourly temperature, or average of hourly values", WARNING_MEASUREMENT_PENALTY),
    flag('K', "Converted from knots", 0.0),
    flag('L', "Temperature appears to be lagged with respect to reported hour of observation", WARNING_MEASUREMENT_PENALTY),
    flag('O', "Converted from oktas", 0.0),
    flag('P', "Identified as \"missing presumed zero\" in DSI 3200 and 3206", WARNING_MEASUREMENT_PENALTY),
    flag('T', "Trace of precipitation, snowfall, or snow depth", WARNING_MEASUREMENT_PENALTY),
    flag('W', "Converted from 16-point WBAN code (for wind direction)", 0.0),
];

// ---------------------------------------------------------------------------
// QFLAG
// ---------------------------------------------------------------------------

pub static QUALITY_FLAGS: &[FlagCode] = &[
    flag('D', "Failed duplicate check", CRITICAL_QUALITY_PENALTY),
    flag('G', "Failed gap check", CRITICAL_QUALITY_PENALTY),
    flag('I', "Failed internal consistency check", CRITICAL_QUALITY_PENALTY),
    flag('K', "Failed streak/frequent-value check", CRITICAL_QUALITY_PENALTY),
    flag('L', "Failed check on length of multiday period", CRITICAL_QUALITY_PENALTY),
    flag('M', "Failed megaconsistency check", CRITICAL_QUALITY_PENALTY),
    flag('N', "Failed naught check", CRITICAL_QUALITY_PENALTY),
    flag('O', "Failed climatological outlier check", CRITICAL_QUALITY_PENALTY),
    flag('R', "Failed lagged range check", CRITICAL_QUALITY_PENALTY),
    flag('S', "Failed spatial consistency check", CRITICAL_QUALITY_PENALTY),
    flag('T', "Failed temporal consistency check", CRITICAL_QUALITY_PENALTY),
    flag('W', "Temperature too warm for snow", CRITICAL_QUALITY_PENALTY),
    flag('X', "Failed bounds check", CRITICAL_QUALITY_PENALTY),
    flag('Z', "Flagged as a result of an official Datzilla investigation", CRITICAL_QUALITY_PENALTY),
];

// ---------------------------------------------------------------------------
// SFLAG
// ---------------------------------------------------------------------------

pub static SOURCE_FLAGS: &[FlagCode] = &[
    flag('0', "U.S. Cooperative Summary of the Day (NCDC DSI-3200)", 0.0),
    flag('6', "CDMP Cooperative Summary of the Day (NCDC DSI-3206)", 0.0),
    flag('7', "U.S. Cooperative Summary of the Day, transmitted via WxCoder3 (NCDC DSI-3207)", 0.0),
    flag('A', "U.S. ASOS real-time data (since January 1, 2006)", 0.0),
    flag('a', "Australian data from the Australian Bureau of Meteorology", 0.0),
    flag('B', "U.S. ASOS data for October 2000-December 2005 (NCDC DSI-3211)", 0.0),
    flag('b', "Belarus update", 0.0),
    flag('C', "Environment Canada", 0.0),
    flag('D', "Short time delay NWS CF6 daily summaries (High Plains RCC)", 0.0),
    flag('d', "Short time delay NWS Daily Summary Messages (High Plains RCC)", 0.0),
    flag('E', "European Climate Assessment and Dataset", 0.0),
    flag('F', "U.S. Fort data", 0.0),
    flag('f', "Fiji Met Service", 0.0),
    flag('G', "Official GCOS or other government-supplied data", 0.0),
    flag('H', "High Plains Regional Climate Center real-time data", -5.0),
    flag('I', "International collection (non U.S. data received through personal contacts)", -5.0),
    flag('K', "U.S. Cooperative Summary of the Day digitized from paper observer forms", 0.0),
    flag('M', "Monthly METAR Extract (additional ASOS data)", 0.0),
    flag('m', "Mexican National Water Commission (CONAGUA)", 0.0),
    flag('N', "Community Collaborative Rain, Hail, and Snow (CoCoRaHS)", -5.0),
    flag('Q', "Quarantined African data, withheld until permission was granted", -5.0),
    flag('R', "NCEI Reference Network Database (CRN and Regional CRN)", 5.0),
    flag('r', "All-Russian Research Institute of Hydrometeorological Information-WDC", 0.0),
    flag('S', "Global Summary of the Day (NCDC DSI-9618), derived from synoptic reports", -10.0),
    flag('s', "China Meteorological Administration / National Meteorological Information Center", 0.0),
    flag('T', "SNOwpack TELemtry (SNOTEL) data from USDA NRCS", -5.0),
    flag('U', "Remote Automatic Weather Station (RAWS) data from WRCC", -5.0),
    flag('u', "Ukraine update", 0.0),
    flag('W', "WBAN/ASOS Summary of the Day from NCDC's Integrated Surface Data", 0.0),
    flag('X', "U.S. First-Order Summary of the Day (NCDC DSI-3210)", 0.0),
    flag('Z', "Datzilla official additions or replacements", 0.0),
    flag('z', "Uzbekistan update", 0.0),
];

/// Table for a flag position.
pub fn table_for(position: FlagPosition) -> &'static [FlagCode] {
    match position {
        FlagPosition::Measurement => MEASUREMENT_FLAGS,
        FlagPosition::Quality => QUALITY_FLAGS,
        FlagPosition::Source => SOURCE_FLAGS,
    }
}

/// Looks up a code in the table for its position.
pub fn lookup(position: FlagPosition, code: char) -> Option<&'static FlagCode> {
    table_for(position).iter().find(|f| f.code == code)
}

/// Official description of a code, if recognized.
pub fn describe(position: FlagPosition, code: char) -> Option<&'static str> {
    lookup(position, code).map(|f| f.description)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_codes_within_a_table() {
        for position in [FlagPosition::Measurement, FlagPosition::Quality, FlagPosition::Source] {
            let mut seen = std::collections::HashSet::new();
            for entry in table_for(position) {
                assert!(
                    seen.insert(entry.code),
                    "duplicate {} code '{}'",
                    position,
                    entry.code
                );
            }
        }
    }

    #[test]
    fn test_every_quality_code_is_critical() {
        for entry in QUALITY_FLAGS {
            assert_eq!(
                entry.adjustment, CRITICAL_QUALITY_PENALTY,
                "QFLAG '{}' should carry the critical penalty",
                entry.code
            );
        }
    }

    #[test]
    fn test_source_adjustments_stay_within_bounds() {
        for entry in SOURCE_FLAGS {
            assert!(
                entry.adjustment.abs() <= MAX_SOURCE_ADJUSTMENT,
                "SFLAG '{}' adjustment {} exceeds ±{}",
                entry.code,
                entry.adjustment,
                MAX_SOURCE_ADJUSTMENT
            );
        }
    }

    #[test]
    fn test_measurement_adjustments_are_neutral_or_warning() {
        for entry in MEASUREMENT_FLAGS {
            assert!(
                entry.adjustment == 0.0 || entry.adjustment == WARNING_MEASUREMENT_PENALTY,
                "MFLAG '{}' has unexpected adjustment {}",
                entry.code,
                entry.adjustment
            );
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive_for_source_codes() {
        assert!(describe(FlagPosition::Source, 'S').unwrap().contains("Global Summary"));
        assert!(describe(FlagPosition::Source, 's').unwrap().contains("China"));
        assert!(lookup(FlagPosition::Quality, 'q').is_none());
    }
}
