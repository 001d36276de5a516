//! Weather element registry.
//!
//! Defines the GHCN-Daily element codes this service knows how to analyze,
//! along with the display name and (already normalized) unit used when
//! rendering explanations. This is the single source of truth for element
//! metadata; other modules should look elements up here rather than
//! hardcoding names or units.

// ---------------------------------------------------------------------------
// Element groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementGroup {
    Temperature,
    Precipitation,
    Wind,
    Pressure,
    Humidity,
    Sunshine,
}

// ---------------------------------------------------------------------------
// Element metadata
// ---------------------------------------------------------------------------

/// Metadata for a single weather element.
pub struct Element {
    /// GHCN-Daily element code, e.g. "TMAX".
    pub code: &'static str,
    /// Human-readable name used in explanations.
    pub name: &'static str,
    /// Unit suffix appended to rendered values.
    pub unit: &'static str,
    pub group: ElementGroup,
    /// Inclusive `(min, max)` a reading can physically take, in `unit`.
    pub limits: Option<(f64, f64)>,
}

/// All recognized elements. Values arriving from ingest are expected to be
/// in the units listed here.
pub static ELEMENT_REGISTRY: &[Element] = &[
    // Core elements
    Element { code: "TMAX", name: "Maximum Temperature", unit: "°F", group: ElementGroup::Temperature, limits: Some((-147.8, 140.0)) },
    Element { code: "TMIN", name: "Minimum Temperature", unit: "°F", group: ElementGroup::Temperature, limits: Some((-147.8, 122.0)) },
    Element { code: "TAVG", name: "Average Temperature", unit: "°F", group: ElementGroup::Temperature, limits: None },
    Element { code: "ADPT", name: "Average Dew Point Temperature", unit: "°F", group: ElementGroup::Temperature, limits: None },
    Element { code: "PRCP", name: "Precipitation", unit: "in", group: ElementGroup::Precipitation, limits: Some((0.0, 7.87)) },
    Element { code: "SNOW", name: "Snowfall", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    Element { code: "SNWD", name: "Snow Depth", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    // Additional elements
    Element { code: "WESD", name: "Water Equivalent of Snow on Ground", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    Element { code: "WESF", name: "Water Equivalent of Snowfall", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    Element { code: "DAPR", name: "Days of Precipitation", unit: "days", group: ElementGroup::Precipitation, limits: None },
    Element { code: "MDPR", name: "Multiday Precipitation Total", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    Element { code: "EVAP", name: "Evaporation", unit: "mm", group: ElementGroup::Precipitation, limits: None },
    Element { code: "AWND", name: "Average Wind Speed", unit: "m/s", group: ElementGroup::Wind, limits: None },
    Element { code: "WSFG", name: "Peak Wind Gust", unit: "m/s", group: ElementGroup::Wind, limits: None },
    Element { code: "ASLP", name: "Average Sea Level Pressure", unit: "hPa", group: ElementGroup::Pressure, limits: None },
    Element { code: "RHAV", name: "Average Relative Humidity", unit: "%", group: ElementGroup::Humidity, limits: Some((0.0, 100.0)) },
    Element { code: "PSUN", name: "Percent of Possible Sunshine", unit: "%", group: ElementGroup::Sunshine, limits: Some((0.0, 100.0)) },
    Element { code: "TSUN", name: "Total Sunshine", unit: "minutes", group: ElementGroup::Sunshine, limits: None },
];

/// Looks up an element by code. Returns `None` if not registered.
pub fn find_element(code: &str) -> Option<&'static Element> {
    ELEMENT_REGISTRY.iter().find(|e| e.code == code)
}

/// Returns `true` if the code is a recognized element.
pub fn is_recognized(code: &str) -> bool {
    find_element(code).is_some()
}

/// Display name and unit for an element. Unknown codes render as the code
/// itself with no unit.
pub fn display_metadata(code: &str) -> (&str, &'static str) {
    match find_element(code) {
        Some(e) => (e.name, e.unit),
        None => (code, ""),
    }
}

/// Physical limits for an element, if any are known.
pub fn physical_limits(code: &str) -> Option<(f64, f64)> {
    find_element(code).and_then(|e| e.limits)
}

/// Element codes in registry order, filtered to one group.
pub fn codes_in_group(group: ElementGroup) -> Vec<&'static str> {
    ELEMENT_REGISTRY
        .iter()
        .filter(|e| e.group == group)
        .map(|e| e.code)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
