//! Static catalog of SMHI observation parameters
//!
//! The code/label table never changes. Which of these parameters a given
//! station actually reports is discovered at runtime and cached per station
//! as a list of indices into [`PARAMETERS`].

/// A single observation parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    /// SMHI parameter code used in API paths
    pub code: u32,
    /// Human-readable label
    pub label: &'static str,
}

/// Parameter used to qualify a station before catalog discovery
pub const PRIMARY_PARAMETER: u32 = 1;

/// Codes probed right after the primary parameter: wind speed, relative
/// humidity and hourly precipitation.
const PRIORITY_CODES: [u32; 3] = [4, 6, 7];

const fn p(code: u32, label: &'static str) -> ParameterInfo {
    ParameterInfo { code, label }
}

/// All known observation parameters in catalog order
pub static PARAMETERS: [ParameterInfo; 39] = [
    p(1, "Temperature (1h)"),
    p(2, "Temperature (Daily Avg)"),
    p(3, "Wind Direction"),
    p(4, "Wind Speed"),
    p(5, "Precipitation (Daily)"),
    p(6, "Relative Humidity"),
    p(7, "Precipitation (1h)"),
    p(8, "Snow Depth"),
    p(9, "Air Pressure"),
    p(10, "Sunshine Time"),
    p(11, "Global Irradiance"),
    p(12, "Visibility"),
    p(13, "Current Weather"),
    p(14, "Precipitation (15m)"),
    p(16, "Total Cloud Cover"),
    p(17, "Precipitation (2x/day)"),
    p(18, "Precipitation (1x/day)"),
    p(19, "Temp Min (Daily)"),
    p(20, "Temp Max (Daily)"),
    p(21, "Wind Gust"),
    p(22, "Temperature (Monthly)"),
    p(23, "Precipitation (Monthly)"),
    p(24, "Longwave Irradiance"),
    p(25, "Max Mean Wind Speed"),
    p(26, "Temp Min (12h)"),
    p(27, "Temp Max (12h)"),
    p(28, "Cloud Base (Lowest)"),
    p(29, "Cloud Amount (Lowest)"),
    p(30, "Cloud Base (2nd)"),
    p(31, "Cloud Amount (2nd)"),
    p(32, "Cloud Base (3rd)"),
    p(33, "Cloud Amount (3rd)"),
    p(34, "Cloud Base (4th)"),
    p(35, "Cloud Amount (4th)"),
    p(36, "Cloud Base (Low Mom)"),
    p(37, "Cloud Base (Low Min)"),
    p(38, "Precip Intensity (Max)"),
    p(39, "Dew Point"),
    p(40, "Ground State"),
];

/// Read-only view over [`PARAMETERS`]
#[derive(Debug, Clone, Copy)]
pub struct ParameterCatalog {
    entries: &'static [ParameterInfo],
}

impl Default for ParameterCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterCatalog {
    /// Catalog over the built-in parameter table
    pub fn new() -> Self {
        Self {
            entries: &PARAMETERS,
        }
    }

    /// Number of parameters in the catalog
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter at catalog index `idx`
    pub fn get(&self, idx: usize) -> Option<&'static ParameterInfo> {
        self.entries.get(idx)
    }

    /// Catalog index of parameter `code`
    pub fn index_of(&self, code: u32) -> Option<usize> {
        self.entries.iter().position(|p| p.code == code)
    }

    /// Parameter with the given code
    pub fn by_code(&self, code: u32) -> Option<&'static ParameterInfo> {
        self.entries.iter().find(|p| p.code == code)
    }

    /// Catalog indices to probe after the primary parameter.
    ///
    /// Priority parameters come first, then the rest in catalog order. The
    /// primary parameter itself is not included.
    pub fn probe_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = PRIORITY_CODES
            .iter()
            .filter_map(|&code| self.index_of(code))
            .collect();
        for (idx, info) in self.entries.iter().enumerate() {
            if info.code != PRIMARY_PARAMETER && !order.contains(&idx) {
                order.push(idx);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog = ParameterCatalog::new();
        assert_eq!(catalog.len(), 39);
        assert_eq!(catalog.index_of(1), Some(0));
        assert_eq!(catalog.index_of(16), Some(14));
        assert_eq!(catalog.index_of(15), None);
        assert_eq!(catalog.by_code(39).map(|p| p.label), Some("Dew Point"));
    }

    #[test]
    fn test_probe_order_priority_first() {
        let catalog = ParameterCatalog::new();
        let order = catalog.probe_order();
        let codes: Vec<u32> = order.iter().map(|&i| PARAMETERS[i].code).collect();

        assert_eq!(&codes[..3], &[4, 6, 7]);
        assert_eq!(codes.len(), catalog.len() - 1);
        assert!(!codes.contains(&PRIMARY_PARAMETER));
        assert_eq!(codes[3], 2);
    }
}
