use std::fmt;
use std::str::FromStr;

/// Physical quantities a climate archive may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClimateVariable {
    /// Near-surface specific humidity
    Humidity,
    /// Precipitation flux
    Precipitation,
    /// Surface air pressure
    Pressure,
    /// Surface downwelling shortwave radiation
    Radiation,
    /// Near-surface wind speed
    WindSpeed,
    /// Near-surface air temperature
    Temperature,
}

impl ClimateVariable {
    /// Every variable, in canonical order
    pub const ALL: [ClimateVariable; 6] = [
        ClimateVariable::Humidity,
        ClimateVariable::Precipitation,
        ClimateVariable::Pressure,
        ClimateVariable::Radiation,
        ClimateVariable::WindSpeed,
        ClimateVariable::Temperature,
    ];

    /// Key used on the command line and in descriptor files
    pub fn key(&self) -> &'static str {
        match self {
            ClimateVariable::Humidity => "humidity",
            ClimateVariable::Precipitation => "precipitation",
            ClimateVariable::Pressure => "pressure",
            ClimateVariable::Radiation => "radiation",
            ClimateVariable::WindSpeed => "wind-speed",
            ClimateVariable::Temperature => "temperature",
        }
    }

    /// CMOR-style (name, units) pair used by the built-in presets
    pub fn default_info(&self) -> VariableInfo {
        let (name, units) = match self {
            ClimateVariable::Humidity => ("huss", "1"),
            ClimateVariable::Precipitation => ("pr", "kg m-2 s-1"),
            ClimateVariable::Pressure => ("ps", "Pa"),
            ClimateVariable::Radiation => ("rsds", "W m-2"),
            ClimateVariable::WindSpeed => ("sfcWind", "m s-1"),
            ClimateVariable::Temperature => ("tas", "K"),
        };
        VariableInfo::new(name, units)
    }
}

impl fmt::Display for ClimateVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ClimateVariable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ClimateVariable::ALL
            .iter()
            .copied()
            .find(|v| v.key() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown variable '{}'. Expected one of: {}",
                    s,
                    ClimateVariable::ALL
                        .iter()
                        .map(|v| v.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Canonical name and units of a variable within one dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableInfo {
    /// Variable name as written in the archive (e.g. "tas")
    pub name: String,
    /// Physical units (e.g. "K")
    pub units: String,
}

impl VariableInfo {
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
        }
    }
}

impl fmt::Display for VariableInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable_keys() {
        for variable in ClimateVariable::ALL {
            assert_eq!(variable.key().parse::<ClimateVariable>().unwrap(), variable);
        }
        assert_eq!(
            "Wind_Speed".parse::<ClimateVariable>().unwrap(),
            ClimateVariable::WindSpeed
        );
        assert!("snow".parse::<ClimateVariable>().is_err());
    }

    #[test]
    fn test_default_info_is_unique() {
        let mut names: Vec<String> = ClimateVariable::ALL
            .iter()
            .map(|v| v.default_info().name)
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ClimateVariable::ALL.len());
        assert_eq!(
            ClimateVariable::Temperature.default_info(),
            VariableInfo::new("tas", "K")
        );
    }

    #[test]
    fn test_variable_info_display() {
        let info = VariableInfo::new("pr", "kg m-2 s-1");
        assert_eq!(format!("{}", info), "pr [kg m-2 s-1]");
    }
}
