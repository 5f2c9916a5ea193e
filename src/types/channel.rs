//! Classification of station log columns into physical channel kinds.
//!
//! The kind decides how raw sub-hourly samples collapse into one hourly value
//! and whether the frozen-sensor check applies.

/// Name of the derived channel holding the mean of all temperature sensors, in Kelvin.
pub const UNIFIED_TEMPERATURE: &str = "tas";

/// Name of the timestamp column in every station frame.
pub const DATETIME_COLUMN: &str = "datetime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Rain gauges and tipping buckets.
    Precipitation,
    WindSpeed,
    /// Wind direction in degrees, averaged on the circle.
    WindDirection,
    /// Individual temperature sensors and the unified `tas` channel.
    Temperature,
    /// Pressure, humidity and everything else.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Sum,
    Mean,
    CircularMean,
    Median,
}

impl ChannelKind {
    pub fn classify(column: &str) -> Self {
        let name = column.to_ascii_lowercase();
        if name == "tipping" || name == "prcp" || name.contains("precip") || name.contains("rain") {
            ChannelKind::Precipitation
        } else if name.starts_with("wind_speed") || name == "wspd" {
            ChannelKind::WindSpeed
        } else if name.starts_with("wind_dir") || name == "wdir" {
            ChannelKind::WindDirection
        } else if name == UNIFIED_TEMPERATURE || is_temperature_sensor(&name) {
            ChannelKind::Temperature
        } else {
            ChannelKind::Other
        }
    }

    pub fn aggregation(self) -> Aggregation {
        match self {
            ChannelKind::Precipitation => Aggregation::Sum,
            ChannelKind::WindSpeed => Aggregation::Mean,
            ChannelKind::WindDirection => Aggregation::CircularMean,
            ChannelKind::Temperature | ChannelKind::Other => Aggregation::Median,
        }
    }

    /// Precipitation legitimately repeats the same value (mostly zero) for hours,
    /// so it is exempt from the frozen-sensor check.
    pub fn checks_frozen_sensor(self) -> bool {
        self != ChannelKind::Precipitation
    }
}

/// Whether a raw log column holds readings of a temperature sensor.
pub fn is_temperature_sensor(column: &str) -> bool {
    let name = column.to_ascii_lowercase();
    name.contains("temp") || name == "mcp9808"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_columns() {
        assert_eq!(ChannelKind::classify("tipping"), ChannelKind::Precipitation);
        assert_eq!(ChannelKind::classify("wind_speed"), ChannelKind::WindSpeed);
        assert_eq!(ChannelKind::classify("wind_dir"), ChannelKind::WindDirection);
        assert_eq!(ChannelKind::classify("mcp9808"), ChannelKind::Temperature);
        assert_eq!(ChannelKind::classify("bmp280_temp"), ChannelKind::Temperature);
        assert_eq!(ChannelKind::classify("tas"), ChannelKind::Temperature);
        assert_eq!(ChannelKind::classify("htu_hum"), ChannelKind::Other);
    }

    #[test]
    fn test_aggregation_per_kind() {
        assert_eq!(ChannelKind::classify("tipping").aggregation(), Aggregation::Sum);
        assert_eq!(ChannelKind::classify("wind_speed").aggregation(), Aggregation::Mean);
        assert_eq!(
            ChannelKind::classify("wind_dir").aggregation(),
            Aggregation::CircularMean
        );
        assert_eq!(ChannelKind::classify("bmp280_pres").aggregation(), Aggregation::Median);
        assert!(!ChannelKind::Precipitation.checks_frozen_sensor());
        assert!(ChannelKind::Temperature.checks_frozen_sensor());
    }
}
