use core::fmt;

use crate::registers::SOUND_FREQ_BANDS;

/// A quantity split into an integer part and a `PLACES`-digit fractional
/// part, as delivered by the board. No floating point is involved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedPoint<const PLACES: usize> {
    pub integer: u16,
    pub fraction: u8,
}

impl<const PLACES: usize> FixedPoint<PLACES> {
    pub const fn new(integer: u16, fraction: u8) -> Self {
        Self { integer, fraction }
    }
}

impl<const PLACES: usize> fmt::Display for FixedPoint<PLACES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.integer,
            self.fraction,
            width = PLACES
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Temperature {
    pub negative: bool,
    pub magnitude: FixedPoint<1>,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        write!(f, "{}", self.magnitude)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AqiAccuracy {
    #[default]
    Invalid,
    Low,
    Medium,
    High,
}

impl AqiAccuracy {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            _ => Self::Invalid,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "Not Valid, Calibration Incomplete",
            Self::Low => "Low Accuracy, Calibration Ongoing",
            Self::Medium => "Medium Accuracy, Calibration Ongoing",
            Self::High => "High Accuracy",
        }
    }
}

/// Qualitative reading of the air quality index, keyed on its integer part.
pub fn aqi_summary(aqi: u16) -> &'static str {
    match aqi {
        0..=49 => "Good",
        50..=99 => "Acceptable",
        100..=149 => "Substandard",
        150..=199 => "Poor",
        200..=299 => "Bad",
        _ => "Very Bad",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AirData {
    pub temperature: Temperature,
    pub pressure_pa: u32,
    pub humidity: FixedPoint<1>,
    pub gas_resistance_ohm: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AirQualityData {
    pub aqi: FixedPoint<1>,
    pub co2e_ppm: FixedPoint<1>,
    pub bvoc_ppm: FixedPoint<2>,
    pub accuracy: AqiAccuracy,
}

impl AirQualityData {
    pub fn summary(&self) -> &'static str {
        aqi_summary(self.aqi.integer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightData {
    pub illuminance_lux: FixedPoint<2>,
    pub white_level: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundData {
    pub spl_dba: FixedPoint<1>,
    pub band_spl_db: [FixedPoint<1>; SOUND_FREQ_BANDS],
    pub peak_amplitude_mpa: FixedPoint<2>,
    pub stable: bool,
}

/// Valid only once the particle sensor has stabilized, and only when it is
/// enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleData {
    pub occupancy_pct: FixedPoint<2>,
    pub concentration_ppl: u16,
}

/// One complete measurement cycle. Replaced as a whole, never merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readings {
    pub air: AirData,
    pub air_quality: AirQualityData,
    pub light: LightData,
    pub sound: SoundData,
    pub particle: ParticleData,
}
