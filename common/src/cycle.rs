use core::{fmt, str::FromStr};

use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use crate::{
    board::{BoardError, SenseBoard},
    config::ConfigError,
    registers::{CYCLE_MODE_CMD, CYCLE_TIME_PERIOD_REG, ENABLED, PARTICLE_SENSOR_ENABLE_REG},
};

/// Longest page auto-refresh interval; slower cycles still refresh this
/// often because the page is not synchronized with the measurement cycle.
pub const MAX_REFRESH_SECONDS: u16 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum CyclePeriod {
    #[default]
    Seconds3,
    Seconds100,
    Seconds300,
}

impl CyclePeriod {
    pub fn seconds(self) -> u16 {
        match self {
            Self::Seconds3 => 3,
            Self::Seconds100 => 100,
            Self::Seconds300 => 300,
        }
    }

    pub fn register_code(self) -> u8 {
        match self {
            Self::Seconds3 => 0,
            Self::Seconds100 => 1,
            Self::Seconds300 => 2,
        }
    }

    pub fn refresh_seconds(self) -> u16 {
        self.seconds().min(MAX_REFRESH_SECONDS)
    }
}

impl TryFrom<u16> for CyclePeriod {
    type Error = ConfigError;

    fn try_from(seconds: u16) -> Result<Self, Self::Error> {
        match seconds {
            3 => Ok(Self::Seconds3),
            100 => Ok(Self::Seconds100),
            300 => Ok(Self::Seconds300),
            other => Err(ConfigError::UnknownCyclePeriod(other.to_string())),
        }
    }
}

impl From<CyclePeriod> for u16 {
    fn from(period: CyclePeriod) -> Self {
        period.seconds()
    }
}

impl FromStr for CyclePeriod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);
        digits
            .parse::<u16>()
            .map_err(|_| ConfigError::UnknownCyclePeriod(trimmed.to_string()))
            .and_then(Self::try_from)
    }
}

impl fmt::Display for CyclePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s", self.seconds())
    }
}

/// Applies the cycle settings and starts continuous measurement.
pub fn configure<I2C: I2c>(
    board: &mut SenseBoard<I2C>,
    period: CyclePeriod,
    particles_enabled: bool,
) -> Result<(), BoardError<I2C::Error>> {
    if particles_enabled {
        board.write(PARTICLE_SENSOR_ENABLE_REG, &[ENABLED])?;
    }
    board.write(CYCLE_TIME_PERIOD_REG, &[period.register_code()])?;
    board.command(CYCLE_MODE_CMD)
}
