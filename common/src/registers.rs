pub const I2C_ADDR_SB_OPEN: u8 = 0x71;
pub const I2C_ADDR_SB_CLOSED: u8 = 0x70;

pub const PARTICLE_SENSOR_ENABLE_REG: u8 = 0x07;
pub const CYCLE_TIME_PERIOD_REG: u8 = 0x89;

pub const RESET_CMD: u8 = 0xE2;
pub const CYCLE_MODE_CMD: u8 = 0xE4;

pub const AIR_DATA_READ: u8 = 0x10;
pub const AIR_QUALITY_DATA_READ: u8 = 0x11;
pub const LIGHT_DATA_READ: u8 = 0x12;
pub const SOUND_DATA_READ: u8 = 0x13;
pub const PARTICLE_DATA_READ: u8 = 0x14;

pub const AIR_DATA_BYTES: usize = 12;
pub const AIR_QUALITY_DATA_BYTES: usize = 10;
pub const LIGHT_DATA_BYTES: usize = 5;
pub const SOUND_DATA_BYTES: usize = 18;
pub const PARTICLE_DATA_BYTES: usize = 4;

pub const SOUND_FREQ_BANDS: usize = 6;
pub const SOUND_BAND_MIDS_HZ: [u16; SOUND_FREQ_BANDS] = [125, 250, 500, 1000, 2000, 4000];

pub const TEMPERATURE_VALUE_MASK: u8 = 0x7F;
pub const TEMPERATURE_SIGN_MASK: u8 = 0x80;

pub const ENABLED: u8 = 1;

/// Largest payload the board accepts in one write transfer.
pub const MAX_WRITE_PAYLOAD: usize = 32;
