use thiserror::Error;

use crate::{
    registers::{
        AIR_DATA_BYTES, AIR_QUALITY_DATA_BYTES, LIGHT_DATA_BYTES, PARTICLE_DATA_BYTES,
        SOUND_DATA_BYTES, SOUND_FREQ_BANDS, TEMPERATURE_SIGN_MASK, TEMPERATURE_VALUE_MASK,
    },
    types::{
        AirData, AirQualityData, AqiAccuracy, FixedPoint, LightData, ParticleData, SoundData,
        Temperature,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{category} block must be {expected} bytes, got {actual}")]
pub struct DecodeError {
    pub category: &'static str,
    pub expected: usize,
    pub actual: usize,
}

fn check_len(category: &'static str, raw: &[u8], expected: usize) -> Result<(), DecodeError> {
    if raw.len() == expected {
        Ok(())
    } else {
        Err(DecodeError {
            category,
            expected,
            actual: raw.len(),
        })
    }
}

fn u16_le(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn u32_le(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

pub fn decode_air(raw: &[u8]) -> Result<AirData, DecodeError> {
    check_len("air", raw, AIR_DATA_BYTES)?;

    Ok(AirData {
        temperature: Temperature {
            negative: raw[0] & TEMPERATURE_SIGN_MASK != 0,
            magnitude: FixedPoint::new(u16::from(raw[0] & TEMPERATURE_VALUE_MASK), raw[1]),
        },
        pressure_pa: u32_le(raw, 2),
        humidity: FixedPoint::new(u16::from(raw[6]), raw[7]),
        gas_resistance_ohm: u32_le(raw, 8),
    })
}

pub fn decode_air_quality(raw: &[u8]) -> Result<AirQualityData, DecodeError> {
    check_len("air quality", raw, AIR_QUALITY_DATA_BYTES)?;

    Ok(AirQualityData {
        aqi: FixedPoint::new(u16_le(raw, 0), raw[2]),
        co2e_ppm: FixedPoint::new(u16_le(raw, 3), raw[5]),
        bvoc_ppm: FixedPoint::new(u16_le(raw, 6), raw[8]),
        accuracy: AqiAccuracy::from_code(raw[9]),
    })
}

pub fn decode_light(raw: &[u8]) -> Result<LightData, DecodeError> {
    check_len("light", raw, LIGHT_DATA_BYTES)?;

    Ok(LightData {
        illuminance_lux: FixedPoint::new(u16_le(raw, 0), raw[2]),
        white_level: u16_le(raw, 3),
    })
}

pub fn decode_sound(raw: &[u8]) -> Result<SoundData, DecodeError> {
    check_len("sound", raw, SOUND_DATA_BYTES)?;

    // Band integer parts come first, then all band fractions.
    let ints = &raw[2..2 + SOUND_FREQ_BANDS];
    let fracs = &raw[2 + SOUND_FREQ_BANDS..2 + 2 * SOUND_FREQ_BANDS];
    let mut band_spl_db = [FixedPoint::default(); SOUND_FREQ_BANDS];
    for (band, (integer, fraction)) in band_spl_db.iter_mut().zip(ints.iter().zip(fracs)) {
        *band = FixedPoint::new(u16::from(*integer), *fraction);
    }

    let peak_at = 2 + 2 * SOUND_FREQ_BANDS;
    Ok(SoundData {
        spl_dba: FixedPoint::new(u16::from(raw[0]), raw[1]),
        band_spl_db,
        peak_amplitude_mpa: FixedPoint::new(u16_le(raw, peak_at), raw[peak_at + 2]),
        stable: raw[peak_at + 3] != 0,
    })
}

pub fn decode_particle(raw: &[u8]) -> Result<ParticleData, DecodeError> {
    check_len("particle", raw, PARTICLE_DATA_BYTES)?;

    Ok(ParticleData {
        occupancy_pct: FixedPoint::new(u16::from(raw[0]), raw[1]),
        concentration_ppl: u16_le(raw, 2),
    })
}
