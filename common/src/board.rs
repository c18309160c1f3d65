use embedded_hal::i2c::I2c;
use thiserror::Error;

use crate::{
    decode::{
        decode_air, decode_air_quality, decode_light, decode_particle, decode_sound, DecodeError,
    },
    registers::{
        AIR_DATA_BYTES, AIR_DATA_READ, AIR_QUALITY_DATA_BYTES, AIR_QUALITY_DATA_READ,
        LIGHT_DATA_BYTES, LIGHT_DATA_READ, MAX_WRITE_PAYLOAD, PARTICLE_DATA_BYTES,
        PARTICLE_DATA_READ, RESET_CMD, SOUND_DATA_BYTES, SOUND_DATA_READ,
    },
    types::{ParticleData, Readings},
};

#[derive(Debug, Error)]
pub enum BoardError<E: core::fmt::Debug> {
    #[error("i2c transfer failed: {0:?}")]
    Bus(E),
    #[error("payload of {0} bytes exceeds the 32 byte transfer limit")]
    PayloadTooLong(usize),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Register-level access to the sensor board over I2C.
pub struct SenseBoard<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> SenseBoard<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Reads `buf.len()` bytes starting at `register`.
    pub fn read(&mut self, register: u8, buf: &mut [u8]) -> Result<(), BoardError<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .map_err(BoardError::Bus)
    }

    /// Writes `data` to a settings register, or sends a command when empty.
    pub fn write(&mut self, register: u8, data: &[u8]) -> Result<(), BoardError<I2C::Error>> {
        if data.len() > MAX_WRITE_PAYLOAD {
            return Err(BoardError::PayloadTooLong(data.len()));
        }

        let mut frame = [0_u8; MAX_WRITE_PAYLOAD + 1];
        frame[0] = register;
        frame[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &frame[..=data.len()])
            .map_err(BoardError::Bus)
    }

    pub fn command(&mut self, command: u8) -> Result<(), BoardError<I2C::Error>> {
        self.write(command, &[])
    }

    /// Returns the board to standby with all settings cleared.
    pub fn reset(&mut self) -> Result<(), BoardError<I2C::Error>> {
        self.command(RESET_CMD)
    }

    /// Reads every data category of the latest cycle. Particle data stays
    /// zeroed when the particle sensor is not in use.
    pub fn read_readings(
        &mut self,
        particles_enabled: bool,
    ) -> Result<Readings, BoardError<I2C::Error>> {
        let mut air = [0_u8; AIR_DATA_BYTES];
        self.read(AIR_DATA_READ, &mut air)?;

        let mut air_quality = [0_u8; AIR_QUALITY_DATA_BYTES];
        self.read(AIR_QUALITY_DATA_READ, &mut air_quality)?;

        let mut light = [0_u8; LIGHT_DATA_BYTES];
        self.read(LIGHT_DATA_READ, &mut light)?;

        let mut sound = [0_u8; SOUND_DATA_BYTES];
        self.read(SOUND_DATA_READ, &mut sound)?;

        let particle = if particles_enabled {
            let mut raw = [0_u8; PARTICLE_DATA_BYTES];
            self.read(PARTICLE_DATA_READ, &mut raw)?;
            decode_particle(&raw)?
        } else {
            ParticleData::default()
        };

        Ok(Readings {
            air: decode_air(&air)?,
            air_quality: decode_air_quality(&air_quality)?,
            light: decode_light(&light)?,
            sound: decode_sound(&sound)?,
            particle,
        })
    }
}
