//! Renders the latest readings as a complete HTTP response.
//!
//! The response lives in a fixed-capacity buffer that is rebuilt from
//! scratch on every refresh. Each row is formatted into a short scratch line
//! first, so a row that would not fit is reported instead of being cut.

use core::fmt::{self, Display, Write};

use heapless::String;
use thiserror::Error;

use crate::{
    registers::SOUND_BAND_MIDS_HZ,
    types::{AirData, AirQualityData, LightData, ParticleData, Readings, SoundData},
};

/// Holds the page for the widest value of every field, a negative
/// temperature, a five digit refresh hint and the particle section.
pub const PAGE_CAPACITY: usize = 2048;
pub const LINE_CAPACITY: usize = 128;

pub type PageBuffer = String<PAGE_CAPACITY>;

/// Sent instead of the page when the page could not be assembled.
pub const UNAVAILABLE_RESPONSE: &str = "HTTP/1.1 503 Service Unavailable\r\n\
Content-Type: text/plain\r\n\
Connection: close\r\n\
\r\n\
Readings unavailable\r\n";

const DOCUMENT_HEAD: &str = "<!DOCTYPE HTML><html><head><meta charset='UTF-8'>\
<title>Metriful Sensor Demo</title>\
<style>h1{font-size:3vw;} h2{font-size:2vw;margin-top:4vw;} \
table,th,td{font-size:2vw;} body{padding:0vw 2vw;} td{padding-right:1vw;}</style>\
</head><body><h1>Indoor Environment Data</h1>";

const DOCUMENT_TAIL: &str = "</body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("{buffer} buffer of {capacity} bytes is too small for the formatted page")]
    CapacityExceeded {
        buffer: &'static str,
        capacity: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub refresh_seconds: u16,
    pub particles_enabled: bool,
}

struct Assembler<'a, const N: usize> {
    page: &'a mut String<N>,
    line: String<LINE_CAPACITY>,
}

impl<const N: usize> Assembler<'_, N> {
    fn push(&mut self, text: &str) -> Result<(), PageError> {
        self.page.push_str(text).map_err(|_| PageError::CapacityExceeded {
            buffer: "page",
            capacity: N,
        })
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<(), PageError> {
        self.line.clear();
        self.line
            .write_fmt(args)
            .map_err(|_| PageError::CapacityExceeded {
                buffer: "line",
                capacity: LINE_CAPACITY,
            })?;
        self.page.push_str(&self.line).map_err(|_| PageError::CapacityExceeded {
            buffer: "page",
            capacity: N,
        })
    }

    fn row(
        &mut self,
        label: impl Display,
        value: impl Display,
        unit: &str,
    ) -> Result<(), PageError> {
        self.line(format_args!(
            "<tr><td>{label}</td><td>{value}</td><td>{unit}</td></tr>"
        ))
    }

    fn section(&mut self, title: &str) -> Result<(), PageError> {
        self.line(format_args!("<p><h2>{title}</h2><table>"))
    }

    fn end_section(&mut self) -> Result<(), PageError> {
        self.push("</table></p>")
    }

    fn air(&mut self, air: &AirData) -> Result<(), PageError> {
        self.section("Air Data")?;
        self.row("Temperature", air.temperature, "&deg;C")?;
        self.row("Pressure", air.pressure_pa, "Pa")?;
        self.row("Humidity", air.humidity, "%")?;
        self.row("Gas Sensor Resistance", air.gas_resistance_ohm, "&#937;")?;
        self.end_section()
    }

    fn air_quality(&mut self, aq: &AirQualityData) -> Result<(), PageError> {
        self.section("Air Quality Data")?;
        self.row("Air Quality Index", aq.aqi, aq.summary())?;
        self.row("Estimated CO<sub>2</sub>", aq.co2e_ppm, "ppm")?;
        self.row("Equivalent Breath VOC", aq.bvoc_ppm, "ppm")?;
        self.row("Air Quality Accuracy", aq.accuracy.as_str(), "")?;
        self.end_section()
    }

    fn light(&mut self, light: &LightData) -> Result<(), PageError> {
        self.section("Light Data")?;
        self.row("Illuminance", light.illuminance_lux, "lux")?;
        self.row("White Light Level", light.white_level, "")?;
        self.end_section()
    }

    fn sound(&mut self, sound: &SoundData) -> Result<(), PageError> {
        self.section("Sound Data")?;
        self.row("A-weighted Sound Pressure Level", sound.spl_dba, "dBA")?;
        for (index, (spl, mid_hz)) in sound
            .band_spl_db
            .iter()
            .zip(SOUND_BAND_MIDS_HZ)
            .enumerate()
        {
            self.row(
                format_args!("Frequency Band {} ({mid_hz} Hz) SPL", index + 1),
                spl,
                "dB",
            )?;
        }
        self.row("Peak Sound Amplitude", sound.peak_amplitude_mpa, "mPa")?;
        self.end_section()
    }

    fn particle(&mut self, particle: &ParticleData) -> Result<(), PageError> {
        self.section("Air Particulate Data")?;
        self.row("Sensor Occupancy", particle.occupancy_pct, "%")?;
        self.row("Particle Concentration", particle.concentration_ppl, "ppL")?;
        self.end_section()
    }
}

/// Rebuilds `page` as the full response for `readings`.
///
/// On error the buffer holds a partial page and must not be served.
pub fn assemble_into<const N: usize>(
    page: &mut String<N>,
    readings: &Readings,
    options: PageOptions,
) -> Result<(), PageError> {
    page.clear();
    let mut assembler = Assembler {
        page,
        line: String::new(),
    };

    assembler.push("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n")?;
    assembler.line(format_args!("Refresh: {}\r\n\r\n", options.refresh_seconds))?;
    assembler.push(DOCUMENT_HEAD)?;
    assembler.air(&readings.air)?;
    assembler.air_quality(&readings.air_quality)?;
    assembler.light(&readings.light)?;
    assembler.sound(&readings.sound)?;
    if options.particles_enabled {
        assembler.particle(&readings.particle)?;
    }
    assembler.push(DOCUMENT_TAIL)
}

/// Like [`assemble_into`], but leaves [`UNAVAILABLE_RESPONSE`] in the buffer
/// when the page does not fit, so the buffer is always servable.
///
/// Buffers too small to hold the fallback are rejected at compile time.
pub fn render<const N: usize>(
    page: &mut String<N>,
    readings: &Readings,
    options: PageOptions,
) -> Result<(), PageError> {
    const { assert!(UNAVAILABLE_RESPONSE.len() <= N) };

    assemble_into(page, readings, options).inspect_err(|_| {
        page.clear();
        // Cannot fail: N holds the fallback.
        let _ = page.push_str(UNAVAILABLE_RESPONSE);
    })
}


#[cfg(all(test, not(target_os = "espidf")))]
mod properties {
    use proptest::prelude::*;

    use super::*;
    use crate::types::{FixedPoint, Temperature};

    proptest! {
        #[test]
        fn any_field_widths_fit(
            negative in any::<bool>(),
            integer in any::<u16>(),
            fraction in any::<u8>(),
            wide in any::<u32>(),
            refresh_seconds in any::<u16>(),
            particles_enabled in any::<bool>(),
        ) {
            let mut readings = Readings::default();
            readings.air.temperature = Temperature {
                negative,
                magnitude: FixedPoint::new(integer, fraction),
            };
            readings.air.pressure_pa = wide;
            readings.air.gas_resistance_ohm = wide;
            readings.air_quality.aqi = FixedPoint::new(integer, fraction);
            readings.light.illuminance_lux = FixedPoint::new(integer, fraction);
            readings.sound.band_spl_db = [FixedPoint::new(integer, fraction); 6];
            readings.particle.concentration_ppl = integer;

            let mut page = PageBuffer::new();
            let result = assemble_into(
                &mut page,
                &readings,
                PageOptions { refresh_seconds, particles_enabled },
            );

            prop_assert!(result.is_ok());
            prop_assert_eq!(page.matches("<h2>").count(), if particles_enabled { 5 } else { 4 });
        }
    }
}
