//! Plain-text mirror of each refresh for the serial console or log.

use core::fmt::Write as _;

use chrono::{NaiveDateTime, Utc};

use crate::{config::DiagnosticsMode, registers::SOUND_BAND_MIDS_HZ, types::Readings};

/// One line per quantity, labeled and with units.
pub fn labeled_lines(readings: &Readings, particles_enabled: bool) -> Vec<String> {
    let Readings {
        air,
        air_quality,
        light,
        sound,
        particle,
    } = readings;

    let mut lines = vec![
        format!("Temperature = {} C", air.temperature),
        format!("Pressure = {} Pa", air.pressure_pa),
        format!("Humidity = {} %", air.humidity),
        format!("Gas Sensor Resistance = {} ohm", air.gas_resistance_ohm),
        format!(
            "Air Quality Index = {} ({})",
            air_quality.aqi,
            air_quality.summary()
        ),
        format!("Estimated CO2 = {} ppm", air_quality.co2e_ppm),
        format!("Equivalent Breath VOC = {} ppm", air_quality.bvoc_ppm),
        format!("Air Quality Accuracy: {}", air_quality.accuracy.as_str()),
        format!("Illuminance = {} lux", light.illuminance_lux),
        format!("White Light Level = {}", light.white_level),
        format!("A-weighted Sound Pressure Level = {} dBA", sound.spl_dba),
    ];
    for (index, (spl, mid_hz)) in sound.band_spl_db.iter().zip(SOUND_BAND_MIDS_HZ).enumerate() {
        lines.push(format!(
            "Frequency Band {} ({mid_hz} Hz) SPL = {spl} dB",
            index + 1
        ));
    }
    lines.push(format!(
        "Peak Sound Amplitude = {} mPa",
        sound.peak_amplitude_mpa
    ));
    lines.push(format!(
        "Microphone Initialized: {}",
        if sound.stable { "Yes" } else { "No" }
    ));
    if particles_enabled {
        lines.push(format!("Particle Occupancy = {} %", particle.occupancy_pct));
        lines.push(format!(
            "Particle Concentration = {} ppL",
            particle.concentration_ppl
        ));
    }
    lines
}

/// Space-separated values in a fixed column order, for spreadsheets.
/// A timestamp, when given, leads the row as `YYYY MM DD HH MM SS`.
pub fn column_row(
    readings: &Readings,
    particles_enabled: bool,
    timestamp: Option<NaiveDateTime>,
) -> String {
    let Readings {
        air,
        air_quality,
        light,
        sound,
        particle,
    } = readings;

    let mut row = String::new();
    if let Some(timestamp) = timestamp {
        let _ = write!(row, "{} ", timestamp.format("%Y %m %d %H %M %S"));
    }
    let _ = write!(
        row,
        "{} {} {} {} {} {} {} {} {} {} {}",
        air.temperature,
        air.pressure_pa,
        air.humidity,
        air.gas_resistance_ohm,
        air_quality.aqi,
        air_quality.co2e_ppm,
        air_quality.bvoc_ppm,
        air_quality.accuracy.code(),
        light.illuminance_lux,
        light.white_level,
        sound.spl_dba,
    );
    for spl in &sound.band_spl_db {
        let _ = write!(row, " {spl}");
    }
    let _ = write!(
        row,
        " {} {}",
        sound.peak_amplitude_mpa,
        u8::from(sound.stable)
    );
    if particles_enabled {
        let _ = write!(
            row,
            " {} {}",
            particle.occupancy_pct, particle.concentration_ppl
        );
    }
    row
}

/// Writes `readings` to the log in the selected format.
pub fn emit(mode: DiagnosticsMode, readings: &Readings, particles_enabled: bool) {
    match mode {
        DiagnosticsMode::Off => {}
        DiagnosticsMode::Labeled => {
            for line in labeled_lines(readings, particles_enabled) {
                log::info!("{line}");
            }
        }
        DiagnosticsMode::Columns => {
            let now = Utc::now().naive_utc();
            log::info!("{}", column_row(readings, particles_enabled, Some(now)));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{AqiAccuracy, FixedPoint, Temperature};

    fn sample() -> Readings {
        let mut readings = Readings::default();
        readings.air.temperature = Temperature {
            negative: true,
            magnitude: FixedPoint::new(3, 4),
        };
        readings.air.pressure_pa = 101_325;
        readings.air.humidity = FixedPoint::new(41, 2);
        readings.air.gas_resistance_ohm = 52_000;
        readings.air_quality.aqi = FixedPoint::new(75, 0);
        readings.air_quality.bvoc_ppm = FixedPoint::new(0, 5);
        readings.air_quality.accuracy = AqiAccuracy::High;
        readings.sound.stable = true;
        readings.particle.concentration_ppl = 1234;
        readings
    }

    #[test]
    fn labeled_lines_carry_units_and_interpretations() {
        let lines = labeled_lines(&sample(), true);

        assert_eq!(lines[0], "Temperature = -3.4 C");
        assert_eq!(lines[4], "Air Quality Index = 75.0 (Acceptable)");
        assert_eq!(lines[6], "Equivalent Breath VOC = 0.05 ppm");
        assert_eq!(lines[7], "Air Quality Accuracy: High Accuracy");
        assert!(lines.contains(&"Frequency Band 6 (4000 Hz) SPL = 0.0 dB".to_string()));
        assert!(lines.contains(&"Microphone Initialized: Yes".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Particle Concentration = 1234 ppL")
        );
    }

    #[test]
    fn labeled_lines_skip_particles_when_disabled() {
        let with = labeled_lines(&sample(), true);
        let without = labeled_lines(&sample(), false);

        assert_eq!(with.len(), without.len() + 2);
        assert!(without.iter().all(|line| !line.starts_with("Particle")));
    }

    #[test]
    fn column_row_is_prefixed_with_timestamp() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|date| date.and_hms_opt(9, 5, 30))
            .unwrap();

        let row = column_row(&sample(), false, Some(timestamp));

        assert_eq!(
            row,
            "2024 03 07 09 05 30 -3.4 101325 41.2 52000 75.0 0.0 0.05 3 0.00 0 0.0 \
             0.0 0.0 0.0 0.0 0.0 0.0 0.00 1"
        );
    }

    #[test]
    fn column_row_appends_particles_when_enabled() {
        let row = column_row(&sample(), true, None);

        assert!(row.starts_with("-3.4 101325"));
        assert!(row.ends_with(" 0.00 1 0.00 1234"));
    }
}
