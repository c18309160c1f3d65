use std::{convert::Infallible, env, fs, sync::Arc, thread, time::Duration};

use anyhow::{anyhow, Context};
use embedded_hal::i2c::{ErrorType, I2c, Operation};
use tracing::{debug, info, warn};

use sense_web_common::{
    registers::{
        AIR_DATA_READ, AIR_QUALITY_DATA_READ, LIGHT_DATA_READ, PARTICLE_DATA_READ,
        SOUND_DATA_READ, SOUND_FREQ_BANDS,
    },
    DiagnosticsMode, Poll, ReadySignal, RuntimeConfig, SenseBoard, Station, StationSettings,
    TcpConnections,
};

const IDLE_SLEEP: Duration = Duration::from_millis(10);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = load_runtime_config()?;
    runtime
        .sense
        .validate()
        .context("invalid sensor configuration")?;

    let ready = Arc::new(ReadySignal::new());
    let board = SenseBoard::new(SimulatedBoard::default(), runtime.sense.i2c_address);
    let mut station = Station::new(
        board,
        StationSettings::from(&runtime.sense),
        Arc::clone(&ready),
    );
    station.start().context("failed to start measurement cycle")?;

    let port = runtime.network.http_port;
    let timeout = runtime.sense.client_timeout_ms.map(Duration::from_millis);
    let mut connections = TcpConnections::bind(port, timeout)
        .with_context(|| format!("failed to bind http port {port}"))?;
    info!(
        "serving simulated readings on port {} (cycle {})",
        connections.local_port()?,
        runtime.sense.cycle_period
    );

    let period = Duration::from_secs(u64::from(runtime.sense.cycle_period.seconds()));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; the board needs a full cycle.
        interval.tick().await;
        loop {
            interval.tick().await;
            ready.assert();
        }
    });

    let station_loop = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        loop {
            match station
                .poll(&mut connections)
                .context("station loop failed")?
            {
                Poll::Idle => thread::sleep(IDLE_SLEEP),
                Poll::Refreshed => debug!("page rebuilt"),
                Poll::ReadFailed => warn!("cycle skipped"),
                Poll::Served(outcome) => debug!("client handled: {outcome:?}"),
            }
        }
    });

    tokio::select! {
        result = station_loop => result.context("station loop panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let mut runtime = match env::var("SENSE_CONFIG") {
        Ok(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file `{path}`"))?;
            RuntimeConfig::from_json(&json)
                .with_context(|| format!("failed to parse config file `{path}`"))?
        }
        Err(_) => RuntimeConfig::default(),
    };

    if let Ok(port) = env::var("SENSE_HTTP_PORT") {
        runtime.network.http_port = port
            .parse()
            .with_context(|| format!("invalid SENSE_HTTP_PORT `{port}`"))?;
    }
    if let Ok(period) = env::var("SENSE_CYCLE_PERIOD") {
        runtime.sense.cycle_period = period.parse().context("invalid SENSE_CYCLE_PERIOD")?;
    }
    if let Ok(particles) = env::var("SENSE_PARTICLES") {
        runtime.sense.particle_sensor = parse_flag(&particles)
            .ok_or_else(|| anyhow!("invalid SENSE_PARTICLES `{particles}`"))?;
    }
    if let Ok(mode) = env::var("SENSE_DIAGNOSTICS") {
        runtime.sense.diagnostics = mode
            .parse::<DiagnosticsMode>()
            .context("invalid SENSE_DIAGNOSTICS")?;
    }

    Ok(runtime)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Stands in for the sensor board on the I2C bus. Every air data read starts
/// a new cycle, and the values drift a little from cycle to cycle.
#[derive(Debug, Default)]
struct SimulatedBoard {
    cycle: u16,
    register: u8,
}

impl SimulatedBoard {
    fn fill(&mut self, buf: &mut [u8]) {
        buf.fill(0);
        let step = self.cycle % 20;
        let step8 = step as u8;

        match self.register {
            AIR_DATA_READ if buf.len() >= 12 => {
                self.cycle = self.cycle.wrapping_add(1);
                buf[0] = 20 + step8 / 10;
                buf[1] = step8 % 10;
                buf[2..6].copy_from_slice(&(101_300 + u32::from(step)).to_le_bytes());
                buf[6] = 45 + step8 / 4;
                buf[7] = step8 % 10;
                buf[8..12].copy_from_slice(&(82_000 + 100 * u32::from(step)).to_le_bytes());
            }
            AIR_QUALITY_DATA_READ if buf.len() >= 10 => {
                buf[0..2].copy_from_slice(&(25 + 9 * step).to_le_bytes());
                buf[2] = step8 % 10;
                buf[3..5].copy_from_slice(&(550 + 5 * step).to_le_bytes());
                buf[5] = 3;
                buf[6..8].copy_from_slice(&0_u16.to_le_bytes());
                buf[8] = 40 + step8;
                buf[9] = self.cycle.min(3) as u8;
            }
            LIGHT_DATA_READ if buf.len() >= 5 => {
                buf[0..2].copy_from_slice(&(320 + 3 * step).to_le_bytes());
                buf[2] = 25;
                buf[3..5].copy_from_slice(&(1_150 + 10 * step).to_le_bytes());
            }
            SOUND_DATA_READ if buf.len() >= 18 => {
                buf[0] = 38 + step8 / 5;
                buf[1] = step8 % 10;
                for band in 0..SOUND_FREQ_BANDS {
                    buf[2 + band] = 44 - 2 * band as u8;
                    buf[2 + SOUND_FREQ_BANDS + band] = (step8 + band as u8) % 10;
                }
                buf[14..16].copy_from_slice(&(12 + step).to_le_bytes());
                buf[16] = 34;
                buf[17] = u8::from(self.cycle > 1);
            }
            PARTICLE_DATA_READ if buf.len() >= 4 => {
                buf[0] = 1;
                buf[1] = 50 + step8;
                buf[2..4].copy_from_slice(&(180 + 4 * step).to_le_bytes());
            }
            _ => {}
        }
    }
}

impl ErrorType for SimulatedBoard {
    type Error = Infallible;
}

impl I2c for SimulatedBoard {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        self.register = register;
                    }
                }
                Operation::Read(buf) => self.fill(buf),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sense_web_common::{registers::I2C_ADDR_SB_OPEN, types::Readings};

    use super::*;

    fn read_cycle(board: &mut SenseBoard<SimulatedBoard>) -> Readings {
        match board.read_readings(true) {
            Ok(readings) => readings,
            Err(err) => panic!("simulated read failed: {err}"),
        }
    }

    #[test]
    fn simulated_board_drifts_between_cycles() {
        let mut board = SenseBoard::new(SimulatedBoard::default(), I2C_ADDR_SB_OPEN);

        let first = read_cycle(&mut board);
        let second = read_cycle(&mut board);

        assert_ne!(first, second);
        assert!(!first.air.temperature.negative);
        assert_eq!(first.particle.occupancy_pct.integer, 1);
        assert!(second.sound.stable);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
