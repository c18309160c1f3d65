use std::{io, sync::Arc};

use embedded_hal::i2c::I2c;
use thiserror::Error;

use crate::{
    board::{BoardError, SenseBoard},
    config::{DiagnosticsMode, SenseConfig},
    cycle::{self, CyclePeriod},
    page::{self, PageBuffer, PageOptions},
    ready::ReadySignal,
    report,
    responder::{serve_client, Connections, ServeOutcome},
    types::Readings,
};

#[derive(Debug, Error)]
pub enum StationError<E: core::fmt::Debug> {
    #[error("failed to configure the sensor board: {0}")]
    Configure(BoardError<E>),
    #[error("failed to accept a client connection: {0}")]
    Accept(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationSettings {
    pub cycle_period: CyclePeriod,
    pub particles_enabled: bool,
    pub diagnostics: DiagnosticsMode,
}

impl From<&SenseConfig> for StationSettings {
    fn from(config: &SenseConfig) -> Self {
        Self {
            cycle_period: config.cycle_period,
            particles_enabled: config.particle_sensor,
            diagnostics: config.diagnostics,
        }
    }
}

impl StationSettings {
    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            refresh_seconds: self.cycle_period.refresh_seconds(),
            particles_enabled: self.particles_enabled,
        }
    }
}

/// What one pass of the main loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// New readings were ingested and the page rebuilt.
    Refreshed,
    /// The ready signal fired but the board could not be read.
    ReadFailed,
    /// A client was taken from the queue.
    Served(ServeOutcome),
    Idle,
}

/// State owned by the main loop: the board, the latest readings and the
/// page that is served until the next refresh.
pub struct Station<I2C> {
    board: SenseBoard<I2C>,
    settings: StationSettings,
    ready: Arc<ReadySignal>,
    readings: Readings,
    page: PageBuffer,
}

impl<I2C> Station<I2C>
where
    I2C: I2c,
{
    pub fn new(board: SenseBoard<I2C>, settings: StationSettings, ready: Arc<ReadySignal>) -> Self {
        Self {
            board,
            settings,
            ready,
            readings: Readings::default(),
            page: PageBuffer::new(),
        }
    }

    /// Starts cycle mode and prepares the all-zero page served until the
    /// first cycle completes.
    pub fn start(&mut self) -> Result<(), StationError<I2C::Error>> {
        cycle::configure(
            &mut self.board,
            self.settings.cycle_period,
            self.settings.particles_enabled,
        )
        .map_err(StationError::Configure)?;
        log::info!(
            "cycle mode started: period {}, particle sensor {}",
            self.settings.cycle_period,
            if self.settings.particles_enabled { "on" } else { "off" }
        );
        self.rebuild_page();
        Ok(())
    }

    /// Refreshes when the ready signal has fired, otherwise serves at most
    /// one waiting client.
    pub fn poll<C: Connections>(
        &mut self,
        connections: &mut C,
    ) -> Result<Poll, StationError<I2C::Error>> {
        if self.ready.take() {
            return Ok(self.refresh());
        }

        let Some(mut stream) = connections.poll_accept()? else {
            return Ok(Poll::Idle);
        };
        match serve_client(&mut stream, self.page.as_bytes()) {
            Ok(outcome) => Ok(Poll::Served(outcome)),
            Err(err) => {
                log::warn!("client dropped: {err}");
                Ok(Poll::Served(ServeOutcome::Disconnected))
            }
        }
    }

    fn refresh(&mut self) -> Poll {
        match self.board.read_readings(self.settings.particles_enabled) {
            Ok(readings) => {
                self.readings = readings;
                self.rebuild_page();
                report::emit(
                    self.settings.diagnostics,
                    &self.readings,
                    self.settings.particles_enabled,
                );
                Poll::Refreshed
            }
            Err(err) => {
                log::warn!("sensor read failed, keeping previous readings: {err}");
                Poll::ReadFailed
            }
        }
    }

    fn rebuild_page(&mut self) {
        if let Err(err) = page::render(&mut self.page, &self.readings, self.settings.page_options())
        {
            log::error!("page not rebuilt, serving 503 instead: {err}");
        }
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn settings(&self) -> StationSettings {
        self.settings
    }

    pub fn board_mut(&mut self) -> &mut SenseBoard<I2C> {
        &mut self.board
    }

    pub fn ready(&self) -> &Arc<ReadySignal> {
        &self.ready
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;
    use crate::{
        registers::{AIR_DATA_READ, CYCLE_MODE_CMD, CYCLE_TIME_PERIOD_REG, I2C_ADDR_SB_OPEN},
        testing::{FakeBus, FakeConnections},
    };

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: sense\r\n\r\n";

    fn station(bus: FakeBus) -> Station<FakeBus> {
        let settings = StationSettings {
            cycle_period: CyclePeriod::Seconds100,
            particles_enabled: false,
            diagnostics: DiagnosticsMode::Off,
        };
        let mut station = Station::new(
            SenseBoard::new(bus, I2C_ADDR_SB_OPEN),
            settings,
            Arc::new(ReadySignal::new()),
        );
        station.start().unwrap();
        station
    }

    fn cold_air_bus() -> FakeBus {
        let mut bus = FakeBus::default();
        bus.set_block(AIR_DATA_READ, &[0x80 | 5, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        bus
    }

    #[test]
    fn start_configures_board_and_serves_zero_page() {
        let station = station(FakeBus::default());

        assert!(station.page().contains("Refresh: 30\r\n"));
        assert!(station.page().contains("<td>0.0</td><td>&deg;C</td>"));
        assert_eq!(station.page().matches("<h2>").count(), 4);
        assert_eq!(station.readings(), &Readings::default());
    }

    #[test]
    fn start_sends_cycle_commands() {
        let station = station(FakeBus::default());
        let Station { board, .. } = station;

        assert_eq!(
            board.release().writes(),
            vec![vec![CYCLE_TIME_PERIOD_REG, 1], vec![CYCLE_MODE_CMD]]
        );
    }

    #[test]
    fn idle_without_ready_or_clients() {
        let mut station = station(FakeBus::default());
        let mut connections = FakeConnections::default();

        assert_eq!(station.poll(&mut connections).unwrap(), Poll::Idle);
    }

    #[test]
    fn ready_signal_rebuilds_page_before_serving() {
        let mut station = station(cold_air_bus());
        let mut connections = FakeConnections::default();
        let client = connections.connect(REQUEST);

        station.ready().assert();
        assert_eq!(station.poll(&mut connections).unwrap(), Poll::Refreshed);
        assert!(!station.ready().is_asserted());
        assert!(client.borrow().response.is_empty());

        assert_eq!(
            station.poll(&mut connections).unwrap(),
            Poll::Served(ServeOutcome::Responded)
        );
        let response = String::from_utf8(client.borrow().response.clone()).unwrap();
        assert!(response.contains("<td>-5.2</td>"));
        assert_eq!(response, station.page());
    }

    #[test]
    fn failed_read_keeps_previous_page() {
        let mut station = station(cold_air_bus());
        let mut connections = FakeConnections::default();
        station.ready().assert();
        station.poll(&mut connections).unwrap();
        let before = station.page().to_string();

        station.board_mut().bus_mut().fail_reads = true;
        station.ready().assert();

        assert_eq!(station.poll(&mut connections).unwrap(), Poll::ReadFailed);
        assert_eq!(station.page(), before);
        assert!(station.readings().air.temperature.negative);
    }

    #[test]
    fn early_disconnect_is_not_answered() {
        let mut station = station(FakeBus::default());
        let mut connections = FakeConnections::default();
        let client = connections.connect(b"GET / HTTP/1.1\r\n");

        assert_eq!(
            station.poll(&mut connections).unwrap(),
            Poll::Served(ServeOutcome::Disconnected)
        );
        assert!(client.borrow().response.is_empty());
    }

    #[test]
    fn accept_failure_is_reported_and_the_next_poll_recovers() {
        let mut station = station(FakeBus::default());
        let mut connections = FakeConnections::default();
        connections.accept_error = Some(ErrorKind::ConnectionAborted);
        let client = connections.connect(REQUEST);

        let err = station.poll(&mut connections).unwrap_err();
        assert!(
            matches!(&err, StationError::Accept(source) if source.kind() == ErrorKind::ConnectionAborted)
        );
        assert!(client.borrow().response.is_empty());

        assert_eq!(
            station.poll(&mut connections).unwrap(),
            Poll::Served(ServeOutcome::Responded)
        );
        assert_eq!(client.borrow().response, station.page().as_bytes());
    }
}
