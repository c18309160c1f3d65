use core::convert::TryInto;
use std::{net::Ipv4Addr, sync::Arc, thread, time::Duration};

use anyhow::{anyhow, Context};
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    gpio::{Input, InputPin, InterruptType, PinDriver, Pull},
    i2c::{I2cConfig, I2cDriver},
    units::FromValueType,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    ipv4::{Configuration as IpConfiguration, Mask, RouterConfiguration, Subnet},
    log::EspLogger,
    netif::{EspNetif, NetifConfiguration},
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{error, info, warn};

use sense_web_common::{
    config::NetworkConfig, NetworkMode, Poll, ReadySignal, RuntimeConfig, SenseBoard, Station,
    StationSettings, TcpConnections,
};

const I2C_BAUDRATE_KHZ: u32 = 100;
const AP_CHANNEL: u8 = 1;
const AP_SUBNET_BITS: u8 = 24;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 2_000;
const READY_POLL_MS: u64 = 5;
const RESET_SETTLE_MS: u64 = 5;
const ACCEPT_RETRY_MS: u64 = 100;

pub fn run() {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    if let Err(err) = start() {
        error!("fatal: {err:#}");
        // Nothing is retried; the device waits for a physical reset.
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}

fn start() -> anyhow::Result<()> {
    let runtime = load_runtime_config()?;
    info!(
        "cycle period {}, particle sensor {}, network mode {:?}",
        runtime.sense.cycle_period,
        if runtime.sense.particle_sensor { "on" } else { "off" },
        runtime.network.mode
    );

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let i2c = I2cDriver::new(
        i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into()),
    )
    .context("failed to initialize i2c bus")?;
    let mut board = SenseBoard::new(i2c, runtime.sense.i2c_address);

    let mut ready_pin = PinDriver::input(pins.gpio23)?;
    ready_pin.set_pull(Pull::Up)?;

    wait_for_ready(&ready_pin);
    board
        .reset()
        .map_err(|err| anyhow!("failed to reset sensor board: {err}"))?;
    thread::sleep(Duration::from_millis(RESET_SETTLE_MS));
    wait_for_ready(&ready_pin);

    let mut wifi = start_wifi(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;

    let ready = Arc::new(ReadySignal::new());
    ready_pin.set_interrupt_type(InterruptType::NegEdge)?;
    let isr_ready = Arc::clone(&ready);
    // SAFETY: the callback only stores to an atomic, which is allowed in ISR context.
    unsafe {
        ready_pin.subscribe(move || isr_ready.assert())?;
    }

    let mut station = Station::new(board, StationSettings::from(&runtime.sense), ready);
    station
        .start()
        .map_err(|err| anyhow!("failed to start measurement cycle: {err}"))?;
    ready_pin.enable_interrupt()?;

    let timeout = runtime.sense.client_timeout_ms.map(Duration::from_millis);
    let mut connections = TcpConnections::bind(runtime.network.http_port, timeout)
        .context("failed to open http listener")?;
    info!("http responder listening on port {}", runtime.network.http_port);

    loop {
        match station.poll(&mut connections) {
            Ok(Poll::Refreshed | Poll::ReadFailed) => {
                ready_pin.enable_interrupt()?;
                if runtime.network.mode == NetworkMode::Join {
                    ensure_station_link(&mut wifi, &runtime.network);
                }
            }
            Ok(Poll::Served(outcome)) => info!("client handled: {outcome:?}"),
            Ok(Poll::Idle) => thread::sleep(Duration::from_millis(1)),
            Err(err) => {
                warn!("responder error: {err}");
                thread::sleep(Duration::from_millis(ACCEPT_RETRY_MS));
            }
        }
    }
}

fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let mut runtime = match option_env!("SENSE_CONFIG_JSON") {
        Some(json) => RuntimeConfig::from_json(json).context("SENSE_CONFIG_JSON is not valid")?,
        None => RuntimeConfig::default(),
    };

    if runtime.network.wifi_ssid.is_empty() {
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or_default().to_string();
    }
    if runtime.network.wifi_pass.is_empty() {
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or_default().to_string();
    }

    runtime.validate().context("invalid configuration")?;
    Ok(runtime)
}

/// The board holds READY high until it can accept commands.
fn wait_for_ready<P: InputPin>(pin: &PinDriver<'_, P, Input>) {
    while pin.is_high() {
        thread::sleep(Duration::from_millis(READY_POLL_MS));
    }
}

fn ipv4_from_octets(ip: [u8; 4]) -> Ipv4Addr {
    Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])
}

fn start_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;

    if network.mode == NetworkMode::Host {
        let address = ipv4_from_octets(network.static_ip);
        let mut conf = NetifConfiguration::wifi_default_router();
        conf.ip_configuration = Some(IpConfiguration::Router(RouterConfiguration {
            subnet: Subnet {
                gateway: address,
                mask: Mask(AP_SUBNET_BITS),
            },
            dhcp_enabled: true,
            dns: Some(address),
            secondary_dns: None,
        }));
        esp_wifi
            .swap_netif_ap(EspNetif::new_with_conf(&conf)?)
            .context("failed to apply access point address")?;
    }

    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;
    match network.mode {
        NetworkMode::Host => start_access_point(&mut wifi, network)?,
        NetworkMode::Join => join_network(&mut wifi, network)?,
    }
    Ok(wifi)
}

fn start_access_point(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    network: &NetworkConfig,
) -> anyhow::Result<()> {
    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method: AuthMethod::WPA2Personal,
        channel: AP_CHANNEL,
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.wait_netif_up()?;
    info!(
        "access point `{}` up at {}",
        network.wifi_ssid,
        ipv4_from_octets(network.static_ip)
    );
    Ok(())
}

fn join_network(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    network: &NetworkConfig,
) -> anyhow::Result<()> {
    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);
    connect_with_retries(wifi)?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("joined `{}` as {}", network.wifi_ssid, ip_info.ip);
    Ok(())
}

fn connect_with_retries(wifi: &mut BlockingWifi<EspWifi<'static>>) -> anyhow::Result<()> {
    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    Err(match last_err {
        Some(err) => anyhow::Error::from(err)
            .context(format!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed")),
        None => anyhow!("wifi connect was never attempted"),
    })
}

/// Rejoins the network when the link dropped during the last cycle.
fn ensure_station_link(wifi: &mut BlockingWifi<EspWifi<'static>>, network: &NetworkConfig) {
    match wifi.is_connected() {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            warn!("wifi link to `{}` lost, reconnecting", network.wifi_ssid);
            let _ = wifi.disconnect();
            if let Err(err) = connect_with_retries(wifi) {
                warn!("wifi reconnect failed: {err:#}");
            }
        }
    }
}
