use crate::engine::Settings;
use crate::schedule::Cadence;
use crate::transport::{Link, Pacing};
use std::path::{Path, PathBuf};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt as _;
use tracing::{debug, info, trace};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("lookup of `{1}` failed")]
    LookupHost(#[source] std::io::Error, String),
    #[error("could not connect to `{1}` over TCP")]
    Connect(#[source] std::io::Error, String),
    #[error("could not open the serial port at {1:?}")]
    OpenSerial(#[source] tokio_serial::Error, PathBuf),
    #[error("neither a serial port nor a TCP address to connect to was given")]
    NoLink,
}

#[derive(clap::Parser, Clone)]
#[group(id = "connection::Args")]
pub struct Args {
    #[clap(flatten)]
    how: ConnectionGroup,

    /// The baudrate of the controller's serial port.
    #[arg(long, default_value = "38400")]
    baudrate: u32,

    /// How long to wait after waking the controller up before sending a command.
    ///
    /// The controller drops commands that arrive too soon after the wake-up newline.
    #[arg(long, default_value = "50ms")]
    settle_delay: humantime::Duration,

    /// Give up on a command if the controller does not start answering in this amount of time.
    #[arg(long, default_value = "1s")]
    response_timeout: humantime::Duration,

    /// Consider a response finished once the line stays quiet for this long.
    #[arg(long, default_value = "250ms")]
    read_timeout: humantime::Duration,

    /// Pause between the individual commands of a multi-command write, such as setting the
    /// clock.
    #[arg(long, default_value = "100ms")]
    burst_gap: humantime::Duration,

    /// Request the full status this often.
    #[arg(long, default_value = "60s")]
    poll_interval: humantime::Duration,

    /// Request the full status again this soon after a failed attempt.
    #[arg(long, default_value = "1s")]
    retry_interval: humantime::Duration,

    /// Wait this long after a write before requesting the status, so that several writes in
    /// quick succession are followed by a single status request.
    #[arg(long, default_value = "500ms")]
    debounce: humantime::Duration,
}

#[derive(clap::Parser, Clone)]
#[group(required = true, multiple = false)]
pub struct ConnectionGroup {
    /// Talk to the controller over a local serial port.
    ///
    /// Specify the path to the serial device.
    #[arg(long)]
    serial: Option<PathBuf>,
    /// Talk to the controller through a serial-to-TCP bridge (e.g. `192.168.1.20:8899`).
    #[arg(long)]
    tcp: Option<String>,
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            pacing: Pacing {
                settle_delay: *self.settle_delay,
                response_timeout: *self.response_timeout,
                read_timeout: *self.read_timeout,
                burst_gap: *self.burst_gap,
                ..Pacing::default()
            },
            cadence: Cadence {
                poll_interval: *self.poll_interval,
                retry_interval: *self.retry_interval,
                debounce: *self.debounce,
            },
        }
    }

    pub async fn open(&self) -> Result<Box<dyn Link>, Error> {
        match (&self.how.serial, &self.how.tcp) {
            (Some(path), _) => self.open_serial(path),
            (None, Some(address)) => Self::connect(address).await,
            (None, None) => Err(Error::NoLink),
        }
    }

    fn open_serial(&self, path: &Path) -> Result<Box<dyn Link>, Error> {
        info!(message = "opening serial port", ?path, baudrate = self.baudrate);
        let port = tokio_serial::new(path.to_string_lossy(), self.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| Error::OpenSerial(e, path.to_path_buf()))?;
        Ok(Box::new(port))
    }

    async fn connect(address: &str) -> Result<Box<dyn Link>, Error> {
        info!(message = "connecting...", address);
        let addresses = tokio::net::lookup_host(address)
            .await
            .map_err(|e| Error::LookupHost(e, address.to_string()))?
            .collect::<Vec<_>>();
        debug!(message = "resolved", ?addresses);
        let socket = TcpStream::connect(&*addresses)
            .await
            .map_err(|e| Error::Connect(e, address.to_string()))?;
        let nodelay_result = socket.set_nodelay(true);
        trace!(message = "setting nodelay", is_error = ?nodelay_result.err());
        info!(message = "connected");
        Ok(Box::new(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use std::time::Duration;

    #[test]
    fn defaults_match_the_protocol_timings() {
        let args = Args::parse_from(["test", "--serial", "/dev/ttyUSB0"]);
        let settings = args.settings();
        assert_eq!(args.baudrate, 38400);
        assert_eq!(settings.pacing.settle_delay, Duration::from_millis(50));
        assert_eq!(settings.pacing.response_timeout, Duration::from_secs(1));
        assert_eq!(settings.pacing.read_timeout, Duration::from_millis(250));
        assert_eq!(settings.pacing.burst_gap, Duration::from_millis(100));
        assert_eq!(settings.cadence.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.cadence.retry_interval, Duration::from_secs(1));
        assert_eq!(settings.cadence.debounce, Duration::from_millis(500));
    }

    #[test]
    fn exactly_one_link_is_required() {
        assert!(Args::try_parse_from(["test"]).is_err());
        assert!(Args::try_parse_from(["test", "--serial", "/dev/ttyS0", "--tcp", "a:1"]).is_err());
        let args =
            Args::try_parse_from(["test", "--tcp", "spa.local:8899", "--poll-interval", "5s"]);
        assert_eq!(args.unwrap().settings().cadence.poll_interval, Duration::from_secs(5));
    }
}
