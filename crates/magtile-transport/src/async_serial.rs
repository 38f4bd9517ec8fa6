//! tokio adapter for the blocking serial driver.
//!
//! The driver only offers blocking reads with a timeout, so the port is
//! pumped by two named threads into an in-memory duplex pipe whose host end
//! is handed to the session.

use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::serial::{PortConfig, SerialPortOpener, SerialStream};
use crate::traits::{AsyncPortOpener, PortOpener, SerialLink};

/// Capacity of the pipe between the pump threads and the session.
const BRIDGE_BUFFER_SIZE: usize = 4 * 1024;
const PUMP_CHUNK_SIZE: usize = 1024;

/// Opens the configured serial device for an async session.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct AsyncSerialPortOpener {
    inner: SerialPortOpener,
}

impl AsyncSerialPortOpener {
    pub fn new(config: PortConfig) -> Self {
        Self {
            inner: SerialPortOpener::new(config),
        }
    }

    pub fn config(&self) -> &PortConfig {
        self.inner.config()
    }
}

impl AsyncPortOpener for AsyncSerialPortOpener {
    type Stream = DuplexStream;

    async fn open(&self) -> Result<DuplexStream> {
        let opener = self.inner.clone();
        let port = tokio::task::spawn_blocking(move || opener.open())
            .await
            .map_err(|err| TransportError::Io(std::io::Error::other(err)))??;
        bridge(port)
    }
}

/// Connect `port` to a duplex pipe and return the host end.
///
/// Shutting down or dropping the host end stops both pumps and releases the
/// port. A driver error or end of input shows up as end of stream on the
/// host end.
fn bridge(port: SerialStream) -> Result<DuplexStream> {
    let reader = port.try_clone()?;
    let (host, device) = tokio::io::duplex(BRIDGE_BUFFER_SIZE);
    let (from_host, to_host) = tokio::io::split(device);
    let closed = Arc::new(AtomicBool::new(false));
    let runtime = Handle::current();

    {
        let closed = closed.clone();
        let runtime = runtime.clone();
        thread::Builder::new()
            .name("magtile-serial-rx".into())
            .spawn(move || pump_inbound(reader, to_host, &closed, &runtime))?;
    }

    let spawned = {
        let closed = closed.clone();
        thread::Builder::new()
            .name("magtile-serial-tx".into())
            .spawn(move || pump_outbound(port, from_host, &closed, &runtime))
    };
    if let Err(err) = spawned {
        closed.store(true, Ordering::Release);
        return Err(err.into());
    }

    debug!("serial bridge started");
    Ok(host)
}

fn pump_inbound(
    mut port: SerialStream,
    mut to_host: WriteHalf<DuplexStream>,
    closed: &AtomicBool,
    runtime: &Handle,
) {
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];
    while !closed.load(Ordering::Acquire) {
        let read = match port.read_once(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                continue
            }
            Err(err) => {
                warn!(error = %err, "serial read failed");
                break;
            }
        };
        if runtime.block_on(to_host.write_all(&chunk[..read])).is_err() {
            break; // host end dropped
        }
    }

    let _ = runtime.block_on(to_host.shutdown());
    debug!("serial read pump stopped");
}

fn pump_outbound(
    mut port: SerialStream,
    mut from_host: ReadHalf<DuplexStream>,
    closed: &AtomicBool,
    runtime: &Handle,
) {
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];
    loop {
        let read = match runtime.block_on(from_host.read(&mut chunk)) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if let Err(err) = port.write_all(&chunk[..read]).and_then(|()| port.flush()) {
            warn!(error = %err, "serial write failed");
            break;
        }
    }

    closed.store(true, Ordering::Release);
    if let Err(err) = port.discard_input() {
        debug!(error = %err, "discard input on close failed");
    }
    debug!("serial write pump stopped");
}
