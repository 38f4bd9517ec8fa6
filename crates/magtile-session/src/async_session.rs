use futures_util::{SinkExt, StreamExt};
use magtile_line::{Command, DeviceCommand, FramingError, LineCodec, Response};
use magtile_transport::{AsyncPortOpener, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::reply::{Reply, CONNECTED, DISCONNECTED};
use crate::state::ConnectionState;

struct Inner<S> {
    state: ConnectionState,
    link: Option<Framed<S, LineCodec>>,
}

/// Async connection to one MagTile controller.
///
/// Methods take `&self`; state and link sit behind a tokio mutex, so
/// concurrent callers are queued and only one command is ever outstanding.
/// There is no timeout; wrap calls in `tokio::time::timeout` if needed.
/// [`AsyncSerialPortOpener`](magtile_transport::AsyncSerialPortOpener) opens
/// a real device.
pub struct AsyncSession<O: AsyncPortOpener> {
    opener: O,
    config: SessionConfig,
    inner: Mutex<Inner<O::Stream>>,
}

impl<O: AsyncPortOpener> AsyncSession<O> {
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, SessionConfig::default())
    }

    pub fn with_config(opener: O, config: SessionConfig) -> Self {
        Self {
            opener,
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                link: None,
            }),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the port and discard the power-up banner.
    pub async fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != ConnectionState::Disconnected {
            return Err(SessionError::AlreadyConnected);
        }

        inner.state = ConnectionState::Connecting;
        match self.establish().await {
            Ok(link) => {
                inner.link = Some(link);
                inner.state = ConnectionState::Connected;
                info!("connected to device");
                Ok(())
            }
            Err(err) => {
                inner.state = ConnectionState::Disconnected;
                warn!(error = %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<Framed<O::Stream, LineCodec>> {
        let stream = self.opener.open().await?;
        let mut link = Framed::new(stream, LineCodec::with_config(self.config.line.clone()));

        if self.config.drain_banner {
            match next_line(&mut link).await {
                Ok(banner) => debug!(banner = %banner, "discarded banner"),
                Err(err) => {
                    if let Err(close_err) = release(link).await {
                        debug!(error = %close_err, "close after failed connect");
                    }
                    return Err(err);
                }
            }
        }

        Ok(link)
    }

    pub async fn connect(&self) -> Reply {
        match self.open().await {
            Ok(()) => Reply::success(CONNECTED),
            Err(err) => Reply::error(err.to_string()),
        }
    }

    /// Shut down the stream and drop any unread input.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(link) = inner.link.take() else {
            inner.state = ConnectionState::Disconnected;
            return Ok(());
        };

        inner.state = ConnectionState::Disconnecting;
        let result = release(link).await;
        inner.state = ConnectionState::Disconnected;
        match &result {
            Ok(()) => info!("disconnected from device"),
            Err(err) => warn!(error = %err, "disconnect failed"),
        }
        result
    }

    pub async fn disconnect(&self) -> Reply {
        match self.close().await {
            Ok(()) => Reply::success(DISCONNECTED),
            Err(err) => Reply::error(err.to_string()),
        }
    }

    pub async fn send_command<I, T>(&self, verb: &str, args: I) -> Result<Response>
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.send(&Command::with_args(verb, args)).await
    }

    /// Send a prepared command and classify the single reply line.
    ///
    /// The lock is held from write until the reply is read.
    pub async fn send(&self, command: &Command) -> Result<Response> {
        let mut inner = self.inner.lock().await;
        let link = inner.link.as_mut().ok_or(SessionError::NotConnected)?;

        debug!(command = %command, "sending command");
        let result = match link.send(command).await {
            Ok(()) => next_line(link).await,
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(line) => {
                debug!(response = %line, "received response");
                Ok(Response::classify(&line))
            }
            Err(err) => {
                warn!(command = %command, error = %err, "command failed");
                if let Some(link) = inner.link.take() {
                    if err.is_link_fatal() {
                        if let Err(close_err) = release(link).await {
                            debug!(error = %close_err, "close after link failure");
                        }
                        inner.state = ConnectionState::Disconnected;
                        info!("link lost, session disconnected");
                    } else {
                        inner.link = Some(rearm(link));
                    }
                }
                Err(err)
            }
        }
    }

    pub async fn execute(&self, command: &DeviceCommand) -> Reply {
        self.send(&command.to_command()).await.into()
    }

    pub async fn read_width(&self) -> Reply {
        self.execute(&DeviceCommand::ReadWidth).await
    }

    pub async fn read_height(&self) -> Reply {
        self.execute(&DeviceCommand::ReadHeight).await
    }

    pub async fn write_width(&self, value: u32) -> Reply {
        self.execute(&DeviceCommand::WriteWidth(value)).await
    }

    pub async fn write_height(&self, value: u32) -> Reply {
        self.execute(&DeviceCommand::WriteHeight(value)).await
    }

    pub async fn write_address_list(&self, addresses: &[u32]) -> Reply {
        self.execute(&DeviceCommand::WriteAddressList(addresses.to_vec()))
            .await
    }

    pub async fn read_address_list(&self) -> Reply {
        self.execute(&DeviceCommand::ReadAddressList).await
    }

    pub async fn scan_addresses(&self) -> Reply {
        self.execute(&DeviceCommand::ScanAddresses).await
    }

    pub async fn blinkall_start(&self) -> Reply {
        self.execute(&DeviceCommand::BlinkAllStart).await
    }

    pub async fn blinkall_stop(&self) -> Reply {
        self.execute(&DeviceCommand::BlinkAllStop).await
    }

    pub async fn test_led_enable(&self, address: u32) -> Reply {
        self.execute(&DeviceCommand::TestLedEnable(address)).await
    }

    pub async fn test_led_disable(&self, address: u32) -> Reply {
        self.execute(&DeviceCommand::TestLedDisable(address)).await
    }

    pub async fn store_config(&self) -> Reply {
        self.execute(&DeviceCommand::StoreConfig).await
    }

    pub async fn set_power(&self, row: u32, col: u32, power: u32) -> Reply {
        self.execute(&DeviceCommand::SetPower { row, col, power })
            .await
    }

    pub async fn get_power(&self, row: u32, col: u32) -> Reply {
        self.execute(&DeviceCommand::GetPower { row, col }).await
    }
}

async fn next_line<S>(link: &mut Framed<S, LineCodec>) -> Result<String>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match link.next().await {
        Some(line) => Ok(line?),
        None => Err(FramingError::StreamClosed.into()),
    }
}

/// Rebuild the framed link, keeping buffered bytes and codec state.
///
/// `Framed` ends its stream once after a decoder error; a fresh one picks up
/// where the old one stopped.
fn rearm<S>(link: Framed<S, LineCodec>) -> Framed<S, LineCodec> {
    Framed::from_parts(link.into_parts())
}

async fn release<S>(link: Framed<S, LineCodec>) -> Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    // Unread bytes in the codec buffer are dropped with the Framed.
    let mut stream = link.into_inner();
    stream.flush().await.map_err(TransportError::Io)?;
    stream.shutdown().await.map_err(TransportError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use magtile_line::LineConfig;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    use super::*;
    use crate::reply::Status;

    struct DuplexOpener {
        host: std::sync::Mutex<Option<DuplexStream>>,
    }

    impl AsyncPortOpener for DuplexOpener {
        type Stream = DuplexStream;

        async fn open(&self) -> magtile_transport::Result<DuplexStream> {
            self.host
                .lock()
                .unwrap()
                .take()
                .ok_or(TransportError::NoDeviceSelected)
        }
    }

    fn pair() -> (DuplexOpener, BufReader<DuplexStream>) {
        let (host, device) = tokio::io::duplex(1024);
        let opener = DuplexOpener {
            host: std::sync::Mutex::new(Some(host)),
        };
        (opener, BufReader::new(device))
    }

    async fn read_line(device: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        device.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn connect_and_read_width() {
        let (opener, mut device) = pair();
        device.write_all(b"MagTile ready\r\n").await.unwrap();
        let session = AsyncSession::new(opener);

        assert_eq!(session.connect().await, Reply::success("Connected to device"));
        assert!(session.is_connected().await);

        let reply = tokio::join!(session.read_width(), async {
            assert_eq!(read_line(&mut device).await, "read_width\n");
            device.write_all(b"ok : 128\n").await.unwrap();
        })
        .0;
        assert_eq!(reply, Reply::success("128"));

        assert!(session.disconnect().await.is_success());
        assert!(session.disconnect().await.is_success());
        assert_eq!(session.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn stream_closed_before_banner() {
        let (opener, device) = pair();
        drop(device);
        let session = AsyncSession::new(opener);

        let reply = session.connect().await;
        assert_eq!(reply.status, Status::Error);
        assert_eq!(session.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn error_and_unknown_replies() {
        let (opener, mut device) = pair();
        device
            .write_all(b"ready\nerror\nwat\n")
            .await
            .unwrap();
        let session = AsyncSession::new(opener);
        session.open().await.unwrap();

        assert_eq!(session.scan_addresses().await, Reply::error("Command error"));
        assert_eq!(
            session.send_command("read_height", [0u32; 0]).await.unwrap(),
            Response::ProtocolError("wat".to_string())
        );
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn not_connected_and_already_connected() {
        let (opener, mut device) = pair();
        let session = AsyncSession::new(opener);
        assert_eq!(
            session.store_config().await,
            Reply::error("not connected to device")
        );

        device.write_all(b"ready\n").await.unwrap();
        session.open().await.unwrap();
        assert!(matches!(
            session.open().await,
            Err(SessionError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn link_loss_disconnects() {
        let (opener, mut device) = pair();
        device.write_all(b"ready\n").await.unwrap();
        let session = AsyncSession::new(opener);
        session.open().await.unwrap();

        let (reply, ()) = tokio::join!(session.get_power(0, 1), async {
            assert_eq!(read_line(&mut device).await, "get_power 0 1\n");
            drop(device);
        });
        assert!(!reply.is_success());
        assert_eq!(session.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn overlong_reply_keeps_link_usable() {
        let (opener, mut device) = pair();
        device
            .write_all(b"ready\nok : 1 2 3 4 5 6 7 8\nok : 3\n")
            .await
            .unwrap();
        let session = AsyncSession::with_config(
            opener,
            SessionConfig {
                line: LineConfig { max_line_length: 8 },
                ..SessionConfig::default()
            },
        );
        session.open().await.unwrap();

        assert!(matches!(
            session.send_command("read_address_list", [0u32; 0]).await,
            Err(SessionError::Framing(FramingError::LineTooLong { len: 20, max: 8 }))
        ));
        assert!(session.is_connected().await);

        assert_eq!(
            session.send_command("read_width", [0u32; 0]).await.unwrap(),
            Response::Success("3".to_string())
        );
    }

    #[tokio::test]
    async fn overlong_reply_split_across_writes() {
        let (opener, mut device) = pair();
        device.write_all(b"ready\n").await.unwrap();
        let session = AsyncSession::with_config(
            opener,
            SessionConfig {
                line: LineConfig { max_line_length: 8 },
                ..SessionConfig::default()
            },
        );
        session.open().await.unwrap();

        let (first, ()) = tokio::join!(session.read_address_list(), async {
            assert_eq!(read_line(&mut device).await, "read_address_list\n");
            device.write_all(b"ok : 1 2 3 4 5").await.unwrap();
        });
        assert_eq!(first, Reply::error("line too long (14 bytes, max 8)"));
        assert!(session.is_connected().await);

        let (second, ()) = tokio::join!(session.read_width(), async {
            assert_eq!(read_line(&mut device).await, "read_width\n");
            device.write_all(b" 6 7 8\nok : 3\n").await.unwrap();
        });
        assert_eq!(second, Reply::success("3"));
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let (opener, mut device) = pair();
        device.write_all(b"ready\n").await.unwrap();
        let session = AsyncSession::new(opener);
        session.open().await.unwrap();

        let device_side = async {
            for _ in 0..2 {
                let line = read_line(&mut device).await;
                // Nothing else may arrive until this command is answered.
                let mut extra = String::new();
                let waited = tokio::time::timeout(
                    Duration::from_millis(50),
                    device.read_line(&mut extra),
                )
                .await;
                assert!(waited.is_err(), "second command sent early: {extra:?}");

                let reply = format!("ok : {}\n", line.trim_end());
                device.write_all(reply.as_bytes()).await.unwrap();
            }
        };

        let (width, height, ()) =
            tokio::join!(session.read_width(), session.read_height(), device_side);
        assert_eq!(width, Reply::success("read_width"));
        assert_eq!(height, Reply::success("read_height"));
    }
}
