use bytes::BytesMut;
use magtile_line::{encode_command, Command, DeviceCommand, LineFramer, Response};
use magtile_transport::{PortOpener, TransportHandle};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::reply::{Reply, CONNECTED, DISCONNECTED};
use crate::state::ConnectionState;

/// The open half of a session: the transport plus the framer that must
/// outlive individual reads.
struct Link<S> {
    transport: TransportHandle<S>,
    framer: LineFramer,
}

impl<S: magtile_transport::SerialLink> Link<S> {
    fn read_line(&mut self) -> Result<String> {
        Ok(self.framer.next_line(&mut self.transport)?)
    }

    fn exchange(&mut self, wire: &[u8]) -> Result<String> {
        self.transport.write_bytes(wire)?;
        self.read_line()
    }

    fn close(mut self) -> Result<()> {
        self.framer.clear();
        Ok(self.transport.close()?)
    }
}

/// A blocking connection to one MagTile controller.
///
/// Every exchange is one command line out and exactly one reply line in.
/// Operations take `&mut self`, so a second command cannot be issued while
/// one is outstanding. There is no timeout; a silent device blocks the caller.
pub struct Session<O: PortOpener> {
    opener: O,
    config: SessionConfig,
    state: ConnectionState,
    link: Option<Link<O::Stream>>,
    write_buf: BytesMut,
}

impl<O: PortOpener> Session<O> {
    /// Create a disconnected session with default configuration.
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, SessionConfig::default())
    }

    /// Create a disconnected session with explicit configuration.
    pub fn with_config(opener: O, config: SessionConfig) -> Self {
        Self {
            opener,
            config,
            state: ConnectionState::Disconnected,
            link: None,
            write_buf: BytesMut::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Open the port and discard the power-up banner.
    ///
    /// On failure anything already opened is closed again and the session
    /// stays `Disconnected`.
    pub fn open(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(SessionError::AlreadyConnected);
        }

        self.state = ConnectionState::Connecting;
        match self.establish() {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Connected;
                info!("connected to device");
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                warn!(error = %err, "connect failed");
                Err(err)
            }
        }
    }

    fn establish(&self) -> Result<Link<O::Stream>> {
        let transport = TransportHandle::open(&self.opener)?;
        let mut link = Link {
            transport,
            framer: LineFramer::with_config(self.config.line.clone()),
        };

        if self.config.drain_banner {
            match link.read_line() {
                Ok(banner) => debug!(banner = %banner, "discarded banner"),
                Err(err) => {
                    if let Err(close_err) = link.close() {
                        debug!(error = %close_err, "close after failed connect");
                    }
                    return Err(err);
                }
            }
        }

        Ok(link)
    }

    /// [`open`](Self::open), reported as a [`Reply`].
    pub fn connect(&mut self) -> Reply {
        match self.open() {
            Ok(()) => Reply::success(CONNECTED),
            Err(err) => Reply::error(err.to_string()),
        }
    }

    /// Flush, discard pending input and release the port.
    ///
    /// The port is released even if an earlier step fails; that failure is
    /// returned. Closing a disconnected session succeeds.
    pub fn close(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            self.state = ConnectionState::Disconnected;
            return Ok(());
        };

        self.state = ConnectionState::Disconnecting;
        let result = link.close();
        self.state = ConnectionState::Disconnected;
        match &result {
            Ok(()) => info!("disconnected from device"),
            Err(err) => warn!(error = %err, "disconnect failed"),
        }
        result
    }

    /// [`close`](Self::close), reported as a [`Reply`].
    pub fn disconnect(&mut self) -> Reply {
        match self.close() {
            Ok(()) => Reply::success(DISCONNECTED),
            Err(err) => Reply::error(err.to_string()),
        }
    }

    /// Send `verb` with `args` and classify the single reply line.
    pub fn send_command<I, T>(&mut self, verb: &str, args: I) -> Result<Response>
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.send(&Command::with_args(verb, args))
    }

    /// Send a prepared command and classify the single reply line.
    ///
    /// A closed stream or transport failure tears the link down; the session
    /// is `Disconnected` afterwards.
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;

        self.write_buf.clear();
        encode_command(command, &mut self.write_buf)?;
        debug!(command = %command, "sending command");

        match link.exchange(&self.write_buf) {
            Ok(line) => {
                debug!(response = %line, "received response");
                Ok(Response::classify(&line))
            }
            Err(err) => {
                warn!(command = %command, error = %err, "command failed");
                if err.is_link_fatal() {
                    self.teardown();
                }
                Err(err)
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(err) = link.close() {
                debug!(error = %err, "close after link failure");
            }
        }
        self.state = ConnectionState::Disconnected;
        info!("link lost, session disconnected");
    }

    /// Run a typed command.
    pub fn execute(&mut self, command: &DeviceCommand) -> Reply {
        self.send(&command.to_command()).into()
    }

    pub fn read_width(&mut self) -> Reply {
        self.execute(&DeviceCommand::ReadWidth)
    }

    pub fn read_height(&mut self) -> Reply {
        self.execute(&DeviceCommand::ReadHeight)
    }

    pub fn write_width(&mut self, value: u32) -> Reply {
        self.execute(&DeviceCommand::WriteWidth(value))
    }

    pub fn write_height(&mut self, value: u32) -> Reply {
        self.execute(&DeviceCommand::WriteHeight(value))
    }

    /// Replace the tile address list; order is preserved on the wire.
    pub fn write_address_list(&mut self, addresses: &[u32]) -> Reply {
        self.execute(&DeviceCommand::WriteAddressList(addresses.to_vec()))
    }

    pub fn read_address_list(&mut self) -> Reply {
        self.execute(&DeviceCommand::ReadAddressList)
    }

    pub fn scan_addresses(&mut self) -> Reply {
        self.execute(&DeviceCommand::ScanAddresses)
    }

    pub fn blinkall_start(&mut self) -> Reply {
        self.execute(&DeviceCommand::BlinkAllStart)
    }

    pub fn blinkall_stop(&mut self) -> Reply {
        self.execute(&DeviceCommand::BlinkAllStop)
    }

    pub fn test_led_enable(&mut self, address: u32) -> Reply {
        self.execute(&DeviceCommand::TestLedEnable(address))
    }

    pub fn test_led_disable(&mut self, address: u32) -> Reply {
        self.execute(&DeviceCommand::TestLedDisable(address))
    }

    pub fn store_config(&mut self) -> Reply {
        self.execute(&DeviceCommand::StoreConfig)
    }

    pub fn set_power(&mut self, row: u32, col: u32, power: u32) -> Reply {
        self.execute(&DeviceCommand::SetPower { row, col, power })
    }

    pub fn get_power(&mut self, row: u32, col: u32) -> Reply {
        self.execute(&DeviceCommand::GetPower { row, col })
    }
}

impl<O: PortOpener> Drop for Session<O> {
    fn drop(&mut self) {
        if self.link.is_some() {
            let _ = self.close();
        }
    }
}

impl<O: PortOpener> std::fmt::Debug for Session<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::thread::{self, JoinHandle};

    use magtile_line::{FramingError, LineConfig};
    use magtile_transport::TransportError;

    use super::*;
    use crate::reply::Status;

    /// Device end of a socket pair.
    struct Device {
        reader: BufReader<UnixStream>,
        writer: UnixStream,
    }

    impl Device {
        fn new(stream: UnixStream) -> Self {
            let writer = stream.try_clone().unwrap();
            Self {
                reader: BufReader::new(stream),
                writer,
            }
        }

        fn expect(&mut self, line: &str) {
            let mut received = String::new();
            self.reader.read_line(&mut received).unwrap();
            assert_eq!(received, line);
        }

        fn send(&mut self, bytes: &str) {
            self.writer.write_all(bytes.as_bytes()).unwrap();
        }
    }

    type TestOpener = Box<dyn Fn() -> magtile_transport::Result<UnixStream>>;
    type Script = Box<dyn FnOnce(Device) + Send>;

    const NO_ARGS: [&str; 0] = [];

    /// Opener handing out the host ends in order; each device end runs its
    /// script on a thread.
    fn fake_devices(scripts: Vec<Script>) -> (TestOpener, Vec<JoinHandle<()>>) {
        let mut hosts = VecDeque::new();
        let mut threads = Vec::new();
        for script in scripts {
            let (host, device) = UnixStream::pair().unwrap();
            hosts.push_back(host);
            threads.push(thread::spawn(move || script(Device::new(device))));
        }

        let hosts = RefCell::new(hosts);
        let opener: TestOpener = Box::new(move || {
            hosts
                .borrow_mut()
                .pop_front()
                .ok_or(TransportError::NoDeviceSelected)
        });
        (opener, threads)
    }

    fn fake_device(
        script: impl FnOnce(Device) + Send + 'static,
    ) -> (TestOpener, JoinHandle<()>) {
        let script: Script = Box::new(script);
        let (opener, mut threads) = fake_devices(vec![script]);
        (opener, threads.remove(0))
    }

    #[test]
    fn connect_discards_banner_then_reads_width() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("MagTile ready\n");
            dev.expect("read_width\n");
            dev.send("ok : 128\n");
        });
        let mut session = Session::new(opener);

        assert_eq!(session.connect(), Reply::success("Connected to device"));
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.read_width(), Reply::success("128"));

        session.disconnect();
        device.join().unwrap();
    }

    #[test]
    fn device_error_is_command_error() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("scan_addresses\n");
            dev.send("error\n");
            dev.expect("scan_addresses\n");
            dev.send("error\n");
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        let response = session.send_command("scan_addresses", NO_ARGS).unwrap();
        assert_eq!(response, Response::CommandError);
        assert_eq!(session.scan_addresses(), Reply::error("Command error"));
        assert!(session.is_connected());

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn unrecognized_line_is_protocol_error() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("read_height\n");
            dev.send("wat\n");
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        let response = session.send_command("read_height", NO_ARGS).unwrap();
        assert_eq!(response, Response::ProtocolError("wat".to_string()));
        assert!(session.is_connected());

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn connect_fails_when_stream_closes_before_banner() {
        let (opener, device) = fake_device(drop);
        let mut session = Session::new(opener);

        let reply = session.connect();
        assert_eq!(reply.status, Status::Error);
        assert_eq!(
            reply.data,
            "stream closed before a complete line was received"
        );
        assert_eq!(session.state(), ConnectionState::Disconnected);
        device.join().unwrap();
    }

    #[test]
    fn connect_fails_when_open_fails() {
        let opener = || -> magtile_transport::Result<UnixStream> {
            Err(TransportError::NoDeviceSelected)
        };
        let mut session = Session::new(opener);

        assert_eq!(session.connect(), Reply::error("no serial device selected"));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_twice_succeeds() {
        let (opener, device) = fake_device(|mut dev| dev.send("ready\n"));
        let mut session = Session::new(opener);
        assert!(session.connect().is_success());

        assert_eq!(session.disconnect(), Reply::success("Disconnected from device"));
        assert_eq!(session.disconnect(), Reply::success("Disconnected from device"));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        device.join().unwrap();
    }

    #[test]
    fn disconnect_without_connect_succeeds() {
        let (opener, _devices) = fake_devices(Vec::new());
        let mut session = Session::new(opener);
        assert!(session.disconnect().is_success());
    }

    #[test]
    fn prebuffered_replies_pair_in_order() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\nok : 1\nok : 2\n");
            dev.expect("read_width\n");
            dev.expect("read_height\n");
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        assert_eq!(session.read_width(), Reply::success("1"));
        assert_eq!(session.read_height(), Reply::success("2"));

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn command_without_connection() {
        let (opener, _devices) = fake_devices(Vec::new());
        let mut session = Session::new(opener);

        assert!(matches!(
            session.send_command("read_width", NO_ARGS),
            Err(SessionError::NotConnected)
        ));
        assert_eq!(session.store_config(), Reply::error("not connected to device"));
    }

    #[test]
    fn connect_twice_is_rejected() {
        let (opener, device) = fake_device(|mut dev| dev.send("ready\n"));
        let mut session = Session::new(opener);
        session.open().unwrap();

        assert!(matches!(session.open(), Err(SessionError::AlreadyConnected)));
        assert_eq!(
            session.connect(),
            Reply::error("already connected to device")
        );
        assert!(session.is_connected());

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn stream_closed_mid_exchange_disconnects() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("blinkall_start\n");
            dev.send("ok : ");
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        let reply = session.blinkall_start();
        assert!(!reply.is_success());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.blinkall_stop(), Reply::error("not connected to device"));
        device.join().unwrap();
    }

    #[test]
    fn invalid_token_is_not_written() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("read_width\n");
            dev.send("ok : 4\n");
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        let err = session.send_command("write_width", ["1 2"]).unwrap_err();
        assert!(matches!(err, SessionError::Framing(FramingError::InvalidToken(_))));
        assert!(session.is_connected());
        assert_eq!(session.read_width(), Reply::success("4"));

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn overlong_reply_keeps_connection() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("read_address_list\n");
            dev.send("ok : 1 2 3 4 5 6 7 8\n");
            dev.expect("read_width\n");
            dev.send("ok : 3\n");
        });
        let config = SessionConfig {
            line: LineConfig { max_line_length: 8 },
            ..SessionConfig::default()
        };
        let mut session = Session::with_config(opener, config);
        session.open().unwrap();

        let err = session.send_command("read_address_list", NO_ARGS).unwrap_err();
        assert!(matches!(err, SessionError::Framing(FramingError::LineTooLong { .. })));
        assert!(session.is_connected());
        assert_eq!(session.read_width(), Reply::success("3"));

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn overlong_reply_without_newline_is_skipped_to_its_end() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            dev.expect("read_address_list\n");
            // Nothing more arrives until the host moves on.
            dev.send("ok : 1 2 3 4 5");
            dev.expect("read_width\n");
            dev.send(" 6 7 8\n");
            dev.send("ok : 3\n");
        });
        let config = SessionConfig {
            line: LineConfig { max_line_length: 8 },
            ..SessionConfig::default()
        };
        let mut session = Session::with_config(opener, config);
        session.open().unwrap();

        let err = session.send_command("read_address_list", NO_ARGS).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Framing(FramingError::LineTooLong { len: 14, max: 8 })
        ));
        assert!(session.is_connected());
        assert_eq!(
            session.send_command("read_width", NO_ARGS).unwrap(),
            Response::Success("3".to_string())
        );

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn banner_drain_can_be_disabled() {
        let (opener, device) = fake_device(|mut dev| {
            dev.expect("read_width\n");
            dev.send("ok : 10\n");
        });
        let config = SessionConfig {
            drain_banner: false,
            ..SessionConfig::default()
        };
        let mut session = Session::with_config(opener, config);
        session.open().unwrap();

        assert_eq!(session.read_width(), Reply::success("10"));
        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn every_helper_sends_its_wire_command() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            loop {
                let mut line = String::new();
                if dev.reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                dev.send(&format!("ok : {}\n", line.trim_end()));
            }
        });
        let mut session = Session::new(opener);
        session.open().unwrap();

        let echoed = [
            (session.read_width(), "read_width"),
            (session.read_height(), "read_height"),
            (session.write_width(16), "write_width 16"),
            (session.write_height(8), "write_height 8"),
            (
                session.write_address_list(&[8, 9, 10]),
                "write_address_list 8 9 10",
            ),
            (session.read_address_list(), "read_address_list"),
            (session.scan_addresses(), "scan_addresses"),
            (session.blinkall_start(), "blinkall_start"),
            (session.blinkall_stop(), "blinkall_stop"),
            (session.test_led_enable(12), "test_led_enable 12"),
            (session.test_led_disable(12), "test_led_disable 12"),
            (session.store_config(), "store_config"),
            (session.set_power(1, 2, 200), "set_power 1 2 200"),
            (session.get_power(1, 2), "get_power 1 2"),
        ];
        for (reply, wire) in echoed {
            assert_eq!(reply, Reply::success(wire));
        }

        session.close().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn reconnect_uses_fresh_stream() {
        let first: Script = Box::new(|mut dev| dev.send("first\n"));
        let second: Script = Box::new(|mut dev| {
            dev.send("second\n");
            dev.expect("read_height\n");
            dev.send("ok : 6\n");
        });
        let (opener, devices) = fake_devices(vec![first, second]);
        let mut session = Session::new(opener);

        assert!(session.connect().is_success());
        assert!(session.disconnect().is_success());
        assert!(session.connect().is_success());
        assert_eq!(session.read_height(), Reply::success("6"));

        session.close().unwrap();
        for device in devices {
            device.join().unwrap();
        }
    }

    #[test]
    fn drop_releases_port() {
        let (opener, device) = fake_device(|mut dev| {
            dev.send("ready\n");
            let mut rest = String::new();
            assert_eq!(dev.reader.read_line(&mut rest).unwrap(), 0);
        });
        let mut session = Session::new(opener);
        session.open().unwrap();
        drop(session);

        device.join().unwrap();
    }
}
