//! Print the tile grid size and address list of a connected controller.
//!
//! ```text
//! cargo run -p magtile --example read-geometry -- /dev/ttyACM0
//! ```

use magtile::session::Session;
use magtile::transport::{PortConfig, SerialPortOpener};

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: read-geometry <PORT>");
        std::process::exit(64);
    };

    let mut session = Session::new(SerialPortOpener::new(PortConfig::for_path(path)));
    let connected = session.connect();
    if !connected.is_success() {
        eprintln!("connect failed: {}", connected.data);
        std::process::exit(3);
    }

    for (name, reply) in [
        ("width", session.read_width()),
        ("height", session.read_height()),
        ("addresses", session.read_address_list()),
    ] {
        println!("{name}: {} ({:?})", reply.data, reply.status);
    }

    session.disconnect();
}
