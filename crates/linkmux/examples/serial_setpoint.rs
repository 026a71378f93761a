//! Send one setpoint frame over a real serial port.
//!
//! Usage: `cargo run --example serial_setpoint -- /dev/ttyUSB0`

use linkmux::{
    ByteOrder, ConnectRetry, Field, LinkSender, Registry, Schema, SendOptions, SerialConfig,
    SerialLink, Value,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    linkmux::logging::init(tracing::Level::INFO);

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let link = SerialLink::new(SerialConfig::new(&port).with_id_width(1))?;
    let schema = Schema::new([Field::F32, Field::F32], ByteOrder::Little);

    let sender = LinkSender::open(
        "setpoint-tx",
        schema,
        link,
        Registry::shared(),
        SendOptions::default()
            .with_identifier(0x21)
            .with_startup(ConnectRetry::startup().with_max_attempts(3)),
    )?;

    let count = sender.send(&[Value::Float(1.5), Value::Float(-0.25)])?;
    println!("sent setpoint frame #{count} on {port}");
    sender.stop()?;
    Ok(())
}
