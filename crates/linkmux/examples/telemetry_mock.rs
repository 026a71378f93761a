//! Receive-side demo over an in-memory link.
//!
//! A background thread plays the device, pushing packed telemetry frames;
//! the main thread polls the receiver and prints what arrives.

use std::sync::Arc;
use std::time::Duration;

use linkmux::codec::pack;
use linkmux::{
    ByteOrder, Field, Frame, LinkReceiver, MockLink, ReceiveOptions, Registry, Schema,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    linkmux::logging::init(tracing::Level::DEBUG);

    let registry = Arc::new(Registry::new());
    let (link, handle) = MockLink::new("demo0");
    let schema = Schema::new([Field::U16, Field::I16], ByteOrder::Little);

    let receiver = LinkReceiver::open(
        "telemetry-rx",
        schema.clone(),
        link,
        registry,
        ReceiveOptions::default().with_identifier(0x31),
    )?;

    let device = std::thread::spawn(move || {
        for n in 0..5i64 {
            let payload = pack(&schema, &[(n as u64 * 100).into(), (-n).into()])
                .expect("demo payload fits the schema");
            handle.push_incoming(Frame::new(0x31, payload));
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    for _ in 0..20 {
        if let Some(values) = receiver.receive()? {
            println!("telemetry #{}: {values:?}", receiver.count());
        }
        std::thread::sleep(Duration::from_millis(25));
    }

    let _ = device.join();
    receiver.shutdown_dispatch();
    Ok(())
}
