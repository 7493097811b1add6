//! Read device identity and counters

use rbzk::{Device, DeviceOptions};

#[tokio::main]
async fn main() -> rbzk::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    let mut device = Device::new(DeviceOptions::new(ip));
    device.connect().await?;
    println!("Connected!");

    let info = device.device_info().await?;
    println!("{}", info);

    let sizes = device.read_sizes().await?;
    println!("{}", sizes);

    device.disconnect().await?;
    Ok(())
}
