//! Device control example

use std::time::Duration;
use tokio::time::sleep;

use rbzk::{Device, DeviceOptions};

#[tokio::main]
async fn main() -> rbzk::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    let mut device = Device::new(DeviceOptions::new(ip));
    device.connect().await?;

    println!("Device connected!");

    // Lock the terminal (shows "Working...")
    println!("Disabling device...");
    device.disable_device().await?;
    sleep(Duration::from_secs(3)).await;

    // Resume normal operation
    println!("Enabling device...");
    device.enable_device().await?;

    // Say hello
    device.test_voice(0).await?;

    println!("Done!");

    device.disconnect().await?;

    Ok(())
}
