//! Streams a sine tone, then a chirp, to the default output device.

use dac_stream::{
    DacConfig, DacDriver, DeviceSink, GeneratorSource, OutputSink, spawn_producer,
};
use std::time::Duration;

const SAMPLE_RATE: u32 = 48000;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎵 dac_stream - request-ahead streaming demo");

    let sink = DeviceSink::open_default(SAMPLE_RATE)?;
    println!(
        "✅ Opened '{}' ({} channels, {} Hz)",
        sink.device_name(),
        sink.channels(),
        sink.sample_rate()
    );

    let config = DacConfig::low_latency().with_sample_rate(SAMPLE_RATE);
    let (handle, requests) = DacDriver::spawn(sink, config.clone())?;

    let source = GeneratorSource::sine(440.0, SAMPLE_RATE)
        .with_batch_size(2048)
        .with_amplitude(0.2);
    let producer = spawn_producer(source, requests, &handle);

    println!("\n🎼 Playing 440Hz for 2 seconds...");
    handle.start().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let status = handle.status().await?;
    println!(
        "  {} samples scheduled, {} late batches (worst {:.2} ms)",
        status.sample_cursor, status.stats.late_batches, status.stats.max_lateness_ms
    );

    println!("⏹️  Stopping...");
    handle.stop().await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("▶️  Restarting from the top...");
    handle.start().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    handle.shutdown().await?;
    producer.await?;

    let chirp = GeneratorSource::chirp(200.0, 2000.0, Duration::from_secs(1), SAMPLE_RATE)
        .with_batch_size(1024)
        .with_amplitude(0.2);
    let sink = DeviceSink::open_default(SAMPLE_RATE)?;
    let (handle, requests) = DacDriver::spawn(sink, config)?;
    let producer = spawn_producer(chirp, requests, &handle);

    println!("\n🌊 Chirping 200Hz to 2kHz for 2 seconds...");
    handle.start().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.shutdown().await?;
    producer.await?;

    println!("\n✨ Done");
    Ok(())
}
