//! 混音引擎演示
//!
//! 在主输出（默认为虚拟回环设备）上播放一段测试音，打印播放状态，退出时保存当前设备配置
//!
//! 运行: cargo run --bin warpboard-demo -- [config.json]

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use warpboard_lib::audio::CpalBackend;
use warpboard_lib::hotkey::BindingSet;
use warpboard_lib::sound::{InMemoryCatalog, SoundAsset, SoundId};
use warpboard_lib::soundboard::Soundboard;
use warpboard_lib::state::config::ConfigManager;
use warpboard_lib::utils::logging::init_logging;

fn tone(frequency: f32, seconds: f32, sample_rate: u32, channels: u16) -> Vec<f32> {
    let frames = (seconds * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for frame in 0..frames {
        let value = (TAU * frequency * frame as f32 / sample_rate as f32).sin() * 0.3;
        samples.extend(std::iter::repeat_n(value, channels as usize));
    }
    samples
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "warpboard.json".to_string());
    let config = ConfigManager::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path))?;

    let catalog = Arc::new(InMemoryCatalog::new());
    let id = SoundId::new("demo-tone");
    catalog.insert(
        SoundAsset::new(id.clone(), "Demo Tone").with_volume(0.8),
        tone(440.0, 1.5, config.audio.sample_rate, config.audio.channels),
    );

    let backend = Arc::new(CpalBackend::new(config.audio.capture_stall_timeout()));
    let mut board = Soundboard::new(&config, backend, catalog, BindingSet::new());
    board.apply_device_config(&config.devices)?;

    println!("Output devices:");
    for device in board.output_devices() {
        let marker = if device.is_virtual_loopback { " [loopback]" } else { "" };
        println!("  {}{}", device.name, marker);
    }
    println!("Input devices:");
    for device in board.input_devices() {
        println!("  {}", device.name);
    }

    board.play(&id)?;

    let started = std::time::Instant::now();
    while started.elapsed() < Duration::from_secs(2) {
        for notification in board.process_pending_tasks() {
            println!("! {:?}", notification);
        }
        println!("Now playing: {}", board.status().summary());
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    board.stop_all();

    let live = board.live_config().get();
    ConfigManager::save(&config_path, &live)
        .with_context(|| format!("failed to save {}", config_path))?;
    Ok(())
}
