use std::sync::Arc;
use std::time::{Duration, Instant};

use read_aloud::{
    background::ReadAloud,
    config::{JsonFileStore, SettingsStore},
    engines::openai::{OpenAiConfig, OpenAiGateway},
    host::ContentHost,
    playback::device::{open_default_stream, RodioClipSink, RodioOutput},
    ui::{format_time, LogView},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let text = if text.trim().is_empty() {
        "Hello! This sentence was synthesized in the cloud and played back \
         through a seekable engine with speed and volume controls."
            .to_string()
    } else {
        text
    };

    let store = Arc::new(JsonFileStore::new("settings.json"));
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        read_aloud::config::save_credentials(store.as_ref(), &key, "alloy")?;
    }

    // Audio stops when the stream is dropped.
    let stream = open_default_stream()?;
    let host = ContentHost::builder(LogView, move || text.clone())
        .output(RodioOutput::new(&stream))
        .clip_sink(Arc::new(RodioClipSink::new(&stream)))
        .build();

    let gateway = OpenAiGateway::new(OpenAiConfig::default())?;
    let reader = ReadAloud::new(host.clone(), gateway, store as Arc<dyn SettingsStore>);

    let start = Instant::now();
    reader.read_selection().await?;
    println!("Playback started after {:.2?}", start.elapsed());

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let progress = host.poll_progress().await;
        if !progress.is_playing() {
            println!(
                "Finished at {} / {}",
                format_time(progress.position),
                format_time(progress.duration)
            );
            break;
        }
    }

    host.close().await;
    Ok(())
}
