//! mirror-daemon: background daemon driving the smart mirror
//!
//! Wires the configured adapters to the dispatcher and runs until SIGTERM or
//! SIGINT. SDK-backed collaborators (track search, playback engine, speech,
//! cloud uploads) are linked in by device builds; this binary runs with the
//! ones available on a bare system.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_daemon::adapters::{
    AssistantTrigger, ButtonAdapter, ButtonBindings, CompanionServer, GpioMonitor, RefreshTimer,
};
use mirror_daemon::config::Config;
use mirror_daemon::dispatch::{status_channel, ActionHandler, DeviceStatus, Dispatcher, Services};
use mirror_daemon::events::DeviceEvent;
use mirror_daemon::hardware::{AmixerVolume, VolumeControl};
use mirror_daemon::lifecycle::ShutdownSignal;
use mirror_daemon::settings::Settings;

const EVENT_BUS_CAPACITY: usize = 64;
const MIXER_CONTROL: &str = "Master";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (the log level comes from it)
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "mirror-daemon starting");
    info!(base_dir = ?config.base_dir, features = ?config.features, "configuration loaded");

    let config = Arc::new(config);

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Handler -> observers
    let (event_tx, _) = broadcast::channel::<DeviceEvent>(EVENT_BUS_CAPACITY);
    let event_rx = event_tx.subscribe();
    // Handler -> companion link, timer
    let (status_tx, status_rx) = status_channel(DeviceStatus::new(Settings::default().refresh_interval()));

    // Create the action handler and start the dispatcher worker
    // (runs on dedicated thread)
    let trigger = AssistantTrigger::default();
    let handler = ActionHandler::new(
        Arc::clone(&config),
        build_services(&config),
        trigger,
        event_tx.clone(),
        status_tx,
    );
    let (dispatcher, worker) =
        Dispatcher::spawn(handler, config.dispatch_queue_capacity, event_tx.clone())?;

    // Device builds link a speech backend and start a VoiceListener on a
    // clone of the handler's trigger, and give the playback engine a
    // TrackEndNotifier
    if config.features.google_assistant_enabled {
        warn!("no voice assistant backend in this build, push-to-talk is inert");
    }

    // Create the companion socket server
    let companion = if config.features.companion_app_enabled {
        Some(CompanionServer::bind(&config.companion_socket, dispatcher.clone(), status_rx.clone())?)
    } else {
        info!("companion app disabled");
        None
    };

    // Hardware buttons via gpiomon
    let buttons = if config.features.hardware_buttons_enabled {
        let bindings = ButtonBindings::from_config(&config.button_bindings);
        if bindings.is_empty() {
            warn!("hardware buttons enabled but no usable bindings");
        }
        Some((GpioMonitor::new(&config.gpio_chip), ButtonAdapter::new(bindings, dispatcher.clone())))
    } else {
        None
    };

    // Auto refresh
    let timer = RefreshTimer::new(dispatcher.clone(), status_rx);

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        result = async {
            match &companion {
                Some(server) => server.run().await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!(error = %e, "companion server error");
            }
        }

        _ = async {
            if let Some((monitor, adapter)) = &buttons {
                if let Err(e) = monitor.run(adapter).await {
                    error!(error = %e, "gpio monitor stopped");
                }
            }
            std::future::pending::<()>().await
        } => {}

        _ = timer.run() => {
            info!("refresh timer exited");
        }

        _ = log_events(event_rx) => {
            info!("event logger exited");
        }

        result = shutdown.wait() => {
            result.context("failed to install signal handlers")?;
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if let Some(server) = &companion {
        server.shutdown();
    }
    drop((companion, buttons, timer, dispatcher));

    // worker exits once every submit handle is gone
    match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("dispatcher worker did not stop cleanly"),
    }

    info!("mirror-daemon stopped");

    Ok(())
}

/// Collaborators available without vendor SDKs
fn build_services(config: &Config) -> Services {
    let mixer: Option<Box<dyn VolumeControl>> = match AmixerVolume::open(MIXER_CONTROL) {
        Ok(mixer) => Some(Box::new(mixer)),
        Err(e) => {
            warn!(error = %e, "master mixer unavailable");
            None
        }
    };

    let features = &config.features;
    if features.youtube_music_enabled {
        warn!("no music backend in this build, playback stays invalid");
    }
    if features.moisture_sensor_enabled {
        warn!("no moisture sensor driver in this build");
    }
    if features.style_recommendation_enabled {
        warn!("no style recommender in this build");
    }

    Services {
        mixer,
        ..Services::default()
    }
}

async fn log_events(mut rx: broadcast::Receiver<DeviceEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => info!(%event, "device event"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
