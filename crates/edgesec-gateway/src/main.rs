use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use edgesec_authority::{AuthorityConfig, ReferenceAuthority};
use edgesec_core::{EdgeSec, EngineConfig};
use edgesec_gateway::{populate_from_authority, LoopbackTransport};
use tracing::{error, info, warn};

#[derive(Debug)]
struct GatewaySettings {
    gateway_id: String,
    authority_config: Option<String>,
    device_delay: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = build_gateway_settings();
    info!(?settings, "starting EdgeSec gateway");

    let authority_config = match &settings.authority_config {
        Some(path) => AuthorityConfig::from_json_file(path)
            .with_context(|| format!("loading authority config from {path}"))?,
        None => AuthorityConfig::demo()?,
    };

    let transport = Arc::new(LoopbackTransport::new());
    populate_from_authority(&transport, &authority_config, settings.device_delay)?;

    let authority = ReferenceAuthority::new(
        authority_config,
        edgesec_plugins::ciphers(),
        edgesec_plugins::macs(),
    )?;
    let edgesec = Arc::new(EdgeSec::initialize(
        EngineConfig::new(settings.gateway_id.clone()),
        transport,
        edgesec_plugins::ciphers(),
        edgesec_plugins::macs(),
        Arc::new(authority),
    )?);

    let devices = edgesec.search_devices().await?;
    info!(count = devices.len(), "devices found");

    let mut tasks = Vec::with_capacity(devices.len());
    for device in devices {
        let edgesec = edgesec.clone();
        tasks.push(tokio::spawn(async move { exchange(&edgesec, &device).await }));
    }

    let mut authenticated = 0usize;
    for task in tasks {
        if task.await.context("device task panicked")? {
            authenticated += 1;
        }
    }
    info!(authenticated, "done");
    Ok(())
}

/// Handshake, one echo round trip, disconnect. True if the device authenticated.
async fn exchange(edgesec: &EdgeSec, device: &str) -> bool {
    let report = match edgesec.secure_connect(device).await {
        Ok(report) => report,
        Err(err) => {
            warn!(device = %device, error = %err, "secure connect failed");
            return false;
        }
    };
    info!(
        device = %device,
        object = %report.object_id,
        suite = %report.protocol_suite,
        handshake_ms = report.timings.total().as_millis() as u64,
        "secure channel established"
    );

    let greeting = format!("hello {}", report.object_id);
    let echoed = match edgesec.secure_write(device, greeting.as_bytes()).await {
        Ok(()) => edgesec.secure_read(device).await,
        Err(err) => Err(err),
    };
    match echoed {
        Ok(data) => info!(device = %device, echo = %String::from_utf8_lossy(&data), "echo received"),
        Err(err) => error!(device = %device, error = %err, "secure exchange failed"),
    }

    edgesec.disconnect(device).await;
    true
}

fn build_gateway_settings() -> GatewaySettings {
    GatewaySettings {
        gateway_id: read_gateway_id(),
        authority_config: read_authority_config_path(),
        device_delay: read_device_delay(),
    }
}

fn read_gateway_id() -> String {
    env::var("EDGESEC_GATEWAY_ID").unwrap_or_else(|_| String::from("GATEWAY_ID"))
}

fn read_authority_config_path() -> Option<String> {
    env::var("EDGESEC_AUTHORITY_CONFIG").ok()
}

fn read_device_delay() -> Duration {
    let millis = env::var("EDGESEC_DEVICE_DELAY_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    Duration::from_millis(millis)
}
