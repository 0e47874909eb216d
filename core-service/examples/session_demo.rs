//! Walks through one client session against the loopback peer:
//! pre-flight, permissions, bind, state observation, commands, a user
//! interaction request and finally a peer crash.
//!
//! ```text
//! cargo run -p core-service --example session_demo --features loopback
//! ```

use bridge_traits::permissions::ids;
use bridge_traits::{DeviceInfo, LogLevel, PermissionOutcome};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{bootstrap_loopback, ActivityContext, ConnectionState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let (client, host) = bootstrap_loopback(33)?;
    host.prompter.answer(ids::BLUETOOTH_CONNECT, PermissionOutcome::Granted);
    host.prompter.answer(ids::BLUETOOTH_SCAN, PermissionOutcome::Granted);

    let prerequisites = client.verify_prerequisites()?;
    println!("prerequisites satisfied: {}", prerequisites.is_satisfied());

    let permissions = client.request_required_permissions().await?;
    for (permission, outcome) in permissions.iter() {
        println!("{permission}: {outcome}");
    }
    if !permissions.is_fully_granted() {
        anyhow::bail!("required permissions were not granted");
    }

    client.on_connection_state_changed(|state| println!("state -> {}", state.name()));
    let mut states = client.subscribe_state();
    client.bind()?;

    let peer = Arc::clone(host.peer());
    std::thread::spawn(move || {
        peer.connect(DeviceInfo::new("Signalboy-7F", "B", "1.4.2"), false);
        peer.connect(DeviceInfo::new("Signalboy-7F", "B", "1.4.2"), true);
    });

    let synced = states
        .wait_for(|state| matches!(state, ConnectionState::Connected { is_synced: true, .. }))
        .await?
        .clone();
    if let Some(device) = synced.device_info() {
        println!(
            "connected to {} (hw {}, sw {})",
            device.local_name, device.hardware_revision, device.software_revision
        );
    }

    client.send_event()?;
    println!("sync accepted: {}", client.trigger_sync()?);

    host.peer().set_pending_interaction(true);
    if client.has_pending_interaction_request()? {
        let activity: Arc<dyn ActivityContext> = host.activity.clone();
        client.resolve_interaction_request(activity).await?;
        println!("interaction resolved");
    }

    host.binder.crash();
    println!(
        "after crash: bound = {}, state = {:?}",
        client.is_bound(),
        client.current_state()
    );

    client.unbind()?;
    Ok(())
}
