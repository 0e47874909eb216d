use bridge_loopback::{
    InteractionScript, LoopbackActivity, LoopbackBinder, LoopbackPeer, ScriptedPermissionPrompter,
    StaticPlatformInfo, StaticPrerequisitesProbe,
};
use bridge_traits::permissions::ids;
use bridge_traits::{InlineContext, Prerequisite};
use core_connection::ConnectionError;
use core_runtime::events::LifecycleEvent;
use core_service::{
    ActivityContext, ClientConfig, ClientEvent, ConnectionState, CoreError, DeviceInfo,
    DisconnectCause, PermissionOutcome, PrerequisitesResult, SignalboyClient,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Host {
    binder: Arc<LoopbackBinder>,
    prompter: Arc<ScriptedPermissionPrompter>,
    prerequisites: Arc<StaticPrerequisitesProbe>,
}

impl Host {
    fn new() -> Self {
        Self {
            binder: Arc::new(LoopbackBinder::new(Arc::new(LoopbackPeer::new()))),
            prompter: Arc::new(ScriptedPermissionPrompter::new()),
            prerequisites: Arc::new(StaticPrerequisitesProbe::default()),
        }
    }

    fn peer(&self) -> &Arc<LoopbackPeer> {
        self.binder.peer()
    }

    fn client(&self, platform: StaticPlatformInfo) -> SignalboyClient {
        let config = ClientConfig::builder()
            .binder(self.binder.clone())
            .permission_prompter(self.prompter.clone())
            .platform_info(Arc::new(platform))
            .prerequisites_probe(self.prerequisites.clone())
            .callback_context(Arc::new(InlineContext))
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        SignalboyClient::new(config).unwrap()
    }
}

fn device() -> DeviceInfo {
    DeviceInfo::new("Signalboy-7F", "B", "1.4.2")
}

#[tokio::test]
async fn test_granted_location_permission_skips_prompt() {
    let host = Host::new();
    host.prompter.grant(ids::ACCESS_FINE_LOCATION);
    let client = host.client(StaticPlatformInfo::new(30));

    let result = client.request_required_permissions().await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(
        result.outcome(ids::ACCESS_FINE_LOCATION),
        Some(PermissionOutcome::Granted)
    );
    assert!(result.is_fully_granted());
    assert_eq!(host.prompter.request_count(), 0);
}

#[tokio::test]
async fn test_mixed_permission_outcomes_are_all_collected() {
    let host = Host::new();
    host.prompter
        .answer(ids::BLUETOOTH_CONNECT, PermissionOutcome::Denied);
    host.prompter
        .answer(ids::BLUETOOTH_SCAN, PermissionOutcome::Granted);
    let client = host.client(StaticPlatformInfo::new(33));

    let result = client.request_required_permissions().await.unwrap();

    assert!(!result.is_fully_granted());
    assert_eq!(
        result.outcome(ids::BLUETOOTH_CONNECT),
        Some(PermissionOutcome::Denied)
    );
    assert_eq!(
        result.outcome(ids::BLUETOOTH_SCAN),
        Some(PermissionOutcome::Granted)
    );
    assert_eq!(host.prompter.request_count(), 1);
}

#[tokio::test]
async fn test_permissions_off_device_are_not_available() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::unavailable());

    let err = client.request_required_permissions().await.unwrap_err();

    assert!(err.is_not_available());
    assert_eq!(host.prompter.request_count(), 0);
}

#[test]
fn test_prerequisites_keep_probe_order() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    assert!(client.verify_prerequisites().unwrap().is_satisfied());

    let unmet = vec![
        Prerequisite::UsesFeatureDeclarations {
            required: vec!["android.hardware.bluetooth_le".to_string()],
        },
        Prerequisite::BluetoothEnabled,
        Prerequisite::RuntimePermissions {
            required: vec![ids::BLUETOOTH_SCAN.to_string()],
        },
    ];
    host.prerequisites
        .set_result(PrerequisitesResult::new(unmet.clone()));

    assert_eq!(
        client.verify_prerequisites().unwrap().unmet_prerequisites,
        unmet
    );
}

#[tokio::test]
async fn test_bind_reports_connecting_before_connected() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_connection_state_changed(move |state| sink.lock().unwrap().push(state));
    let mut states = client.subscribe_state();

    client.bind().unwrap();
    let peer = Arc::clone(host.peer());
    let pusher = std::thread::spawn(move || peer.connect(device(), true));

    let connected = states
        .wait_for(ConnectionState::is_connected)
        .await
        .unwrap()
        .clone();
    pusher.join().unwrap();

    assert_eq!(connected.device_info(), Some(&device()));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&ConnectionState::Connecting));
    assert!(seen.last().unwrap().is_connected());
}

#[test]
fn test_listener_removal_stops_delivery() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let seen = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&seen);
    let id = client.on_connection_state_changed(move |_| *sink.lock().unwrap() += 1);

    client.bind().unwrap();
    assert!(client.remove_state_listener(id));
    host.peer().connect(device(), false);

    assert_eq!(*seen.lock().unwrap(), 1);
}

#[test]
fn test_crash_releases_handle_and_reports_termination() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let mut events = client.events();

    client.bind().unwrap();
    host.peer().connect(device(), true);
    assert!(host.binder.crash());

    assert!(!client.is_bound());
    assert_eq!(
        client.current_state(),
        ConnectionState::Disconnected {
            cause: Some(DisconnectCause::PeerTerminated),
        }
    );
    client.send_event().unwrap();
    assert!(!client.trigger_sync().unwrap());
    assert!(!client.has_pending_interaction_request().unwrap());
    assert_eq!(host.peer().events_sent(), 0);

    let mut lifecycle = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        if let ClientEvent::Lifecycle(event) = event {
            lifecycle.push(event);
        }
    }
    assert!(matches!(lifecycle[0], LifecycleEvent::Binding { .. }));
    assert!(matches!(lifecycle[1], LifecycleEvent::Bound { .. }));
    assert!(matches!(lifecycle[2], LifecycleEvent::PeerTerminated { .. }));
}

#[test]
fn test_refused_bind_is_reported() {
    let host = Host::new();
    host.binder.set_accept_binds(false);
    let client = host.client(StaticPlatformInfo::new(33));

    let err = client.bind().unwrap_err();

    assert!(matches!(
        err,
        CoreError::Connection(ConnectionError::BindFailed)
    ));
    assert!(!client.is_bound());
}

#[test]
fn test_bind_twice_and_unbind_twice() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));

    client.bind().unwrap();
    assert!(matches!(
        client.bind(),
        Err(CoreError::Connection(ConnectionError::AlreadyBound))
    ));
    client.unbind().unwrap();
    client.unbind().unwrap();

    assert_eq!(host.binder.unbind_count(), 1);
    assert!(!host.peer().has_listener());
}

#[tokio::test]
async fn test_interaction_requires_binding() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let activity: Arc<dyn ActivityContext> = Arc::new(LoopbackActivity::new().unwrap());

    let err = client
        .resolve_interaction_request(activity)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Connection(ConnectionError::NotBound)
    ));
}

#[tokio::test]
async fn test_pending_interaction_is_resolved() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let activity = Arc::new(LoopbackActivity::new().unwrap());

    client.bind().unwrap();
    host.peer().set_pending_interaction(true);
    assert!(client.has_pending_interaction_request().unwrap());

    client
        .resolve_interaction_request(activity.clone())
        .await
        .unwrap();

    assert!(!client.has_pending_interaction_request().unwrap());
    assert_eq!(activity.off_thread_injection_count(), 0);
}

#[tokio::test]
async fn test_failed_interaction_carries_peer_diagnostic() {
    let host = Host::new();
    let client = host.client(StaticPlatformInfo::new(33));
    let activity: Arc<dyn ActivityContext> = Arc::new(LoopbackActivity::new().unwrap());

    client.bind().unwrap();
    host.peer()
        .script_interaction(InteractionScript::Fail("AssociationCancelled".to_string()));

    let err = client
        .resolve_interaction_request(activity)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("AssociationCancelled"));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let host = Host::new();
    let config = ClientConfig::builder()
        .binder(host.binder.clone())
        .permission_prompter(host.prompter.clone())
        .platform_info(Arc::new(StaticPlatformInfo::new(33)))
        .prerequisites_probe(host.prerequisites.clone())
        .build()
        .unwrap();
    let config = ClientConfig {
        event_buffer_size: 0,
        ..config
    };

    assert!(matches!(
        SignalboyClient::new(config),
        Err(CoreError::Runtime(_))
    ));
}
