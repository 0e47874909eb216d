use bridge_traits::error::Result as BridgeResult;
use bridge_traits::permissions::ids;
use bridge_traits::{
    BridgeError, PermissionOutcome, PermissionPrompter, PermissionResultCallback, PlatformInfo,
};
use core_correlation::{CorrelationError, Correlator};
use core_preflight::{PermissionGate, PreflightError};
use core_runtime::config::PermissionPolicy;
use core_runtime::events::{ClientEvent, EventBus, PermissionEvent};
use mockall::mock;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

mock! {
    Prompter {}
    impl PermissionPrompter for Prompter {
        fn is_granted(&self, permission: &str) -> bool;
        fn request_permissions(
            &self,
            permissions: &[String],
            on_result: PermissionResultCallback,
        ) -> BridgeResult<()>;
    }
}

mock! {
    Platform {}
    impl PlatformInfo for Platform {
        fn api_level(&self) -> BridgeResult<u32>;
    }
}

fn gate(prompter: MockPrompter) -> PermissionGate {
    PermissionGate::new(
        Arc::new(prompter),
        PermissionPolicy::android_default(),
        Correlator::new(),
    )
}

#[tokio::test]
async fn test_already_granted_location_skips_prompt() {
    let mut prompter = MockPrompter::new();
    prompter
        .expect_is_granted()
        .withf(|permission| permission == ids::ACCESS_FINE_LOCATION)
        .return_const(true);
    prompter.expect_request_permissions().times(0);

    let result = gate(prompter).request_required(29).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(
        result.outcome(ids::ACCESS_FINE_LOCATION),
        Some(PermissionOutcome::Granted)
    );
    assert!(result.is_fully_granted());
}

#[tokio::test]
async fn test_mixed_outcomes_are_all_collected() {
    let mut prompter = MockPrompter::new();
    prompter.expect_is_granted().return_const(false);
    prompter
        .expect_request_permissions()
        .times(1)
        .returning(|_permissions, on_result| {
            thread::spawn(move || {
                on_result(
                    ids::BLUETOOTH_CONNECT.to_string(),
                    PermissionOutcome::Denied,
                );
                on_result(ids::BLUETOOTH_SCAN.to_string(), PermissionOutcome::Granted);
            });
            Ok(())
        });

    let result = gate(prompter).request_required(33).await.unwrap();

    assert_eq!(
        result.outcome(ids::BLUETOOTH_CONNECT),
        Some(PermissionOutcome::Denied)
    );
    assert_eq!(
        result.outcome(ids::BLUETOOTH_SCAN),
        Some(PermissionOutcome::Granted)
    );
    assert!(!result.is_fully_granted());
}

#[tokio::test]
async fn test_partial_delivery_does_not_resolve() {
    let stash: Arc<Mutex<Option<PermissionResultCallback>>> = Arc::new(Mutex::new(None));
    let stash_clone = Arc::clone(&stash);

    let mut prompter = MockPrompter::new();
    prompter.expect_is_granted().return_const(false);
    prompter
        .expect_request_permissions()
        .returning(move |_permissions, on_result| {
            *stash_clone.lock().unwrap() = Some(on_result);
            Ok(())
        });

    let gate = Arc::new(gate(prompter));
    let mut pending = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move { gate.request_required(31).await }
    });

    // Wait until the prompt has been issued.
    let callback = loop {
        if let Some(callback) = stash.lock().unwrap().clone() {
            break callback;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    callback(ids::BLUETOOTH_SCAN.to_string(), PermissionOutcome::DeniedPermanently);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut pending)
            .await
            .is_err(),
        "batch resolved before every identifier reported"
    );

    callback(ids::BLUETOOTH_CONNECT.to_string(), PermissionOutcome::Granted);
    let result = pending.await.unwrap().unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.permanently_denied(), vec![ids::BLUETOOTH_SCAN]);
}

#[tokio::test]
async fn test_only_missing_permissions_are_prompted() {
    let mut prompter = MockPrompter::new();
    prompter
        .expect_is_granted()
        .returning(|permission| permission == ids::BLUETOOTH_CONNECT);
    prompter
        .expect_request_permissions()
        .withf(|permissions, _| permissions == [ids::BLUETOOTH_SCAN.to_string()])
        .times(1)
        .returning(|permissions, on_result| {
            for permission in permissions {
                on_result(permission.clone(), PermissionOutcome::Granted);
            }
            Ok(())
        });

    let result = gate(prompter).request_required(34).await.unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.is_fully_granted());
}

#[tokio::test]
async fn test_empty_policy_resolves_trivially() {
    let mut prompter = MockPrompter::new();
    prompter.expect_is_granted().times(0);
    prompter.expect_request_permissions().times(0);

    let gate = PermissionGate::new(
        Arc::new(prompter),
        PermissionPolicy::empty(),
        Correlator::new(),
    );
    let result = gate.request_required(33).await.unwrap();

    assert!(result.is_empty());
    assert!(result.is_fully_granted());
}

#[tokio::test]
async fn test_platform_not_available_propagates() {
    let mut prompter = MockPrompter::new();
    prompter.expect_request_permissions().times(0);
    let mut platform = MockPlatform::new();
    platform
        .expect_api_level()
        .returning(|| Err(BridgeError::NotAvailable("running in editor".to_string())));

    let err = gate(prompter)
        .request_for_platform(&platform)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PreflightError::Bridge(BridgeError::NotAvailable("running in editor".to_string()))
    );
    assert!(err.is_not_available());
}

#[tokio::test]
async fn test_synchronous_prompt_failure_fails_request() {
    let mut prompter = MockPrompter::new();
    prompter.expect_is_granted().return_const(false);
    prompter
        .expect_request_permissions()
        .returning(|_, _| Err(BridgeError::OperationFailed("no activity".to_string())));

    let err = gate(prompter).request_required(33).await.unwrap_err();

    assert!(matches!(
        err,
        PreflightError::Correlation(CorrelationError::Issue { .. })
    ));
}

#[tokio::test]
async fn test_permission_events_are_emitted() {
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();

    let mut prompter = MockPrompter::new();
    prompter.expect_is_granted().return_const(false);
    prompter
        .expect_request_permissions()
        .returning(|permissions, on_result| {
            for permission in permissions {
                on_result(permission.clone(), PermissionOutcome::Denied);
            }
            Ok(())
        });

    gate(prompter)
        .with_event_bus(bus.clone())
        .request_required(30)
        .await
        .unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        ClientEvent::Permission(PermissionEvent::Requested {
            permissions: vec![ids::ACCESS_FINE_LOCATION.to_string()],
        })
    );
    assert_eq!(
        events.recv().await.unwrap(),
        ClientEvent::Permission(PermissionEvent::Resolved {
            granted: vec![],
            denied: vec![ids::ACCESS_FINE_LOCATION.to_string()],
        })
    );
}
