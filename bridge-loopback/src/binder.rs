//! Service binder for the loopback peer.

use crate::lock;
use crate::peer::LoopbackPeer;
use bridge_traits::error::Result;
use bridge_traits::{PeerService, ServiceBinder, ServiceConfiguration, ServiceConnection};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Binds a [`LoopbackPeer`].
///
/// By default the connection callback fires before `bind_service` returns,
/// as Android may do for an already-running service. With
/// [`set_auto_connect(false)`](Self::set_auto_connect) it is held back until
/// [`deliver_connection`](Self::deliver_connection).
pub struct LoopbackBinder {
    peer: Arc<LoopbackPeer>,
    connection: Mutex<Option<ServiceConnection>>,
    accept_binds: AtomicBool,
    auto_connect: AtomicBool,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
}

impl LoopbackBinder {
    pub fn new(peer: Arc<LoopbackPeer>) -> Self {
        Self {
            peer,
            connection: Mutex::new(None),
            accept_binds: AtomicBool::new(true),
            auto_connect: AtomicBool::new(true),
            binds: AtomicUsize::new(0),
            unbinds: AtomicUsize::new(0),
        }
    }

    pub fn peer(&self) -> &Arc<LoopbackPeer> {
        &self.peer
    }

    /// Make subsequent binds return `false`.
    pub fn set_accept_binds(&self, accept: bool) {
        self.accept_binds.store(accept, Ordering::SeqCst);
    }

    pub fn set_auto_connect(&self, auto_connect: bool) {
        self.auto_connect.store(auto_connect, Ordering::SeqCst);
    }

    /// Deliver the held-back connection callback. Returns `false` when no
    /// binding is outstanding.
    pub fn deliver_connection(&self) -> bool {
        let connection = lock(&self.connection).clone();
        let Some(connection) = connection else {
            return false;
        };

        let peer: Arc<dyn PeerService> = self.peer.clone();
        (connection.on_connected)(peer);
        true
    }

    /// Simulate the peer process dying while bound.
    pub fn crash(&self) -> bool {
        let connection = lock(&self.connection).take();
        let Some(connection) = connection else {
            return false;
        };

        info!("Loopback peer crashed");
        self.peer.on_destroyed();
        (connection.on_disconnected)();
        true
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.connection).is_some()
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }
}

impl ServiceBinder for LoopbackBinder {
    fn bind_service(
        &self,
        configuration: &ServiceConfiguration,
        connection: ServiceConnection,
    ) -> Result<bool> {
        self.binds.fetch_add(1, Ordering::SeqCst);

        if !self.accept_binds.load(Ordering::SeqCst) {
            debug!("Loopback binder refusing bind");
            return Ok(false);
        }

        self.peer.on_bound(*configuration);
        *lock(&self.connection) = Some(connection);

        if self.auto_connect.load(Ordering::SeqCst) {
            self.deliver_connection();
        }

        Ok(true)
    }

    fn unbind_service(&self) -> Result<()> {
        if lock(&self.connection).take().is_some() {
            self.unbinds.fetch_add(1, Ordering::SeqCst);
            self.peer.on_destroyed();
        }
        Ok(())
    }
}
