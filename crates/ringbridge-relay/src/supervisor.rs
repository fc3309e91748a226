use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ringbridge_io::IoSubsystem;
use ringbridge_transport::{DatagramSink, TcpIngressSocket, UdpCollector};
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::egress::EgressBridge;
use crate::error::{RelayError, Result};
use crate::ingress::{accept_loop, IngressContext};
use crate::router::StreamRouter;
use crate::shutdown::ShutdownSignal;
use crate::stats::{BridgeStats, BridgeSummary};

/// Starts the relay threads.
pub struct BridgeSupervisor;

impl BridgeSupervisor {
    /// Start the relay, sending egress datagrams to `config.collector_addr`.
    ///
    /// `io` must already be initialized. Bind failures are returned here;
    /// everything after startup is logged and survived.
    pub fn start<I: IoSubsystem + 'static>(io: Arc<I>, config: &BridgeConfig) -> Result<BridgeHandle> {
        let collector = UdpCollector::open(config.collector_addr)?;
        Self::start_with_sink(io, config, Arc::new(collector))
    }

    /// Start the relay with an explicit datagram sink.
    pub fn start_with_sink<I: IoSubsystem + 'static>(
        io: Arc<I>,
        config: &BridgeConfig,
        sink: Arc<dyn DatagramSink>,
    ) -> Result<BridgeHandle> {
        config.validate()?;

        let listener = TcpIngressSocket::bind(config.listen_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr();

        let stats = Arc::new(BridgeStats::default());
        let mut handle = BridgeHandle {
            local_addr,
            collector: sink.describe(),
            ingress_shutdown: ShutdownSignal::new(),
            egress_shutdown: ShutdownSignal::new(),
            accept_thread: None,
            egress_thread: None,
            stats: Arc::clone(&stats),
        };

        let egress = EgressBridge::new(
            Arc::clone(&io),
            sink,
            Arc::clone(&stats),
            config.max_frame_size,
            config.egress_batch,
            config.egress_poll_interval(),
        );
        let egress_signal = handle.egress_shutdown.clone();
        handle.egress_thread = Some(spawn("egress", move || egress.run(egress_signal))?);

        let ctx = Arc::new(IngressContext {
            router: StreamRouter::new(Arc::clone(&io)),
            io,
            stats,
            shutdown: handle.ingress_shutdown.clone(),
            frame_config: config.frame_config(),
            accept_poll_interval: config.accept_poll_interval(),
        });
        // On failure the handle's Drop stops egress again.
        handle.accept_thread = Some(spawn("ingress", move || accept_loop(listener, ctx))?);

        info!(
            listen = %local_addr,
            collector = %handle.collector,
            trailing = ?config.trailing_bytes,
            "bridge started"
        );
        Ok(handle)
    }
}

fn spawn<F>(name: &'static str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("ringbridge-{name}"))
        .spawn(body)
        .map_err(|source| RelayError::Spawn { name, source })
}

/// A running relay.
///
/// Dropping the handle stops the relay; call [`BridgeHandle::shutdown`] to
/// observe the outcome.
pub struct BridgeHandle {
    local_addr: SocketAddr,
    collector: String,
    ingress_shutdown: ShutdownSignal,
    egress_shutdown: ShutdownSignal,
    accept_thread: Option<JoinHandle<()>>,
    egress_thread: Option<JoinHandle<()>>,
    stats: Arc<BridgeStats>,
}

impl BridgeHandle {
    /// Address the ingress listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Description of the egress destination.
    pub fn collector(&self) -> &str {
        &self.collector
    }

    /// Counters so far.
    pub fn stats(&self) -> BridgeSummary {
        self.stats.summary()
    }

    /// Stop the relay and wait for every thread.
    ///
    /// Ingress stops first: no new connections, open connections close after
    /// their current read. Egress then runs a final drain and exits.
    pub fn shutdown(mut self) -> Result<BridgeSummary> {
        self.stop()?;
        let summary = self.stats.summary();
        info!(?summary, "bridge stopped");
        Ok(summary)
    }

    fn stop(&mut self) -> Result<()> {
        let mut outcome = Ok(());

        self.ingress_shutdown.trigger();
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                outcome = Err(RelayError::ThreadPanicked("ingress"));
            }
        }

        self.egress_shutdown.trigger();
        if let Some(handle) = self.egress_thread.take() {
            if handle.join().is_err() && outcome.is_ok() {
                outcome = Err(RelayError::ThreadPanicked("egress"));
            }
        }

        outcome
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if self.accept_thread.is_none() && self.egress_thread.is_none() {
            return;
        }
        if let Err(err) = self.stop() {
            warn!(error = %err, "bridge stopped with errors");
        }
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("local_addr", &self.local_addr)
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}
