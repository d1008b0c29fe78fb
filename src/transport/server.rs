use crate::config::TransportConfig;
use crate::logging::{clear_correlation_id, set_correlation_id, MetricsCollector};
use crate::service::{resolve_labels, AlignmentService, LabeledScan};
use crate::transport::codec::{decode_scan, encode_scan, MultipartMessage, WireEncoding, WireError};
use crate::transport::framing::{read_message, write_message};
use anyhow::{anyhow, Context};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Pause after a failed accept before polling the listener again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of inbound connections for [`ExchangeServer`]
pub trait Accept: Send + Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Serves flange/tread exchanges: two scans in, two scans out, flange first.
pub struct ExchangeServer {
    service: Arc<AlignmentService>,
    config: TransportConfig,
    metrics: Arc<MetricsCollector>,
}

impl ExchangeServer {
    pub fn new(service: Arc<AlignmentService>, config: TransportConfig) -> Self {
        Self {
            service,
            config,
            metrics: Arc::new(MetricsCollector::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub async fn bind(&self) -> crate::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.bind_address))?;
        tracing::info!(address = %listener.local_addr()?, "Exchange server listening");
        Ok(listener)
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// A failed accept (descriptor exhaustion, aborted handshake) is logged
    /// and retried after a short pause; it never stops the server.
    pub async fn serve_until<A, F>(self: Arc<Self>, listener: A, shutdown: F) -> crate::Result<()>
    where
        A: Accept,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Exchange server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer).await {
                            tracing::warn!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    });
                }
            }
        }
    }

    pub async fn serve<A: Accept>(self: Arc<Self>, listener: A) -> crate::Result<()> {
        self.serve_until(listener, std::future::pending()).await
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<(), WireError> {
        tracing::debug!(peer = %peer, "Connection accepted");
        let limit = self.config.max_frame_bytes;

        loop {
            let Some(first) = read_message(&mut stream, limit).await? else {
                break;
            };
            let Some(second) = read_message(&mut stream, limit).await? else {
                tracing::warn!(peer = %peer, "Peer closed after a single scan; exchange dropped");
                break;
            };

            if let Some(replies) = self.process_exchange(first, second).await {
                for reply in &replies {
                    write_message(&mut stream, reply).await?;
                }
            }
        }

        tracing::debug!(peer = %peer, "Connection closed");
        Ok(())
    }

    /// Decode, align and encode one exchange.
    ///
    /// Returns the flange and tread replies in the encoding of the first
    /// request, or `None` when the exchange is dropped.
    pub async fn process_exchange(
        &self,
        first: MultipartMessage,
        second: MultipartMessage,
    ) -> Option<[MultipartMessage; 2]> {
        let correlation_id = Uuid::new_v4();

        let decoded = decode_scan(&first).and_then(|a| decode_scan(&second).map(|b| (a, b)));
        let ((scan_a, encoding), (scan_b, _)) = match decoded {
            Ok(scans) => scans,
            Err(e) => {
                tracing::warn!(correlation_id = %correlation_id, error = %e, "Discarding malformed message");
                return None;
            }
        };

        if let Err(e) = resolve_labels(&scan_a.label, &scan_b.label) {
            tracing::warn!(correlation_id = %correlation_id, error = %e, "Discarding exchange");
            return None;
        }

        tracing::info!(
            correlation_id = %correlation_id,
            encoding = %encoding,
            first = %scan_a.label,
            second = %scan_b.label,
            "Aligning exchange"
        );

        let service = self.service.clone();
        let joined = tokio::task::spawn_blocking(move || {
            set_correlation_id(correlation_id);
            let aligned = service.align_scans(&scan_a, &scan_b);
            clear_correlation_id();
            aligned
        })
        .await;

        let aligned = match joined {
            Ok(Ok(aligned)) => aligned,
            Ok(Err(e)) => {
                tracing::warn!(correlation_id = %correlation_id, error = %e, "Discarding exchange");
                return None;
            }
            Err(e) => {
                tracing::error!(correlation_id = %correlation_id, error = %e, "Alignment task failed");
                return None;
            }
        };

        self.metrics.record_alignment(&aligned.result, Some(correlation_id));

        let (flange, tread) = aligned.into_scans();
        match (encode_scan(&flange, encoding), encode_scan(&tread, encoding)) {
            (Ok(f), Ok(t)) => Some([f, t]),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(correlation_id = %correlation_id, error = %e, "Failed to encode reply");
                None
            }
        }
    }
}

/// Send two scans to an exchange server and wait for the aligned pair.
///
/// Returns `(flange, tread)`. Fails if no reply arrives within `timeout`,
/// which is also how a dropped exchange shows up on this side.
pub async fn request_alignment(
    address: &str,
    first: &LabeledScan,
    second: &LabeledScan,
    encoding: WireEncoding,
    timeout: Duration,
) -> crate::Result<(LabeledScan, LabeledScan)> {
    let mut stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("failed to connect to {}", address))?;

    write_message(&mut stream, &encode_scan(first, encoding)?).await?;
    write_message(&mut stream, &encode_scan(second, encoding)?).await?;

    let limit = TransportConfig::default().max_frame_bytes;
    let replies = tokio::time::timeout(timeout, async {
        let flange = read_message(&mut stream, limit).await?;
        let tread = read_message(&mut stream, limit).await?;
        Ok::<_, WireError>((flange, tread))
    })
    .await
    .map_err(|_| anyhow!("no reply from {} within {:?}", address, timeout))??;

    match replies {
        (Some(flange), Some(tread)) => Ok((decode_scan(&flange)?.0, decode_scan(&tread)?.0)),
        _ => Err(anyhow!("server closed the connection without replying")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PointSet;
    use crate::transport::codec::encode_binary;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Listener whose first `failures` accepts fail
    struct FailingListener {
        inner: TcpListener,
        failures: AtomicUsize,
    }

    impl Accept for FailingListener {
        fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
            async move {
                let failing = self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failing {
                    return Err(io::Error::new(io::ErrorKind::Other, "too many open files"));
                }
                self.inner.accept().await
            }
        }
    }

    fn server() -> ExchangeServer {
        ExchangeServer::new(Arc::new(AlignmentService::default()), TransportConfig::default())
    }

    #[tokio::test]
    async fn test_malformed_exchange_is_dropped() {
        let first = vec![b"not json".to_vec()];
        let second = encode_binary(&LabeledScan::new("Tread", PointSet::default())).unwrap();
        assert!(server().process_exchange(first, second).await.is_none());
    }

    #[tokio::test]
    async fn test_label_mismatch_is_dropped() {
        let a = encode_binary(&LabeledScan::new("Tread", PointSet::default())).unwrap();
        let b = encode_binary(&LabeledScan::new("Tread", PointSet::default())).unwrap();
        let server = server();
        assert!(server.process_exchange(a, b).await.is_none());
        assert_eq!(server.metrics().measurement_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_metrics_see_each_exchange() {
        let metrics = Arc::new(MetricsCollector::default());
        let server = server().with_metrics(metrics.clone());

        let points = PointSet::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (2.0, 1.0)]);
        let flange = encode_binary(&LabeledScan::new("Flange", points.clone())).unwrap();
        let tread = encode_binary(&LabeledScan::new("Tread", points)).unwrap();

        assert!(server.process_exchange(flange, tread).await.is_some());
        assert_eq!(metrics.measurement_count(), 1);
        assert!(Arc::ptr_eq(&metrics, &server.metrics()));
    }

    #[tokio::test]
    async fn test_accept_errors_do_not_stop_the_server() {
        let config = TransportConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..TransportConfig::default()
        };
        let server = Arc::new(ExchangeServer::new(Arc::new(AlignmentService::default()), config));
        let inner = server.bind().await.unwrap();
        let address = inner.local_addr().unwrap();
        let listener = FailingListener {
            inner,
            failures: AtomicUsize::new(3),
        };

        let handle = tokio::spawn(server.clone().serve(listener));

        let tread = LabeledScan::new("Tread", PointSet::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (2.0, 1.0)]));
        let flange = LabeledScan::new("Flange", tread.points.clone());
        let (first, second) = request_alignment(
            &address.to_string(),
            &flange,
            &tread,
            WireEncoding::Binary,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(first.label, "Flange");
        assert_eq!(second.label, "Tread");
        assert!(!handle.is_finished());
        handle.abort();
    }
}
