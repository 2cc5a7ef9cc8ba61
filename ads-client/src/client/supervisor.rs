//! Keeps a session streaming: re-opens the stream with backoff whenever it ends.
//!
//! The session itself never reconnects. This module is the supervising
//! driver most consumers want: one background task that runs the receive
//! loop for the lifetime of the session.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::AdsClient;
use crate::client::retry::Backoff;
use crate::codec::XdsCodec;
use crate::error::Error;
use crate::runtime::Runtime;
use crate::transport::Transport;

/// Run `client` until it is closed or its retry policy gives up.
///
/// Returns [`Error::Closed`] after [`AdsClient::close`], otherwise the error
/// of the last failed attempt.
pub async fn supervise<T, C, R>(client: &AdsClient<T, C>, runtime: &R) -> Error
where
    T: Transport,
    C: XdsCodec,
    R: Runtime,
{
    let mut backoff = Backoff::new(client.retry_policy.clone());

    loop {
        let error = match client.run().await {
            Ok(stream) => {
                backoff.reset();
                client.receive_loop(stream).await
            }
            Err(error) => error,
        };

        if matches!(error, Error::Closed) || client.cancel.is_cancelled() {
            return Error::Closed;
        }

        let Some(delay) = backoff.next_backoff() else {
            warn!(parent: &client.span, %error, "giving up on ADS stream");
            return error;
        };
        info!(parent: &client.span, %error, ?delay, "re-opening ADS stream after backoff");

        tokio::select! {
            biased;
            _ = client.cancel.cancelled() => return Error::Closed,
            _ = runtime.sleep(delay) => {}
        }
    }
}

impl<T, C> AdsClient<T, C>
where
    T: Transport,
    C: XdsCodec,
{
    /// Supervise this session on `runtime` in the background.
    ///
    /// The task ends when the session is closed or retries are exhausted.
    pub fn spawn<R: Runtime>(self: &Arc<Self>, runtime: R) {
        let client = Arc::clone(self);
        let task_runtime = runtime.clone();
        runtime.spawn(async move {
            supervise(&client, &task_runtime).await;
        });
    }
}

#[cfg(all(test, feature = "rt-tokio"))]
mod tests {
    use super::*;
    use crate::client::SessionState;
    use crate::client::config::ClientConfig;
    use crate::client::dispatch::tests::cluster_any;
    use crate::client::retry::RetryPolicy;
    use crate::codec::prost::ProstCodec;
    use crate::message::Node;
    use crate::resource::TypeUrl;
    use crate::runtime::tokio::TokioRuntime;
    use crate::testutil::MockTransport;
    use std::time::Duration;

    fn config(policy: RetryPolicy) -> ClientConfig {
        ClientConfig::new(Node::new("ads-client", "test").with_id("test-id"), "mock://ads")
            .with_retry_policy(policy)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(50), 2.0).unwrap()
    }

    #[tokio::test]
    async fn reopens_stream_and_keeps_store() {
        let (transport, mut server) = MockTransport::new();
        let client = Arc::new(AdsClient::with_transport(
            config(fast_policy()),
            transport,
            ProstCodec,
        ));
        client.spawn(TokioRuntime);

        let mut first = server.accept().await.unwrap();
        first.next_request().await.unwrap();
        first.respond(TypeUrl::CLUSTER, "1", "c-1", vec![cluster_any("a")]);
        first.next_request().await.unwrap();
        drop(first);

        let mut second = tokio::time::timeout(Duration::from_secs(1), server.accept())
            .await
            .unwrap()
            .unwrap();
        let request = second.next_request().await.unwrap();
        assert_eq!(request.type_url, TypeUrl::CLUSTER.as_str());
        assert!(request.version_info.is_empty());
        assert_eq!(client.clusters(), vec!["a"]);

        client.close();
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (transport, _server) = MockTransport::new();
        transport.set_refuse(true);
        let client = AdsClient::with_transport(
            config(fast_policy().with_max_attempts(Some(2))),
            transport,
            ProstCodec,
        );

        let error = tokio::time::timeout(Duration::from_secs(1), supervise(&client, &TokioRuntime))
            .await
            .unwrap();
        assert!(matches!(error, Error::Connection(_)));
    }

    #[tokio::test]
    async fn close_stops_backoff_sleep() {
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(60), 1.0)
            .unwrap();
        let (transport, _server) = MockTransport::new();
        transport.set_refuse(true);
        let client = Arc::new(AdsClient::with_transport(config(policy), transport, ProstCodec));

        let supervised = Arc::clone(&client);
        let handle = tokio::spawn(async move { supervise(&supervised, &TokioRuntime).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.close();

        let error = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(error, Error::Closed));
    }
}
