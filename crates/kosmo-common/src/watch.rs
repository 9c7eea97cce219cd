//! Reconnecting condition watches over dynamic resources
//!
//! [`watch_until`] runs a watch connection loop with an overall deadline:
//! each connection replays current state (resource version `"1"`), the
//! server is asked to close connections after two minutes, and closed or
//! broken connections are re-established until either the stop predicate
//! is satisfied or the deadline passes. The deadline surfaces as the
//! [`Error::WatchTimeout`] sentinel so callers can say what they were
//! waiting for.

use futures::{pin_mut, Stream, StreamExt};
use kube::api::{Api, DynamicObject, WatchEvent, WatchParams};
use kube::core::ApiResource;
use kube::Client;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, warn};

use crate::error::Error;
use crate::Result;

/// Per-connection server-side timeout; the server closes the stream after
/// this many seconds and the loop reconnects.
const CONNECTION_TIMEOUT_SECS: u32 = 120;

/// Pause before re-establishing a broken connection
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Watches always replay current state rather than resuming from a
/// tracked resource version.
const INITIAL_RESOURCE_VERSION: &str = "1";

/// What to watch and for how long
pub struct WatchConfig {
    /// Discovery-resolved resource to watch
    pub resource: ApiResource,
    /// Namespace to watch, or `None` for cluster scope
    pub namespace: Option<String>,
    /// Optional label selector restricting the watched set
    pub label_selector: Option<String>,
    /// Overall deadline across all connection attempts
    pub timeout: Duration,
    /// What is being waited for, quoted in the timeout error
    pub description: String,
}

/// Decides whether a watch is done
///
/// Return `Ok(true)` to terminate the watch successfully, `Ok(false)` to
/// keep watching; an error aborts the watch and is returned to the caller.
pub type StopFn<'a> = dyn FnMut(&WatchEvent<DynamicObject>) -> Result<bool> + Send + 'a;

/// Outcome of a single watch connection
#[derive(Debug)]
enum Drained {
    /// The stop predicate fired
    Satisfied,
    /// The connection ended without a verdict; connect again
    Reconnect,
}

/// Watch until `stop_fn` returns true or the deadline passes
pub async fn watch_until(
    client: Client,
    config: &WatchConfig,
    stop_fn: &mut StopFn<'_>,
) -> Result<()> {
    let api: Api<DynamicObject> = match &config.namespace {
        Some(ns) => Api::namespaced_with(client, ns, &config.resource),
        None => Api::all_with(client, &config.resource),
    };

    let mut params = WatchParams::default().timeout(CONNECTION_TIMEOUT_SECS);
    if let Some(selector) = &config.label_selector {
        params = params.labels(selector);
    }

    let deadline = Instant::now() + config.timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(Error::watch_timeout(&config.description));
        }

        let stream = match time::timeout_at(deadline, api.watch(&params, INITIAL_RESOURCE_VERSION))
            .await
        {
            Err(_) => return Err(Error::watch_timeout(&config.description)),
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                // Client-side API rejections will not heal by retrying.
                let permanent = matches!(&err,
                    kube::Error::Api(response) if response.code < 500 && response.code != 429);
                if permanent {
                    return Err(err.into());
                }
                warn!(error = %err, resource = %config.resource.kind, "watch connection failed, retrying");
                time::sleep_until(deadline.min(Instant::now() + RECONNECT_BACKOFF)).await;
                continue;
            }
        };

        match drain(stream, deadline, stop_fn, &config.description).await? {
            Drained::Satisfied => return Ok(()),
            Drained::Reconnect => {
                debug!(resource = %config.resource.kind, "watch connection ended, reconnecting");
            }
        }
    }
}

/// Consume one watch connection until a verdict or the deadline
async fn drain<S>(
    stream: S,
    deadline: Instant,
    stop_fn: &mut StopFn<'_>,
    description: &str,
) -> Result<Drained>
where
    S: Stream<Item = kube::Result<WatchEvent<DynamicObject>>>,
{
    pin_mut!(stream);
    loop {
        let item = match time::timeout_at(deadline, stream.next()).await {
            Err(_) => return Err(Error::watch_timeout(description)),
            Ok(item) => item,
        };

        match item {
            // Server closed the stream (connection timeout reached).
            None => return Ok(Drained::Reconnect),
            Some(Err(err)) => {
                warn!(error = %err, "watch stream broke, reconnecting");
                return Ok(Drained::Reconnect);
            }
            Some(Ok(WatchEvent::Bookmark(_))) => {}
            Some(Ok(WatchEvent::Error(response))) => {
                // 410 Gone: our seed version expired; replay from scratch.
                if response.code == 410 {
                    return Ok(Drained::Reconnect);
                }
                return Err(Error::watch_failed(format!(
                    "{}: {}",
                    response.reason, response.message
                )));
            }
            Some(Ok(event)) => {
                if stop_fn(&event)? {
                    return Ok(Drained::Satisfied);
                }
            }
        }
    }
}
