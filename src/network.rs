//! Turns periodic chain id polls into `NetworkSignal`s for the sync engine.

use crate::{
    LotteryClient,
    types::{
        NetworkId,
        NetworkSignal,
    },
};
use std::{
    fmt,
    future::Future,
    time::Duration,
};
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

/// The signal to forward for one poll result, or `None` when it matches the
/// last one forwarded. A failed poll means the node is not usable.
pub fn next_signal<E>(
    polled: Result<u64, E>,
    last: Option<NetworkSignal>,
) -> Option<NetworkSignal>
where
    E: fmt::Display,
{
    let signal = match polled {
        Ok(id) => NetworkSignal::ready(NetworkId::new(id)),
        Err(err) => {
            warn!(%err, "chain id request failed");
            NetworkSignal::disconnected()
        }
    };
    (last != Some(signal)).then_some(signal)
}

/// Polls the chain id every `every` and reports changes to `client` until
/// its engine stops.
pub async fn watch_network<F, Fut, E>(client: LotteryClient, every: Duration, mut poll: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64, E>>,
    E: fmt::Display,
{
    let mut ticker = time::interval(every);
    let mut last = None;
    loop {
        ticker.tick().await;
        let Some(signal) = next_signal(poll().await, last) else {
            continue;
        };
        info!(network = ?signal.active_network(), "network changed");
        if client.network_changed(signal).is_err() {
            debug!("sync engine closed, network watcher stopping");
            break;
        }
        last = Some(signal);
    }
}
