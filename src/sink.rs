use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::messages::DisplayState;

/// Anything that can show decoded telemetry.
///
/// `apply` runs on the presenter task only, one state at a time, in the order
/// the datagrams were received. It should return quickly.
pub trait PresentationSink: Send + 'static {
    fn apply(&mut self, state: DisplayState);
}

pub fn delivery_channel(
    capacity: usize,
) -> (mpsc::Sender<DisplayState>, mpsc::Receiver<DisplayState>) {
    mpsc::channel(capacity)
}

/// Drains `rx` into `sink` until every sender is gone, then hands the sink back.
pub fn spawn_presenter<S: PresentationSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DisplayState>,
) -> JoinHandle<S> {
    tokio::task::spawn(async move {
        while let Some(state) = rx.recv().await {
            sink.apply(state);
        }
        debug!("Delivery channel closed, presenter exiting");
        sink
    })
}
