use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::gemini::PredictionSource;
use crate::state::{DATE_FORMAT, Delta, ProviderCommand};

/// Runs provider calls on one background thread, strictly one at a time.
///
/// Commands that pile up while a call is running are collapsed to the newest
/// one; the superseded ones are skipped without touching the network. The
/// thread exits when either channel closes.
pub fn spawn_prediction_worker(
    source: Arc<dyn PredictionSource>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(first) = cmd_rx.recv() {
            let mut cmd = first;
            while let Ok(next) = cmd_rx.try_recv() {
                let ProviderCommand::FetchPredictions { date, .. } = &cmd;
                let _ = tx.send(Delta::Log(format!(
                    "[INFO] Skipped superseded request for {}",
                    date.format(DATE_FORMAT)
                )));
                cmd = next;
            }

            let ProviderCommand::FetchPredictions { generation, date } = cmd;
            debug!(generation, date = %date.format(DATE_FORMAT), "running prediction fetch");
            let delta = match source.fetch(date) {
                Ok(batch) => Delta::PredictionsLoaded {
                    generation,
                    date,
                    batch,
                },
                Err(error) => Delta::PredictionsFailed {
                    generation,
                    date,
                    error,
                },
            };
            if tx.send(delta).is_err() {
                break;
            }
        }
    })
}
