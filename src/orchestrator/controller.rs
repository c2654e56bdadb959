//! Command loop between the UI thread and the controllers.
//!
//! Receives commands, runs each one on a blocking worker and emits a completion event
//! for presentation layers.

use super::Controllers;
use crate::model::{AppEvent, RunRequest, Task};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Load(Task),
    Run(RunRequest),
    Quit,
}

/// Execute UI commands and emit events back to presentation layers.
///
/// Each command runs in its own task, so the loop stays responsive to `Quit` while a
/// call is in flight. The UI is expected to send one request at a time; overlapping
/// requests for the same controller queue on its lock.
pub(crate) async fn run_controller(
    controllers: Controllers,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            UiCommand::Load(task) => {
                let controllers = controllers.clone();
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    let result = controllers.load(task).await;
                    // Receiver gone means the UI already exited.
                    let _ = event_tx.send(AppEvent::LoadCompleted { task, result });
                });
            }
            UiCommand::Run(request) => {
                let controllers = controllers.clone();
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    let task = request.task();
                    let result = controllers.run(request).await;
                    let _ = event_tx.send(AppEvent::RunCompleted {
                        task,
                        result: Box::new(result),
                    });
                });
            }
            // Quit does not wait for in-flight calls; the process exits right after.
            UiCommand::Quit => break,
        }
    }
    Ok(())
}
