//! Watch command - start immediately and follow the stream until it closes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use ssemon_client::controller::ERROR_KIND;
use ssemon_client::{ControllerState, EventTransport, SseClient, StreamController};

use crate::output::{OutputContext, TerminalDisplay};

/// Follow the event stream until an `end` event, a transport error or Ctrl+C
pub async fn watch(
    controller: &mut StreamController<SseClient, TerminalDisplay>,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if !follow(controller, &running).await {
        ctx.error("Event stream failed");
        std::process::exit(1);
    }

    Ok(())
}

/// Start the stream and process it until Idle
///
/// Clearing `running` stops the stream. Returns `false` when the last
/// record is a transport error.
async fn follow<T: EventTransport>(
    controller: &mut StreamController<T, TerminalDisplay>,
    running: &AtomicBool,
) -> bool {
    controller.start().await;

    while controller.is_connected() {
        tokio::select! {
            state = controller.process_next() => {
                if state == ControllerState::Idle {
                    break;
                }
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                // Check running flag periodically
                if !running.load(Ordering::SeqCst) {
                    controller.stop();
                }
            }
        }
    }

    !controller
        .display()
        .surface()
        .latest()
        .is_some_and(|record| record.kind == ERROR_KIND)
}
