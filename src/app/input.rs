use std::io::BufRead;
use tokio::sync::oneshot;
use tracing::warn;

use crate::sensor::{SensorCommand, SensorHub, SensorScript};

/// Where sensor notifications come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Script lines typed or piped into stdin, applied as they arrive
    Stdin,
    /// A pre-recorded script replayed with its waits
    Script(SensorScript),
}

impl InputSource {
    /// Start feeding `hub`. The receiver resolves once the input is exhausted.
    pub fn spawn(self, hub: SensorHub) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        match self {
            Self::Stdin => spawn_stdin_reader(hub, done_tx),
            Self::Script(script) => {
                tokio::spawn(async move {
                    script.play(&hub).await;
                    let _ = done_tx.send(());
                });
            }
        }
        done_rx
    }
}

fn spawn_stdin_reader(hub: SensorHub, done_tx: oneshot::Sender<()>) {
    // Dedicated thread, like a detector delivering notifications from outside the runtime
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for (index, line) in stdin.lock().lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to read sensor input");
                    break;
                }
            };

            match SensorCommand::parse_line(index + 1, &line) {
                Ok(Some(SensorCommand::Wait(wait))) => std::thread::sleep(wait),
                Ok(Some(command)) => command.apply(&hub),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ignoring sensor input"),
            }
        }
        let _ = done_tx.send(());
    });
}
