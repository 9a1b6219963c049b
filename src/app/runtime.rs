use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tracing::info;

use super::InputSource;
use crate::activation::HotspotActivationScheduler;
use crate::board::HotspotBoard;
use crate::config::Config;
use crate::models::{HotspotEvent, HotspotId, HotspotState};
use crate::sensor::SensorHub;

/// Extra time, on top of one dwell period, to wait for in-flight activations after input ends
const LINGER_MARGIN: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

pub async fn run(config: &Config, input: InputSource, format: OutputFormat) -> Result<()> {
    run_with_output(config, input, format, io::stdout()).await
}

pub async fn run_with_output<W: Write>(
    config: &Config,
    input: InputSource,
    format: OutputFormat,
    out: W,
) -> Result<()> {
    let activation_time = config.activation_time()?;

    // Wire sensor -> scheduler -> board
    let hub = SensorHub::new();
    let scheduler = HotspotActivationScheduler::new(activation_time);
    scheduler.attach(&hub);
    let mut events = scheduler.subscribe();
    let mut board = HotspotBoard::new(config.hotspots.iter().copied());
    let mut printer = EventPrinter { out, format };

    info!(
        activation_ms = config.activation_time_ms,
        hotspots = config.hotspots.len(),
        "hotspot scheduler running"
    );
    let mut input_done = input.spawn(hub.clone());

    // Main loop
    loop {
        tokio::select! {
            Some(event) = events.recv() => printer.handle(&mut board, event)?,
            _ = &mut input_done => break,
        }
    }

    // Let a hotspot that is still dwelling finish
    let linger = tokio::time::sleep(activation_time + LINGER_MARGIN);
    tokio::pin!(linger);
    loop {
        tokio::select! {
            Some(event) = events.recv() => printer.handle(&mut board, event)?,
            _ = &mut linger => break,
        }
    }

    scheduler.shutdown();
    while let Some(event) = events.recv().await {
        printer.handle(&mut board, event)?;
    }

    printer.board(&board)?;
    info!("sensor input finished");
    Ok(())
}

#[derive(Serialize)]
struct EventRecord {
    at: String,
    event: &'static str,
    id: HotspotId,
}

#[derive(Serialize)]
struct BoardEntry {
    id: HotspotId,
    state: HotspotState,
}

#[derive(Serialize)]
struct BoardRecord {
    board: Vec<BoardEntry>,
}

struct EventPrinter<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> EventPrinter<W> {
    fn handle(&mut self, board: &mut HotspotBoard, event: HotspotEvent) -> Result<()> {
        board.apply(event);

        let now = Local::now();
        match self.format {
            OutputFormat::Text => {
                writeln!(self.out, "{} {}", now.format("%H:%M:%S%.3f"), event)?;
            }
            OutputFormat::Json => {
                let record = EventRecord {
                    at: now.to_rfc3339(),
                    event: event.name(),
                    id: event.id(),
                };
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn board(&mut self, board: &HotspotBoard) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if board.is_empty() {
                    writeln!(self.out, "no hotspots seen")?;
                }
                for (id, state) in board.iter() {
                    writeln!(self.out, "hotspot {}: {}", id, state.display())?;
                }
            }
            OutputFormat::Json => {
                let record = BoardRecord {
                    board: board
                        .iter()
                        .map(|(id, state)| BoardEntry { id, state })
                        .collect(),
                };
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
