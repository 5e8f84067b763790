//! Hardware button adapter
//!
//! Edges are read from `gpiomon`, which prints one line per event, e.g.
//! `event:  RISING EDGE offset: 17 timestamp: [    1634.123456789]`.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionToken, Source};
use crate::config::ButtonBinding;
use crate::dispatch::{Dispatcher, Submission};

#[derive(Debug, thiserror::Error)]
pub enum ButtonError {
    #[error("failed to start gpiomon: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("gpiomon produced no output stream")]
    NoStdout,

    #[error("gpiomon exited: {0}")]
    Exited(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub line: u32,
    pub kind: EdgeKind,
}

/// Parse one line of `gpiomon` output
pub fn parse_gpiomon_line(line: &str) -> Option<Edge> {
    let rest = line.trim().strip_prefix("event:")?.trim_start();

    let kind = if rest.starts_with("RISING EDGE") {
        EdgeKind::Rising
    } else if rest.starts_with("FALLING EDGE") {
        EdgeKind::Falling
    } else {
        return None;
    };

    let (_, after) = rest.split_once("offset:")?;
    let line = after.split_whitespace().next()?.parse().ok()?;
    Some(Edge { line, kind })
}

/// Input line to action map
#[derive(Debug, Clone, Default)]
pub struct ButtonBindings(HashMap<u32, Action>);

impl ButtonBindings {
    /// Decode configured bindings; undecodable ones are logged and skipped
    pub fn from_config(bindings: &[ButtonBinding]) -> Self {
        let mut map = HashMap::new();
        for binding in bindings {
            match Action::from_parts(&binding.kind, &binding.args) {
                Ok(action) => {
                    debug!(line = binding.line, %action, "button bound");
                    map.insert(binding.line, action);
                }
                Err(e) => warn!(line = binding.line, error = %e, "ignoring button binding"),
            }
        }
        Self(map)
    }

    pub fn get(&self, line: u32) -> Option<&Action> {
        self.0.get(&line)
    }

    /// Bound lines in ascending order
    pub fn lines(&self) -> Vec<u32> {
        let mut lines: Vec<_> = self.0.keys().copied().collect();
        lines.sort_unstable();
        lines
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct ButtonAdapter {
    bindings: ButtonBindings,
    dispatcher: Dispatcher,
}

impl ButtonAdapter {
    pub fn new(bindings: ButtonBindings, dispatcher: Dispatcher) -> Self {
        Self {
            bindings,
            dispatcher,
        }
    }

    /// Dispatch the action bound to a rising edge's line
    pub fn on_edge(&self, edge: Edge) -> Option<Submission> {
        if edge.kind != EdgeKind::Rising {
            return None;
        }
        match self.bindings.get(edge.line) {
            Some(action) => Some(
                self.dispatcher
                    .submit(ActionToken::new(action.clone(), Source::Button)),
            ),
            None => {
                info!(line = edge.line, "button pressed on unbound line");
                None
            }
        }
    }
}

/// Watches the bound lines of one GPIO chip through `gpiomon`
pub struct GpioMonitor {
    chip: String,
}

impl GpioMonitor {
    pub fn new(chip: &str) -> Self {
        Self {
            chip: chip.to_string(),
        }
    }

    /// Feed edges to `adapter` until `gpiomon` exits
    pub async fn run(&self, adapter: &ButtonAdapter) -> Result<(), ButtonError> {
        let lines = adapter.bindings.lines();
        if lines.is_empty() {
            info!("no button bindings, gpio monitor idle");
            return Ok(());
        }

        let mut child = Command::new("gpiomon")
            .arg("--rising-edge")
            .arg(&self.chip)
            .args(lines.iter().map(u32::to_string))
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        info!(chip = %self.chip, ?lines, "gpio monitor started");

        let stdout = child.stdout.take().ok_or(ButtonError::NoStdout)?;
        let mut reader = BufReader::new(stdout).lines();

        while let Some(line) = reader.next_line().await? {
            match parse_gpiomon_line(&line) {
                Some(edge) => {
                    if adapter.on_edge(edge) == Some(Submission::Closed) {
                        return Ok(());
                    }
                }
                None => debug!(%line, "unrecognised gpiomon output"),
            }
        }

        let status = child.wait().await?;
        Err(ButtonError::Exited(status.to_string()))
    }
}
