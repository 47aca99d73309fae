use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("no clipboard tool found (tried {tried})")]
    Unavailable { tried: String },
    #[error("clipboard tool `{tool}` failed: {message}")]
    Tool { tool: &'static str, message: String },
}

/// A command that reads clipboard content from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardTool {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

pub const CLIPBOARD_TOOLS: &[ClipboardTool] = &[
    ClipboardTool {
        program: "pbcopy",
        args: &[],
    },
    ClipboardTool {
        program: "wl-copy",
        args: &[],
    },
    ClipboardTool {
        program: "xclip",
        args: &["-selection", "clipboard"],
    },
    ClipboardTool {
        program: "clip",
        args: &[],
    },
];

/// Copies text through the first platform clipboard tool that runs.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    tools: &'static [ClipboardTool],
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self {
            tools: CLIPBOARD_TOOLS,
        }
    }
}

impl SystemClipboard {
    #[must_use]
    pub fn with_tools(tools: &'static [ClipboardTool]) -> Self {
        Self { tools }
    }

    /// Tries each tool in order. A tool that is missing or fails is skipped;
    /// the last failure is reported when none succeeds.
    pub fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let mut last_failure = None;
        for tool in self.tools {
            match run_tool(tool, text) {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(tool = tool.program, "clipboard tool not available"),
                Err(error) => {
                    debug!(%error, "clipboard tool failed, trying the next one");
                    last_failure = Some(error);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| ClipboardError::Unavailable {
            tried: self
                .tools
                .iter()
                .map(|tool| tool.program)
                .collect::<Vec<_>>()
                .join(", "),
        }))
    }
}

/// `Ok(false)` when the tool could not be started.
fn run_tool(tool: &ClipboardTool, text: &str) -> Result<bool, ClipboardError> {
    let failed = |message: String| ClipboardError::Tool {
        tool: tool.program,
        message,
    };

    let Ok(mut child) = Command::new(tool.program)
        .args(tool.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return Ok(false);
    };

    let written = child
        .stdin
        .take()
        .map_or(Ok(()), |mut stdin| stdin.write_all(text.as_bytes()));
    if let Err(error) = written {
        let _ = child.kill();
        let _ = child.wait();
        return Err(failed(error.to_string()));
    }

    let status = child.wait().map_err(|error| failed(error.to_string()))?;
    if status.success() {
        Ok(true)
    } else {
        Err(failed(status.to_string()))
    }
}
