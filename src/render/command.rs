// src/render/command.rs — Renderer that shells out to an external program
//
// The program receives the seed on stdin and must write a PNG to the path in
// DESIGNLOOP_OUTPUT. DESIGNLOOP_CANDIDATE_ID carries the candidate id.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{RenderResult, Renderer, Screenshot};
use crate::core::types::DesignCandidate;
use crate::util::truncate_str;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    device_pixel_ratio: f64,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir: std::env::temp_dir(),
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    fn output_path(&self, candidate: &DesignCandidate) -> PathBuf {
        self.output_dir
            .join(format!("designloop-{}.png", candidate.id))
    }

    async fn run(&self, candidate: &DesignCandidate) -> Result<Screenshot, String> {
        let output = OutputFile(self.output_path(candidate));
        let output_path = &output.0;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("DESIGNLOOP_CANDIDATE_ID", &candidate.id)
            .env("DESIGNLOOP_OUTPUT", output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start '{}': {}", self.program, e))?;

        // Feed stdin from its own task so a child that fills stderr first
        // cannot stall against us.
        if let Some(mut stdin) = child.stdin.take() {
            let seed = candidate.seed.clone().into_bytes();
            tokio::spawn(async move {
                // A renderer that ignores stdin may close it early.
                if let Err(e) = stdin.write_all(&seed).await {
                    tracing::debug!("Renderer closed stdin: {}", e);
                }
            });
        }

        let finished = child
            .wait_with_output()
            .await
            .map_err(|e| format!("renderer did not finish: {}", e))?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(format!(
                "renderer exited with {}: {}",
                finished.status,
                truncate_str(stderr.trim(), 500)
            ));
        }

        let bytes = tokio::fs::read(output_path)
            .await
            .map_err(|e| format!("renderer wrote no image to {}: {}", output_path.display(), e))?;

        let (width, height) =
            png_dimensions(&bytes).ok_or_else(|| "renderer output is not a PNG".to_string())?;
        Ok(Screenshot::new(bytes, width, height).with_device_pixel_ratio(self.device_pixel_ratio))
    }
}

/// Removes the render target when dropped, including when a timeout
/// cancels the render.
struct OutputFile(PathBuf);

impl Drop for OutputFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, candidate: &DesignCandidate) -> RenderResult {
        let start = Instant::now();
        let result = self.run(candidate).await;
        let elapsed = start.elapsed().as_millis() as u64;
        match result {
            Ok(screenshot) => {
                tracing::debug!(
                    candidate = %candidate.id,
                    width = screenshot.width,
                    height = screenshot.height,
                    elapsed_ms = elapsed,
                    "Rendered candidate",
                );
                RenderResult::success(screenshot, elapsed)
            }
            Err(e) => {
                tracing::warn!(candidate = %candidate.id, "Render failed: {}", e);
                RenderResult::failure(e, elapsed)
            }
        }
    }
}
