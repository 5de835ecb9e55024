use async_trait::async_trait;
use image::RgbaImage;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{EngineEvent, EngineParameters, RecognitionEngine, RECOGNIZING_STATUS};
use crate::core::errors::RecognitionError;
use crate::core::types::RecognitionResult;
use crate::utils::encode_png_async;

/// Tesseract driven through its command line interface.
///
/// The page is PNG-encoded and piped to `tesseract stdin stdout`, so no
/// temporary files are involved. The whole invocation is bounded by `timeout`
/// and the child is killed if the future is dropped.
pub struct TesseractCliEngine {
    binary: String,
    timeout: Duration,
}

impl TesseractCliEngine {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Check whether the tesseract binary can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn command(&self, params: &EngineParameters) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(params.language)
            .arg("--psm")
            .arg(params.page_seg_mode.as_arg());

        if let Some(whitelist) = &params.char_whitelist {
            cmd.arg("-c").arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        if params.preserve_interword_spaces {
            cmd.arg("-c").arg("preserve_interword_spaces=1");
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RecognitionEngine for TesseractCliEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &RgbaImage,
        params: &EngineParameters,
        on_event: &(dyn Fn(EngineEvent) + Send + Sync),
    ) -> Result<RecognitionResult, RecognitionError> {
        on_event(EngineEvent::new("initializing api", 0.0));

        let png = encode_png_async(image.clone())
            .await
            .map_err(|e| RecognitionError::EngineFailed(format!("{:#}", e)))?;

        let mut child = self.command(params).spawn().map_err(|e| {
            RecognitionError::EngineUnavailable(format!("failed to start {}: {}", self.binary, e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognitionError::EngineFailed("stdin was not captured".to_string()))?;

        on_event(EngineEvent::new("initializing api", 1.0));
        on_event(EngineEvent::new(RECOGNIZING_STATUS, 0.0));

        let feed = async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        };

        let run = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            if let Err(e) = fed {
                // tesseract may close stdin early on a bad image
                debug!("writing page to tesseract stdin failed: {}", e);
            }
            output
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| RecognitionError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| RecognitionError::EngineFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(RecognitionError::EngineFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|e| RecognitionError::InvalidOutput(e.to_string()))?;

        on_event(EngineEvent::new(RECOGNIZING_STATUS, 1.0));

        Ok(RecognitionResult { text, words: None })
    }
}
