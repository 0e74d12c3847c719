//! Extractors that run as an external program per frame.
//!
//! Invocation: `<program> <args..> --frame <png> [--weights <path>]`.
//! The program prints one JSON object `{"shape": [..], "data": [..]}` on
//! stdout and exits 0; anything else is reported as a failure for that frame.

use serde::Deserialize;
use std::process::{Command, Stdio};
use tracing::debug;

use super::extractor::{FeatureExtractor, FeatureTensor, FrameInput};
use crate::config::CommandSpec;
use crate::error::ExtractorError;

const STDERR_TAIL_CHARS: usize = 500;

#[derive(Deserialize)]
struct TensorOutput {
    shape: Vec<usize>,
    data: Vec<f32>,
}

pub struct CommandExtractor {
    spec: CommandSpec,
}

impl CommandExtractor {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    fn command(&self, input: &FrameInput<'_>) -> Command {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args).arg("--frame").arg(input.persisted);
        if let Some(weights) = &self.spec.weights {
            cmd.arg("--weights").arg(weights);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError> {
        debug!(
            "Running {} {:?} on {}",
            self.spec.program,
            self.spec.args,
            input.persisted.display()
        );
        let output = self
            .command(input)
            .output()
            .map_err(|source| ExtractorError::Launch {
                program: self.spec.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ExtractorError::Exit {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "(no stderr)".to_string()
                } else {
                    stderr.chars().take(STDERR_TAIL_CHARS).collect()
                },
            });
        }

        let parsed: TensorOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractorError::Output(e.to_string()))?;
        let tensor = FeatureTensor::new(parsed.shape, parsed.data)?;

        if let Some(expected) = &self.spec.expected_shape {
            if &tensor.shape != expected {
                return Err(ExtractorError::Shape {
                    expected: expected.clone(),
                    actual: tensor.shape,
                });
            }
        }
        Ok(tensor)
    }
}
