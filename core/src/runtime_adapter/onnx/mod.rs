//! ONNX Runtime backend for the streaming model.
//!
//! Wraps an `ort` session loaded from the exported model file. The session is
//! configured once at load time (intra-op threads, graph optimization level)
//! and its declared input/output names are checked against the streaming
//! contract, so a wrong model fails with `ModelLoad` before any audio flows.

use super::{
    check_inputs, check_outputs, InferenceOutput, StreamingModel, INPUT_NAME, OUTPUT_NAME,
};
use crate::config::{ModelConfig, OptimizationLevel};
use crate::error::{LlvcError, LlvcResult};
use crate::state::{ModelState, StateKind};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use std::path::{Path, PathBuf};

impl From<OptimizationLevel> for GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
            OptimizationLevel::Basic => GraphOptimizationLevel::Level1,
            OptimizationLevel::Extended => GraphOptimizationLevel::Level2,
            OptimizationLevel::All => GraphOptimizationLevel::Level3,
        }
    }
}

/// Streaming model executed by ONNX Runtime.
pub struct OnnxStreamingModel {
    session: Session,
    model_path: PathBuf,
}

impl OnnxStreamingModel {
    /// Loads the model and verifies its signature.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` if:
    /// - the model file doesn't exist
    /// - ONNX Runtime rejects the file or the session options
    /// - an input or output of the streaming contract is missing
    pub fn load(config: &ModelConfig) -> LlvcResult<Self> {
        let path = config.path.as_path();
        if !path.exists() {
            return Err(LlvcError::model_load(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| {
                LlvcError::model_load(format!("Failed to create session builder: {}", e))
            })?
            .with_optimization_level(config.optimization_level.into())
            .map_err(|e| {
                LlvcError::model_load(format!("Failed to set optimization level: {}", e))
            })?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| LlvcError::model_load(format!("Failed to set threads: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| LlvcError::model_load(format!("Failed to load model: {}", e)))?;

        Self::check_signature(&session)?;

        log::info!(
            "Loaded streaming model {} ({} intra-op thread(s), {:?} optimization)",
            path.display(),
            config.intra_threads,
            config.optimization_level
        );

        Ok(Self {
            session,
            model_path: path.to_path_buf(),
        })
    }

    /// Path the model was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn check_signature(session: &Session) -> LlvcResult<()> {
        let inputs: Vec<String> = session
            .inputs()
            .iter()
            .map(|input| input.name().to_string())
            .collect();
        let outputs: Vec<String> = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();
        log::debug!("Model inputs: {:?}, outputs: {:?}", inputs, outputs);

        let required_inputs =
            std::iter::once(INPUT_NAME).chain(StateKind::ALL.iter().map(|k| k.input_name()));
        for name in required_inputs {
            if !inputs.iter().any(|n| n == name) {
                return Err(LlvcError::model_load(format!(
                    "Model has no '{}' input (found {:?})",
                    name, inputs
                )));
            }
        }

        let required_outputs =
            std::iter::once(OUTPUT_NAME).chain(StateKind::ALL.iter().map(|k| k.output_name()));
        for name in required_outputs {
            if !outputs.iter().any(|n| n == name) {
                return Err(LlvcError::model_load(format!(
                    "Model has no '{}' output (found {:?})",
                    name, outputs
                )));
            }
        }
        Ok(())
    }
}

fn state_tensor(state: &ModelState, kind: StateKind) -> LlvcResult<Tensor<f32>> {
    let array = state.get(kind);
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_array((array.shape().to_vec(), data)).map_err(|e| {
        LlvcError::inference(format!(
            "Failed to create '{}' tensor: {}",
            kind.input_name(),
            e
        ))
    })
}

fn extract_f32(value: Option<&DynValue>, name: &str) -> LlvcResult<(Vec<usize>, Vec<f32>)> {
    let value = value.ok_or_else(|| LlvcError::inference(format!("Missing '{}' in results", name)))?;
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| LlvcError::inference(format!("Failed to extract '{}': {}", name, e)))?;
    let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
    Ok((dims, data.to_vec()))
}

impl StreamingModel for OnnxStreamingModel {
    fn name(&self) -> &str {
        "onnx"
    }

    fn infer(&mut self, block: &[f32], state: &ModelState) -> LlvcResult<InferenceOutput> {
        check_inputs(block, state)?;

        let input = Tensor::from_array((vec![1usize, 1, block.len()], block.to_vec()))
            .map_err(|e| LlvcError::inference(format!("Failed to create input tensor: {}", e)))?;
        let enc_buf = state_tensor(state, StateKind::EncBuf)?;
        let dec_buf = state_tensor(state, StateKind::DecBuf)?;
        let out_buf = state_tensor(state, StateKind::OutBuf)?;
        let convnet_pre_ctx = state_tensor(state, StateKind::ConvnetPreCtx)?;

        let outputs = self
            .session
            .run(ort::inputs![
                INPUT_NAME => input,
                StateKind::EncBuf.input_name() => enc_buf,
                StateKind::DecBuf.input_name() => dec_buf,
                StateKind::OutBuf.input_name() => out_buf,
                StateKind::ConvnetPreCtx.input_name() => convnet_pre_ctx,
            ])
            .map_err(|e| LlvcError::inference(format!("ONNX Runtime inference failed: {}", e)))?;

        // Only dims [1] x [2] of `output` carry audio; the leading batch dim is 1.
        let (out_dims, samples) = extract_f32(outputs.get(OUTPUT_NAME), OUTPUT_NAME)?;
        if out_dims.len() != 3 || out_dims[0] != 1 || out_dims[1] * out_dims[2] != block.len() {
            return Err(LlvcError::shape_mismatch(
                OUTPUT_NAME,
                &[1, 1, block.len()],
                &out_dims,
            ));
        }

        let mut next = Vec::with_capacity(StateKind::ALL.len());
        for kind in StateKind::ALL {
            let name = kind.output_name();
            let (dims, data) = extract_f32(outputs.get(name), name)?;
            if dims != kind.shape() {
                return Err(LlvcError::shape_mismatch(name, kind.shape(), &dims));
            }
            next.push(data);
        }
        let next: [Vec<f32>; 4] = next
            .try_into()
            .map_err(|_| LlvcError::inference("Model returned an incomplete state"))?;

        let output = InferenceOutput {
            block: samples,
            state: ModelState::from_flat(next)?,
        };
        check_outputs(block.len(), &output)?;
        drop(outputs);

        log::trace!("{}: inferred block of {} samples", self.name(), block.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_fails_on_nonexistent_file() {
        let result = OnnxStreamingModel::load(&ModelConfig::new("/nonexistent/llvc_model.onnx"));
        assert!(matches!(result, Err(LlvcError::ModelLoad(_))));
    }

    #[test]
    fn test_load_fails_on_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("llvc_model.onnx");
        fs::write(&model_path, b"not an onnx graph").unwrap();

        let result = OnnxStreamingModel::load(&ModelConfig::new(&model_path));
        assert!(matches!(result, Err(LlvcError::ModelLoad(_))));
    }

    #[test]
    fn test_optimization_level_mapping() {
        assert!(matches!(
            GraphOptimizationLevel::from(OptimizationLevel::Extended),
            GraphOptimizationLevel::Level2
        ));
        assert!(matches!(
            GraphOptimizationLevel::from(OptimizationLevel::Disable),
            GraphOptimizationLevel::Disable
        ));
    }
}
