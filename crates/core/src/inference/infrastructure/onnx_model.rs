/// ONNX Runtime session shared by every caller of one model.
///
/// Access is admitted first-come-first-served through a [`FairGate`] and the
/// session itself sits behind a `Mutex` because `Session::run` needs `&mut`.
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;

use crate::inference::domain::inference_engine::{InferenceEngine, ModelOutputs, NamedTensor};
use crate::inference::infrastructure::fair_gate::FairGate;
use crate::shared::error::{InferenceError, LoadError};

pub struct OnnxModel {
    name: String,
    session: Mutex<ort::session::Session>,
    gate: FairGate,
    input_size: Option<(u32, u32)>,
    output_names: Vec<String>,
}

impl OnnxModel {
    /// Load and optimize a model. Fails fast so the service never starts
    /// half-configured.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()
            .map_err(|e| invalid(path, e))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| invalid(path, e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| invalid(path, e))?
            .commit_from_file(path)
            .map_err(|e| invalid(path, e))?;

        // NCHW: [1, C, H, W]; dynamic axes are reported as -1.
        let input_size = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 && shape[3] > 0 {
                    Some((shape[2] as u32, shape[3] as u32))
                } else {
                    None
                }
            } else {
                None
            }
        });
        let output_names = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("Loaded model {name} (input size {input_size:?})");

        Ok(Self {
            name,
            session: Mutex::new(session),
            gate: FairGate::new(),
            input_size,
            output_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

impl InferenceEngine for OnnxModel {
    fn infer(&self, input: Array4<f32>) -> Result<ModelOutputs, InferenceError> {
        let _turn = self.gate.enter();

        let input_value = ort::value::Tensor::from_array(input).map_err(runtime)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Poisoned)?;
        let outputs = session.run(ort::inputs![input_value]).map_err(runtime)?;
        if outputs.len() == 0 {
            return Err(InferenceError::Output(format!(
                "{} produced no outputs",
                self.name
            )));
        }

        let mut tensors = Vec::with_capacity(outputs.len());
        for (i, name) in self.output_names.iter().enumerate().take(outputs.len()) {
            let array = outputs[i].try_extract_array::<f32>().map_err(runtime)?;
            tensors.push(NamedTensor {
                name: name.clone(),
                shape: array.shape().to_vec(),
                data: array.iter().copied().collect(),
            });
        }
        Ok(ModelOutputs::new(tensors))
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        self.input_size
    }
}

fn invalid(path: &Path, err: impl Display) -> LoadError {
    LoadError::Invalid {
        path: PathBuf::from(path),
        reason: err.to_string(),
    }
}

fn runtime(err: impl Display) -> InferenceError {
    InferenceError::Runtime(err.to_string())
}
