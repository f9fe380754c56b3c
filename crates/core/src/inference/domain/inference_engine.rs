use ndarray::Array4;

use crate::shared::error::InferenceError;

/// One model output, flattened in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// All outputs of a single model run, in model declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelOutputs {
    tensors: Vec<NamedTensor>,
}

impl ModelOutputs {
    pub fn new(tensors: Vec<NamedTensor>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn first(&self) -> Option<&NamedTensor> {
        self.tensors.first()
    }

    pub fn by_name(&self, name: &str) -> Option<&NamedTensor> {
        self.tensors.iter().find(|t| t.name == name)
    }
}

/// A loaded model that turns one NCHW float tensor into named outputs.
///
/// Implementations are shared between request handlers and the camera
/// loop, so `infer` takes `&self` and must serialize access internally.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, input: Array4<f32>) -> Result<ModelOutputs, InferenceError>;

    /// Fixed `(height, width)` the model was exported with, if any.
    fn input_size(&self) -> Option<(u32, u32)> {
        None
    }
}
