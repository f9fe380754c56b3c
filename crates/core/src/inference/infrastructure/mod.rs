pub mod fair_gate;
pub mod model_resolver;
pub mod onnx_model;
