pub mod constraint_evaluator;
pub mod input_stager;
pub mod model_guard;
pub mod result_decoder;

pub use constraint_evaluator::ConstraintEvaluator;
pub use input_stager::InputStager;
pub use model_guard::ModelGuard;
pub use result_decoder::ResultDecoder;
