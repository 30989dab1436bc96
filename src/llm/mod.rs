pub mod compatible;
pub mod factory;
pub mod model;
pub mod structured;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use factory::{ModelFactory, WorkflowModels, split_model_spec};
pub use model::ChatModel;
pub use traits::Provider;
