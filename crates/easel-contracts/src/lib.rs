mod catalog;
mod errors;
mod generation;

pub use catalog::{
    Catalog, Channel, ChannelType, ImageModel, ModelDirectory, ModelFeatures, ResolutionTable,
    ResolvedTarget,
};
pub use errors::GenerateError;
pub use generation::{GenerateRequest, GenerateResult, ReferenceImage, ResultKind};
