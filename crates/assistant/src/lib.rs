//! Assistant streaming runtime: upstream completion client, event mapping,
//! partial JSON reconstruction, and the per-turn stream transformer.

pub mod dispatch;
pub mod error;
pub mod mapper;
pub mod partial;
pub mod transformer;
pub mod upstream;

pub use {
    dispatch::{DispatchState, TurnContext},
    error::{Error, Result},
    mapper::MappedFrame,
    transformer::StreamTransformer,
    upstream::{CompletionClient, CompletionRequest, UpstreamEvent},
};
