use crate::position::ChunkKey;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors observable at the engine's public API surface.
///
/// Most anomalies in the voxel pipeline are not errors at all: a build against
/// an unloaded chunk is deferred, a mesh job finishing for an unloaded chunk is
/// discarded, and an out-of-range chunk reference from the server is logged and
/// ignored. Only violations of the engine's own calling contract surface here.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("chunk {0:?} referenced by build commit is out of the known world")]
    TransientDesync(ChunkKey),

    #[error("caller violated the engine's contract: {0}")]
    ContractViolation(&'static str),
}
