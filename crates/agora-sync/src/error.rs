//! Failure taxonomy for coordinated mutations.

use thiserror::Error;

/// Why a mutation was rejected.
///
/// Duplicate-unique conflicts on toggle mutations never surface here: the
/// coordinator resolves them as the inverse toggle effect. A publish that
/// finds no live recipients is likewise not an error anywhere in this crate.
#[derive(Debug, Error)]
pub enum MutationError<E> {
  /// Malformed payload; surfaced to the caller, never retried.
  #[error("validation failed: {0}")]
  Validation(String),

  /// The acting user does not own the resource being edited or deleted.
  #[error("not the resource owner")]
  Unauthorized,

  /// The target id does not resolve. Clients should drop the entity from
  /// their projections.
  #[error("target not found")]
  NotFound,

  /// The fact store failed for a reason other than a uniqueness conflict.
  #[error("store error: {0}")]
  Store(#[source] E),
}

pub type MutationResult<T, E> = Result<T, MutationError<E>>;
