//! Error types for the graphics crate.

use std::fmt;

// ============================================================================
// Graph integrity errors
// ============================================================================

/// Integrity errors raised while building, compiling, or executing the frame
/// graph.
///
/// Every variant is a programming error in pipeline or feature code, not a
/// runtime condition to retry: the frame that produced it is aborted (nothing
/// is submitted), the graph resets, and the next frame starts clean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A pass declared no reads and no writes. Such a pass can never
    /// contribute to the frame and always indicates a bug in the feature
    /// that added it.
    EmptyPass {
        /// Name of the offending pass.
        pass: String,
    },
    /// A resource handle outlived the resource it pointed to (transient
    /// handle kept across a frame boundary, or persistent handle used after
    /// release).
    StaleHandle {
        /// Slot index of the stale handle.
        index: u32,
        /// Generation the handle was created with.
        generation: u32,
    },
    /// `get_resource` on a registry entry nobody published.
    MissingResource {
        /// Type name of the missing entry.
        type_name: &'static str,
    },
    /// Transient aliasing placed two overlapping lifetimes in one physical
    /// slot. Internal invariant violation.
    AliasingViolation {
        /// Physical slot both resources were assigned to.
        physical: u32,
        /// Name of the first pass using the slot.
        first: String,
        /// Name of the conflicting pass.
        second: String,
    },
    /// Release was called on a handle that is not a persistent resource.
    NotPersistent {
        /// Slot index of the handle.
        index: u32,
    },
    /// A pass mixed attachments of different sizes or layer counts.
    AttachmentMismatch {
        /// Name of the offending pass.
        pass: String,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPass { pass } => {
                write!(f, "pass '{pass}' declares no reads and no writes")
            }
            Self::StaleHandle { index, generation } => {
                write!(f, "stale resource handle (slot {index}, generation {generation})")
            }
            Self::MissingResource { type_name } => {
                write!(f, "no registry entry of type {type_name}")
            }
            Self::AliasingViolation { physical, first, second } => {
                write!(
                    f,
                    "aliasing placed overlapping lifetimes in physical slot {physical} \
                     (passes '{first}' and '{second}')"
                )
            }
            Self::NotPersistent { index } => {
                write!(f, "release of non-persistent resource (slot {index})")
            }
            Self::AttachmentMismatch { pass } => {
                write!(f, "pass '{pass}' mixes attachment sizes or layer counts")
            }
        }
    }
}

impl std::error::Error for GraphError {}

// ============================================================================
// Top-level errors
// ============================================================================

/// Top-level error type of the graphics crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A required shader or material lookup failed at pipeline construction.
    Configuration(String),
    /// Frame graph integrity error (see [`GraphError`]).
    Graph(GraphError),
    /// A fused native render pass was rejected against device limits. The
    /// frame still renders through the unfused fallback path.
    Validation(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Graph(error) => write!(f, "graph error: {error}"),
            Self::Validation(message) => write!(f, "native pass validation failed: {message}"),
        }
    }
}

impl std::error::Error for GraphicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(error) => Some(error),
            _ => None,
        }
    }
}

impl From<GraphError> for GraphicsError {
    fn from(error: GraphError) -> Self {
        Self::Graph(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let error = GraphError::EmptyPass { pass: "Draw Opaque".into() };
        assert!(error.to_string().contains("Draw Opaque"));

        let error = GraphError::MissingResource { type_name: "ViewData" };
        assert!(error.to_string().contains("ViewData"));

        let error = GraphicsError::Configuration("shader 'Hidden/Tonemap' not found".into());
        assert!(error.to_string().contains("Hidden/Tonemap"));
    }

    #[test]
    fn test_graph_error_wraps_into_graphics_error() {
        let error: GraphicsError = GraphError::NotPersistent { index: 3 }.into();
        assert!(matches!(error, GraphicsError::Graph(_)));
        assert!(std::error::Error::source(&error).is_some());
    }
}
