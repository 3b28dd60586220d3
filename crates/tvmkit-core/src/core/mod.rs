//! Cross-cutting runtime primitives and host collaborator interfaces

pub mod cancel;
pub mod collaborators;
