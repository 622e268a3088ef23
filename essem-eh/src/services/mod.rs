//! External collaborators: broker transport and media repository client

pub mod rabbit;
pub mod repository;
