//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! table row and, where rows are created from outside the engine, a
//! `Deserialize` create DTO.

pub mod cart;
pub mod course;
pub mod enrollment;
pub mod event;
pub mod group;
pub mod order;
pub mod payment;
pub mod user;
