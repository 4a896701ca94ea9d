//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct per table and the
//! `Deserialize` create DTOs used for inserts.

pub mod case;
pub mod ticket;
