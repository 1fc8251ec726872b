//! REST surfaces of the remote services, one module per service root.
//!
//! Each module pairs thin endpoint wrappers with the wire types they
//! exchange. Field names are camelCase on the wire.

pub mod catalog;
pub mod data_proxy;
pub mod path;
pub mod schema;
pub mod sql;
