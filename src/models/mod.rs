// Value types shared by the request composer, the parsers and the client

pub mod resource;
pub mod urn;

pub use resource::{PropertyName, ResourceInfo};
pub use urn::{Urn, SEPARATOR};
