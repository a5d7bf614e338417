pub mod jenkins;
pub mod keycloak;
pub mod nexus;

pub use jenkins::*;
pub use keycloak::*;
pub use nexus::*;
