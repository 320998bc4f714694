//! Demo drivers shipped with the binary.

pub mod random;
pub mod template;

pub use random::RandomDriver;
pub use template::TemplateDriver;
