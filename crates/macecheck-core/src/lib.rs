pub mod artifact;
pub mod backend;
pub mod dump;
pub mod layout;
pub mod runner;
pub mod similarity;
pub mod spec;
pub mod tensor;
pub mod validate;

pub use artifact::*;
pub use backend::*;
pub use layout::*;
pub use similarity::*;
pub use spec::*;
pub use tensor::*;
pub use validate::*;
