pub mod concepts;
pub mod error;
pub mod traits;
pub mod text;
pub mod types;
pub mod validate;

pub use concepts::*;
pub use error::*;
pub use traits::*;
pub use types::*;
