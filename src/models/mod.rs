pub mod job;
pub mod work;

pub use job::*;
pub use work::*;
