// core.rs splits responsibilities into submodules: proof-of-work, block
// construction, chain state and the validation rules the chain applies.
pub mod block;
pub mod chain;
pub mod pow;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use pow::*;
pub use validation::*;
