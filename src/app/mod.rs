mod input;
mod runtime;

pub use input::InputSource;
pub use runtime::{run, run_with_output, OutputFormat};
