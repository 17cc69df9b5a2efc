mod finding;
mod pipeline;
mod result;
mod scan;
mod tool;

pub use finding::*;
pub use pipeline::*;
pub use result::*;
pub use scan::*;
pub use tool::*;
