// Registration algorithms: robust edge fits, coarse pre-rotation and ICP
pub mod coarse_rotation;
pub mod icp;
pub mod line_fit;
pub mod matcher;
pub mod rigid;

pub use coarse_rotation::*;
pub use icp::*;
pub use line_fit::*;
pub use matcher::*;
pub use rigid::*;
