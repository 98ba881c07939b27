pub mod body_angles;
pub mod contour;
pub mod curvature;
pub mod frame;
pub mod geometry;
pub mod head_tail;
pub mod history;
pub mod kinematics;
pub mod report;
pub mod skeleton;
pub mod spectral;
pub mod threshold;
pub mod utils;
pub mod world;
