pub mod boundary;
pub mod coefficients;
pub mod correction;
pub mod energy;
pub mod face_velocity;
pub mod field;
pub mod linear_solver;
pub mod mesh;
pub mod momentum;
pub mod pressure_correction;
pub mod properties;
