mod icp_params;
pub use icp_params::IcpParams;
mod cost_function;
mod icp;
pub use icp::{Icp, RegistrationResult, Termination};
