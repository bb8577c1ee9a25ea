pub mod audit;
pub mod check_full_coverage;
pub mod check_tested;
pub mod check_used;
pub mod resolve;
