pub mod batch;
pub mod profiles;
