pub mod fakes;
#[cfg(test)]
pub mod mocks;
pub mod prepare_env;
