pub mod assembler;
pub mod controller;
pub mod dispatcher;
pub mod orchestrator;
pub mod profile;
pub mod state;
pub mod status;

#[cfg(test)]
mod tests;
