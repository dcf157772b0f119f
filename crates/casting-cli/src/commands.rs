pub mod evaluators;
pub mod generate;
pub mod search;
