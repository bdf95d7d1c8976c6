pub mod results;
pub mod scenarios;
