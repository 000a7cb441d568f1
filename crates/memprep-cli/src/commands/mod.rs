pub mod cache;
pub mod prepare;
pub mod run;
