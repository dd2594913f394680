pub mod probe;
pub mod rename;
pub mod run;
