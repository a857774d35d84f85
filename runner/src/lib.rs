pub mod args;
pub mod cases;
pub mod run;
pub mod table;
