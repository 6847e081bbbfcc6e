extern crate log;

pub mod head;
pub mod r#struct;
pub mod table;
