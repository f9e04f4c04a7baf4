pub mod console;
pub mod dummy;
pub mod email;
pub mod log_file;
pub mod sqlite;
