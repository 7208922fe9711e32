pub mod init;
pub mod paths;
pub mod send;
