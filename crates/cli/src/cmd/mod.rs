mod init;
mod install;
mod platforms;

pub use init::cmd_init;
pub use install::cmd_install;
pub use platforms::cmd_platforms;
