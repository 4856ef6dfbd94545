//! External process invocation.
//!
//! Every external tool (scheduler CLI, git, smbclient, module loaders) is
//! invoked through a [`CommandRunner`] with an explicit argument vector.
//! Nothing in this crate builds a shell string.
//!
//! Arguments that carry credentials are added with
//! [`CommandSpec::secret_arg`] and are masked by [`CommandSpec::display`],
//! which is the only rendering used in logs and error messages.

mod runner;

#[cfg(test)]
pub(crate) mod test_support;

pub use runner::{
    run_captured, run_checked, CommandError, CommandOutput, CommandRunner, CommandSpec,
    ProcessCommandRunner,
};
