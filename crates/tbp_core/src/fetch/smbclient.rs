//! Share access through the `smbclient` command line tool.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::share::{RemoteEntry, RemoteShare, ShareError, ShareResult};
use crate::config::{Secret, ShareSettings};
use crate::process::{run_captured, CommandOutput, CommandRunner, CommandSpec};

/// `  name   D   0  Mon Jan  1 10:00:00 2024`
static LS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(.+?)\s+([A-Z]+)\s+(\d+)\s+\w{3} \w{3}\s+\d{1,2} \d{2}:\d{2}:\d{2} \d{4}\s*$")
        .expect("ls pattern is valid")
});

static NT_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NT_STATUS_[A-Z_]+").expect("status pattern is valid"));

const NOT_FOUND_STATUSES: &[&str] = &[
    "NT_STATUS_OBJECT_NAME_NOT_FOUND",
    "NT_STATUS_OBJECT_PATH_NOT_FOUND",
    "NT_STATUS_NO_SUCH_FILE",
    "NT_STATUS_NOT_FOUND",
];

/// Drives `smbclient //server/share -c <command>`.
///
/// The password travels in the child's `PASSWD` environment variable and is
/// never placed on the command line.
pub struct SmbClientShare {
    binary: String,
    service: String,
    username: String,
    domain: Option<String>,
    password: Secret,
    runner: Arc<dyn CommandRunner>,
}

impl SmbClientShare {
    pub fn new(settings: &ShareSettings, password: Secret, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: settings.smbclient_binary.clone(),
            service: format!("//{}/{}", settings.server, settings.share),
            username: settings.username.clone(),
            domain: settings.domain.clone().filter(|d| !d.trim().is_empty()),
            password,
            runner,
        }
    }

    fn command(&self, script: String) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.binary)
            .arg(&self.service)
            .args(["-U", self.username.as_str()]);
        if let Some(domain) = &self.domain {
            spec = spec.args(["-W", domain.as_str()]);
        }
        spec.arg("-c")
            .arg(script)
            .env("PASSWD", self.password.expose())
    }

    fn run(&self, remote: &str, script: String) -> ShareResult<CommandOutput> {
        let spec = self.command(script);
        let output = run_captured(self.runner.as_ref(), &spec)
            .map_err(|e| ShareError::transport(remote, e.to_string()))?;

        // smbclient can exit 0 after a failed `-c` command, so the status
        // text decides.
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        if let Some(status) = NT_STATUS.find(&combined) {
            let status = status.as_str();
            if NOT_FOUND_STATUSES.contains(&status) {
                return Err(ShareError::NotFound(remote.to_string()));
            }
            return Err(ShareError::transport(remote, status));
        }
        if !output.success() {
            return Err(ShareError::transport(remote, output.detail()));
        }
        Ok(output)
    }
}

/// Quote a path for an smbclient command script. Backslash separators are
/// what the server expects.
fn quote(path: &str) -> String {
    format!("\"{}\"", path.replace('/', "\\").replace('"', ""))
}

/// Parse the output of smbclient's `ls`.
pub(crate) fn parse_listing(stdout: &str) -> Vec<RemoteEntry> {
    stdout
        .lines()
        .filter_map(|line| LS_LINE.captures(line))
        .filter_map(|caps| {
            let name = caps[1].to_string();
            if name == "." || name == ".." {
                return None;
            }
            Some(RemoteEntry {
                name,
                is_dir: caps[2].contains('D'),
            })
        })
        .collect()
}

impl RemoteShare for SmbClientShare {
    fn list_dir(&self, remote: &str) -> ShareResult<Vec<RemoteEntry>> {
        let script = format!("cd {}; ls", quote(remote));
        let output = self.run(remote, script)?;
        Ok(parse_listing(&output.stdout))
    }

    fn copy_file(&self, remote: &str, local: &Path) -> ShareResult<()> {
        let script = format!(
            "get {} \"{}\"",
            quote(remote),
            local.display().to_string().replace('"', "")
        );
        self.run(remote, script)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::{ok, output, StubRunner};

    const LISTING: &str = "\
  .                                   D        0  Mon Jan  1 10:00:00 2024
  ..                                  D        0  Mon Jan  1 10:00:00 2024
  tape side A.wav                     A  1234567  Tue Feb 13 09:05:11 2024
  extras                              D        0  Tue Feb 13 09:05:11 2024

\t\t51175 blocks of size 4194304. 19000 blocks available
";

    fn settings() -> ShareSettings {
        ShareSettings {
            server: "files.example.edu".into(),
            share: "oral".into(),
            username: "alice".into(),
            ..ShareSettings::default()
        }
    }

    #[test]
    fn parses_listing_without_dot_entries() {
        assert_eq!(
            parse_listing(LISTING),
            vec![
                RemoteEntry::file("tape side A.wav"),
                RemoteEntry::dir("extras")
            ]
        );
    }

    #[test]
    fn password_goes_through_environment_only() {
        let runner = Arc::new(StubRunner::with_results(vec![ok(LISTING)]));
        let share = SmbClientShare::new(&settings(), Secret::new("hunter2"), runner.clone());

        share.list_dir("Audio/12-34").unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let rendered = calls[0].display();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("//files.example.edu/oral"));
        assert!(rendered.contains("cd \"Audio\\12-34\"; ls"));
        assert!(calls[0]
            .envs()
            .iter()
            .any(|(k, v)| k == "PASSWD" && v == "hunter2"));
    }

    #[test]
    fn missing_folder_maps_to_not_found() {
        let runner = Arc::new(StubRunner::with_results(vec![Ok(output(
            1,
            "",
            "cd \\Audio\\99-99\\: NT_STATUS_OBJECT_NAME_NOT_FOUND",
        ))]));
        let share = SmbClientShare::new(&settings(), Secret::new("pw"), runner);

        assert!(matches!(
            share.list_dir("Audio/99-99"),
            Err(ShareError::NotFound(_))
        ));
    }

    #[test]
    fn status_on_success_exit_is_still_an_error() {
        let runner = Arc::new(StubRunner::with_results(vec![ok(
            "NT_STATUS_ACCESS_DENIED opening remote file",
        )]));
        let share = SmbClientShare::new(&settings(), Secret::new("pw"), runner);

        let err = share
            .copy_file("Audio/1-2/a.wav", Path::new("/tmp/a.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("NT_STATUS_ACCESS_DENIED"));
    }

    #[test]
    fn missing_binary_is_transport_error() {
        let runner = Arc::new(StubRunner::with_results(vec![Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no smbclient",
        ))]));
        let share = SmbClientShare::new(&settings(), Secret::new("pw"), runner);

        let err = share.list_dir("x").unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
