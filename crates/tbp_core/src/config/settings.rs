//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Optional knobs carry defaults; required fields default to empty and are
//! rejected by [`Settings::validate`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Working directory, staging and cache paths.
    #[serde(default)]
    pub paths: PathSettings,

    /// Remote file share holding the audio folders.
    #[serde(default)]
    pub share: ShareSettings,

    /// Spreadsheet listing the work items.
    #[serde(default)]
    pub sheet: SheetSettings,

    /// Cluster scheduler and job descriptor.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Version-control host receiving the outputs.
    #[serde(default)]
    pub git: GitSettings,

    /// Environment module loading.
    #[serde(default)]
    pub environment: EnvironmentSettings,

    /// Model and data preparation before submission.
    #[serde(default)]
    pub preparation: PreparationSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check required fields and value ranges.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        let mut require = |value: &str, field: &str| {
            if value.trim().is_empty() {
                problems.push(format!("{} is required", field));
            }
        };

        match self.share.backend {
            ShareBackend::Smbclient => {
                require(&self.share.server, "share.server");
                require(&self.share.share, "share.share");
                require(&self.share.username, "share.username");
            }
            ShareBackend::Mounted => {
                require(&self.share.mount_root, "share.mount_root");
            }
        }
        require(&self.sheet.url, "sheet.url");
        require(&self.git.owner, "git.owner");
        require(&self.git.repo, "git.repo");
        require(&self.git.username, "git.username");
        require(&self.git.branch_prefix, "git.branch_prefix");
        require(&self.git.default_branch, "git.default_branch");
        require(
            &self.scheduler.descriptor_template,
            "scheduler.descriptor_template",
        );

        if self.scheduler.poll_interval_secs == 0 {
            problems.push("scheduler.poll_interval_secs must be greater than 0".to_string());
        }
        if self.sheet.max_items == Some(0) {
            problems.push("sheet.max_items must be greater than 0 when set".to_string());
        }
        for (i, cmd) in self.preparation.commands.iter().enumerate() {
            if cmd.program.trim().is_empty() {
                problems.push(format!("preparation.commands[{}].program is required", i));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.working_dir)
    }

    /// `<working_dir>/<data_folder>`.
    pub fn data_dir(&self) -> PathBuf {
        self.working_dir().join(&self.paths.data_folder)
    }

    /// Input staging directory (fetched audio).
    pub fn input_dir(&self) -> PathBuf {
        self.data_dir().join(&self.paths.input_folder)
    }

    /// Output staging directory (transcription artifacts).
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir().join(&self.paths.output_folder)
    }

    pub fn cache_dir(&self) -> PathBuf {
        resolve_against(&self.working_dir(), &self.paths.cache_dir)
    }

    pub fn hf_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("huggingface")
    }

    pub fn nltk_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("nltk_data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        resolve_against(&self.working_dir(), &self.paths.logs_folder)
    }

    /// Location of the persistent repository clone.
    ///
    /// Defaults to a sibling of the working directory named after the
    /// repository, so clearing the staging tree never touches it.
    pub fn git_repo_path(&self) -> PathBuf {
        match &self.paths.git_repo_path {
            Some(path) if !path.trim().is_empty() => resolve_against(&self.working_dir(), path),
            _ => {
                let working = self.working_dir();
                let parent = working
                    .parent()
                    .map(Path::to_path_buf)
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| PathBuf::from(".."));
                parent.join(&self.git.repo)
            }
        }
    }

    pub fn descriptor_template_path(&self) -> PathBuf {
        resolve_against(&self.working_dir(), &self.scheduler.descriptor_template)
    }

    pub fn rendered_descriptor_path(&self) -> PathBuf {
        resolve_against(&self.working_dir(), &self.scheduler.rendered_descriptor)
    }
}

fn resolve_against(base: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Path configuration for the working tree, staging, cache and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root of the pipeline's own working tree.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Data folder under the working directory.
    #[serde(default = "default_data_folder")]
    pub data_folder: String,

    /// Input staging folder under the data folder.
    #[serde(default = "default_input_folder")]
    pub input_folder: String,

    /// Output staging folder under the data folder.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Persistent clone of the publish target. Must live outside the
    /// staging tree.
    #[serde(default)]
    pub git_repo_path: Option<String>,

    /// Model/data cache root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_working_dir() -> String {
    ".".to_string()
}

fn default_data_folder() -> String {
    "data".to_string()
}

fn default_input_folder() -> String {
    "oral_input".to_string()
}

fn default_output_folder() -> String {
    "oral_output".to_string()
}

fn default_cache_dir() -> String {
    ".cache".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_folder: default_data_folder(),
            input_folder: default_input_folder(),
            output_folder: default_output_folder(),
            git_repo_path: None,
            cache_dir: default_cache_dir(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// How the remote share is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareBackend {
    /// Drive the `smbclient` command line tool.
    #[default]
    Smbclient,
    /// The share is mounted locally (CIFS/GVFS).
    Mounted,
}

/// Remote file share settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSettings {
    #[serde(default)]
    pub backend: ShareBackend,

    /// SMB server host name.
    #[serde(default)]
    pub server: String,

    /// Share name on the server.
    #[serde(default)]
    pub share: String,

    /// Folder inside the share holding one sub-folder per work item.
    #[serde(default)]
    pub base_path: String,

    #[serde(default)]
    pub username: String,

    /// Optional workgroup/domain passed to smbclient.
    #[serde(default)]
    pub domain: Option<String>,

    /// Password. Usually left empty and taken from the environment or a
    /// prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Local mount point of the share (mounted backend only).
    #[serde(default)]
    pub mount_root: String,

    #[serde(default = "default_smbclient_binary")]
    pub smbclient_binary: String,
}

fn default_smbclient_binary() -> String {
    "smbclient".to_string()
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            backend: ShareBackend::default(),
            server: String::new(),
            share: String::new(),
            base_path: String::new(),
            username: String::new(),
            domain: None,
            password: None,
            mount_root: String::new(),
            smbclient_binary: default_smbclient_binary(),
        }
    }
}

/// Spreadsheet work-list settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSettings {
    /// Sheet URL (edit link or direct CSV export link).
    #[serde(default)]
    pub url: String,

    /// Column whose non-empty value marks a row as done.
    #[serde(default = "default_done_column")]
    pub done_column: String,

    /// Column holding the raw folder label.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Stop after this many unique work items.
    #[serde(default = "default_max_items")]
    pub max_items: Option<usize>,

    /// HTTP timeout for the CSV download.
    #[serde(default = "default_sheet_timeout")]
    pub timeout_secs: u64,
}

fn default_done_column() -> String {
    "Done".to_string()
}

fn default_id_column() -> String {
    "as".to_string()
}

fn default_max_items() -> Option<usize> {
    Some(20)
}

fn default_sheet_timeout() -> u64 {
    60
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            done_column: default_done_column(),
            id_column: default_id_column(),
            max_items: default_max_items(),
            timeout_secs: default_sheet_timeout(),
        }
    }
}

/// Whether publishing requires the compute job to have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishGate {
    /// Publish only when the job ended as `Completed`.
    #[default]
    CompletedOnly,
    /// Publish whatever the terminal status.
    Always,
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Job descriptor template with `{{KEY}}` placeholders.
    #[serde(default)]
    pub descriptor_template: String,

    /// Where the rendered descriptor is written before submission.
    #[serde(default = "default_rendered_descriptor")]
    pub rendered_descriptor: String,

    #[serde(default = "default_submit_binary")]
    pub submit_binary: String,

    #[serde(default = "default_queue_binary")]
    pub queue_binary: String,

    #[serde(default = "default_accounting_binary")]
    pub accounting_binary: String,

    /// Seconds between status checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub publish_gate: PublishGate,
}

fn default_rendered_descriptor() -> String {
    "run_job.slurm".to_string()
}

fn default_submit_binary() -> String {
    "sbatch".to_string()
}

fn default_queue_binary() -> String {
    "squeue".to_string()
}

fn default_accounting_binary() -> String {
    "sacct".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            descriptor_template: String::new(),
            rendered_descriptor: default_rendered_descriptor(),
            submit_binary: default_submit_binary(),
            queue_binary: default_queue_binary(),
            accounting_binary: default_accounting_binary(),
            poll_interval_secs: default_poll_interval(),
            publish_gate: PublishGate::default(),
        }
    }
}

/// Version-control host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSettings {
    #[serde(default = "default_git_host")]
    pub host: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default)]
    pub username: String,

    /// Access token. Usually left empty and taken from the environment or a
    /// prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    #[serde(default = "default_default_branch")]
    pub default_branch: String,

    #[serde(default = "default_git_binary")]
    pub binary: String,
}

fn default_git_host() -> String {
    "github.com".to_string()
}

fn default_branch_prefix() -> String {
    "upload".to_string()
}

fn default_default_branch() -> String {
    "main".to_string()
}

fn default_git_binary() -> String {
    "git".to_string()
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            host: default_git_host(),
            owner: String::new(),
            repo: String::new(),
            username: String::new(),
            token: None,
            branch_prefix: default_branch_prefix(),
            default_branch: default_default_branch(),
            binary: default_git_binary(),
        }
    }
}

/// Environment module loading (HPC `module load`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    /// Loader invocation, e.g. `["module", "load"]`.
    #[serde(default = "default_module_command")]
    pub module_command: Vec<String>,

    /// Modules appended to the loader invocation. Empty disables the step.
    #[serde(default)]
    pub modules: Vec<String>,
}

fn default_module_command() -> Vec<String> {
    vec!["module".to_string(), "load".to_string()]
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            module_command: default_module_command(),
            modules: Vec::new(),
        }
    }
}

/// A command run before submission (model or data download).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationCommand {
    /// Label used in logs.
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether a failure blocks the run. Soft prerequisites only warn.
    #[serde(default)]
    pub required: bool,
}

/// Model and data preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationSettings {
    /// Speech model name handed to the job template.
    #[serde(default = "default_model")]
    pub model: String,

    /// Alignment languages handed to the job template.
    #[serde(default = "default_alignment_languages")]
    pub alignment_languages: Vec<String>,

    #[serde(default)]
    pub commands: Vec<PreparationCommand>,
}

fn default_model() -> String {
    "large-v3".to_string()
}

fn default_alignment_languages() -> Vec<String> {
    ["en", "es", "fr", "de"].iter().map(|s| s.to_string()).collect()
}

impl Default for PreparationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            alignment_languages: default_alignment_languages(),
            commands: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// Keep command output in the tail buffer instead of echoing it.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of captured output lines shown after a failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Also write the process-wide trace to a daily log file.
    #[serde(default = "default_true")]
    pub file_logging: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            file_logging: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut s = Settings::default();
        s.share.server = "files.example.edu".into();
        s.share.share = "projects".into();
        s.share.username = "alice".into();
        s.sheet.url = "https://example.com/sheet.csv".into();
        s.git.owner = "lab".into();
        s.git.repo = "transcripts".into();
        s.git.username = "alice".into();
        s.scheduler.descriptor_template = "config/run.slurm".into();
        s
    }

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[scheduler]"));
        assert!(toml.contains("poll_interval_secs = 300"));
        assert!(!toml.contains("token"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[git]\nowner = \"lab\"\n[scheduler]\npublish_gate = \"always\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.git.owner, "lab");
        assert_eq!(parsed.git.branch_prefix, "upload");
        assert_eq!(parsed.scheduler.publish_gate, PublishGate::Always);
        assert_eq!(parsed.sheet.max_items, Some(20));
    }

    #[test]
    fn validate_lists_every_missing_field() {
        let problems = Settings::default().validate().unwrap_err();
        assert!(problems.iter().any(|p| p.contains("share.server")));
        assert!(problems.iter().any(|p| p.contains("sheet.url")));
        assert!(problems.iter().any(|p| p.contains("git.owner")));
        assert!(problems
            .iter()
            .any(|p| p.contains("scheduler.descriptor_template")));
    }

    #[test]
    fn validate_accepts_complete_settings() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn mounted_backend_requires_mount_root_only() {
        let mut s = valid_settings();
        s.share = ShareSettings {
            backend: ShareBackend::Mounted,
            ..ShareSettings::default()
        };
        let problems = s.validate().unwrap_err();
        assert_eq!(problems, vec!["share.mount_root is required".to_string()]);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut s = valid_settings();
        s.scheduler.poll_interval_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn staging_paths_derive_from_working_dir() {
        let mut s = valid_settings();
        s.paths.working_dir = "/srv/pipeline".into();
        assert_eq!(s.input_dir(), PathBuf::from("/srv/pipeline/data/oral_input"));
        assert_eq!(s.output_dir(), PathBuf::from("/srv/pipeline/data/oral_output"));
        assert_eq!(s.hf_cache_dir(), PathBuf::from("/srv/pipeline/.cache/huggingface"));
    }

    #[test]
    fn repo_clone_defaults_outside_working_dir() {
        let mut s = valid_settings();
        s.paths.working_dir = "/srv/pipeline".into();
        assert_eq!(s.git_repo_path(), PathBuf::from("/srv/transcripts"));

        s.paths.git_repo_path = Some("/scratch/clones/out".into());
        assert_eq!(s.git_repo_path(), PathBuf::from("/scratch/clones/out"));
    }
}
