//! Host environment detection for command-generation hints.
//!
//! Probes which flavour (GNU or BSD) of common file tools is installed and
//! which developer tools are on `PATH`, so the model can be told which syntax
//! will actually run here.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument};

use crate::io::process::run_command;

const COMMON_TOOLS: [&str; 9] = [
    "git", "curl", "wget", "docker", "kubectl", "npm", "python3", "go", "make",
];
const MAX_VERSION_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Gnu,
    Bsd,
}

/// Detected host facts. Built once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub shell: Option<String>,
    pub ls: Option<Flavor>,
    pub stat: Option<Flavor>,
    pub du: Option<Flavor>,
    pub find: Flavor,
    /// Tool name to first line of `--version` output (or `available`).
    pub tools: BTreeMap<String, String>,
}

impl SystemInfo {
    /// Facts that need no probing; every tool flavour is unknown.
    pub fn basic() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            shell: env::var("SHELL").ok().filter(|s| !s.is_empty()),
            ls: None,
            stat: None,
            du: None,
            find: Flavor::Bsd,
            tools: BTreeMap::new(),
        }
    }

    /// Probe the host.
    #[instrument(skip_all)]
    pub fn detect() -> Self {
        let mut info = Self::basic();
        if probe_output("ls", &["--version"])
            .is_some_and(|out| out.to_lowercase().contains("gnu"))
        {
            info.ls = Some(Flavor::Gnu);
        }
        info.stat = if probe_output("stat", &["-f", "%z", "/"]).is_some_and(|out| !out.is_empty())
        {
            Some(Flavor::Bsd)
        } else if probe_output("stat", &["-c", "%s", "/"]).is_some() {
            Some(Flavor::Gnu)
        } else {
            None
        };
        info.du = if probe_output("du", &["-b", "/dev/null"]).is_some() {
            Some(Flavor::Gnu)
        } else if probe_output("du", &["-h", "/dev/null"]).is_some() {
            Some(Flavor::Bsd)
        } else {
            None
        };
        info.find = if probe_output("find", &["/dev/null", "-printf", "%s"]).is_some() {
            Flavor::Gnu
        } else {
            Flavor::Bsd
        };
        for tool in COMMON_TOOLS {
            if !on_path(tool) {
                continue;
            }
            let version = probe_output(tool, &["--version"])
                .and_then(|out| out.lines().next().map(str::trim).map(str::to_string))
                .filter(|line| !line.is_empty())
                .map(|line| shorten(&line))
                .unwrap_or_else(|| "available".to_string());
            info.tools.insert(tool.to_string(), version);
        }
        debug!(os = %info.os, tools = info.tools.len(), "system detected");
        info
    }

    /// Syntax guidance lines for the command prompt.
    pub fn syntax_hints(&self) -> Vec<&'static str> {
        let mut hints = Vec::new();
        match self.stat {
            Some(Flavor::Bsd) => hints.push("Use 'stat -f %z file' for file size (BSD syntax)"),
            Some(Flavor::Gnu) => hints.push("Use 'stat -c %s file' for file size (GNU syntax)"),
            None => {}
        }
        match self.du {
            Some(Flavor::Bsd) => hints.push("Use 'du -h' for human-readable sizes (BSD syntax)"),
            Some(Flavor::Gnu) => {
                hints.push("Use 'du -b' for bytes or 'du -h' for human-readable (GNU syntax)");
            }
            None => {}
        }
        hints.push(match self.find {
            Flavor::Gnu => "Use 'find ... -printf %s' for file sizes (GNU syntax)",
            Flavor::Bsd => "Use 'find ... -exec stat ...' for file operations (BSD syntax)",
        });
        hints.push(if self.ls == Some(Flavor::Gnu) {
            "Use 'ls --sort=size' or 'ls -S' for size sorting (GNU)"
        } else {
            "Use 'ls -lS' for size sorting (BSD)"
        });
        hints
    }

    /// Commands the model may run to learn more about the host.
    pub fn detection_commands(&self) -> Vec<&'static str> {
        let mut commands = vec!["uname -a"];
        match self.os.as_str() {
            "macos" => commands.push("sw_vers"),
            "linux" => commands.push("lsb_release -a 2>/dev/null || cat /etc/os-release | head -5"),
            _ => {}
        }
        commands
    }

    /// Example reply for "show file size in bytes", when the stat flavour is known.
    pub fn file_size_example(&self) -> Option<&'static str> {
        match self.stat? {
            Flavor::Bsd => Some("stat -f %z filename"),
            Flavor::Gnu => Some("stat -c %s filename"),
        }
    }
}

/// Combined output of a successful probe, `None` on spawn failure or non-zero exit.
fn probe_output(program: &str, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    let output = run_command(cmd, None).ok()?;
    if !output.status.success() {
        return None;
    }
    let mut text = output.stdout_lossy();
    text.push_str(&output.stderr_lossy());
    Some(text)
}

fn on_path(program: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| is_file(&dir.join(program)))
}

fn is_file(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.is_file())
}

fn shorten(line: &str) -> String {
    if line.chars().count() <= MAX_VERSION_LEN {
        return line.to_string();
    }
    let head: String = line.chars().take(MAX_VERSION_LEN).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_follow_detected_flavours() {
        let info = SystemInfo {
            stat: Some(Flavor::Gnu),
            du: Some(Flavor::Gnu),
            find: Flavor::Gnu,
            ls: Some(Flavor::Gnu),
            ..SystemInfo::basic()
        };
        let hints = info.syntax_hints();
        assert!(hints.iter().any(|h| h.contains("stat -c %s")));
        assert!(hints.iter().any(|h| h.contains("-printf")));
        assert_eq!(info.file_size_example(), Some("stat -c %s filename"));
    }

    #[test]
    fn unknown_flavours_fall_back_to_bsd_hints() {
        let info = SystemInfo::basic();
        let hints = info.syntax_hints();
        assert!(hints.iter().any(|h| h.contains("ls -lS")));
        assert!(!hints.iter().any(|h| h.contains("stat")));
        assert_eq!(info.file_size_example(), None);
    }

    #[test]
    fn detection_commands_start_with_uname() {
        let info = SystemInfo {
            os: "linux".to_string(),
            ..SystemInfo::basic()
        };
        assert_eq!(info.detection_commands()[0], "uname -a");
        assert_eq!(info.detection_commands().len(), 2);
    }

    #[test]
    fn long_versions_are_shortened() {
        let line = "x".repeat(80);
        assert_eq!(shorten(&line).chars().count(), MAX_VERSION_LEN + 3);
        assert_eq!(shorten("git version 2.43.0"), "git version 2.43.0");
    }

    #[test]
    fn detect_reports_the_finder_flavour() {
        let info = SystemInfo::detect();
        assert!(!info.os.is_empty());
        assert!(!info.syntax_hints().is_empty());
    }
}
