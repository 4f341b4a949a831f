//! Git command lines run through a [CommandRunner](crate::process::CommandRunner).

use std::path::Path;

use crate::process::Cmd;
use crate::version::Version;

/// The release sequence: stage tracked changes, commit, push, tag, push the tag.
pub fn release_commands(version: &Version, cwd: Option<&Path>) -> Vec<Cmd> {
    let tag = version.to_string();
    let message = format!("Release {}", tag);
    let commands = vec![
        Cmd::new("git").args(["add", "-u"]),
        Cmd::new("git").args(["commit", "-m", message.as_str()]),
        Cmd::new("git").arg("push"),
        Cmd::new("git").args(["tag", tag.as_str()]),
        Cmd::new("git").args(["push", "origin", tag.as_str()]),
    ];

    match cwd {
        Some(dir) => commands.into_iter().map(|c| c.cwd(dir)).collect(),
        None => commands,
    }
}

pub fn switch(branch: &str) -> Cmd {
    Cmd::new("git").args(["switch", branch])
}

/// Shallow, recursive clone of a single branch.
pub fn shallow_clone(url: &str, branch: &str, target_dir: &str) -> Cmd {
    Cmd::new("git").args([
        "clone",
        "-b",
        branch,
        "--depth",
        "1",
        "--recursive",
        "--shallow-submodules",
        url,
        target_dir,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_commands_order() {
        let version = Version::parse("0.4.1").unwrap();
        let lines: Vec<String> = release_commands(&version, None)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "git add -u",
                "git commit -m 'Release 0.4.1'",
                "git push",
                "git tag 0.4.1",
                "git push origin 0.4.1",
            ]
        );
    }

    #[test]
    fn test_release_commands_with_cwd() {
        let version = Version::parse("0.4.1").unwrap();
        let commands = release_commands(&version, Some(Path::new("../companion")));
        assert!(commands
            .iter()
            .all(|c| c.cwd.as_deref() == Some(Path::new("../companion"))));
    }
}
