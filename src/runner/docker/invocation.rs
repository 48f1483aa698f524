//! `docker run` argument construction

use std::collections::BTreeMap;
use std::path::Path;

use uuid::Uuid;

use crate::constants::{
    CONTAINER_IO_DIR, INPUT_FILE_NAME, INPUT_PATH_ENV, OUTPUT_FILE_NAME, OUTPUT_PATH_ENV,
    SCRATCH_PREFIX,
};
use crate::runner::config::DockerRunnerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    Stdio { stdin: bool },
    Pty,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DockerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub container_name: String,
}

impl DockerInvocation {
    pub(crate) fn build(
        binary: &str,
        config: &DockerRunnerConfig,
        scratch: &Path,
        transport: Transport,
    ) -> Self {
        let container_name = format!("{}{}", SCRATCH_PREFIX, Uuid::new_v4().simple());
        Self::build_named(binary, config, scratch, transport, container_name)
    }

    /// Same as [`Self::build`] with a caller-chosen container name
    pub(crate) fn build_named(
        binary: &str,
        config: &DockerRunnerConfig,
        scratch: &Path,
        transport: Transport,
        container_name: String,
    ) -> Self {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            container_name.clone(),
        ];

        match transport {
            Transport::Stdio { stdin: true } => args.push("-i".into()),
            Transport::Stdio { stdin: false } => {}
            Transport::Pty => args.push("-t".into()),
        }

        args.push("--network".into());
        args.push(config.network.as_str().into());

        if let Some(platform) = &config.platform {
            args.push("--platform".into());
            args.push(platform.clone());
        }

        args.push("-v".into());
        args.push(format!("{}:{}", scratch.display(), CONTAINER_IO_DIR));
        for volume in &config.volumes {
            args.push("-v".into());
            args.push(volume.to_arg());
        }

        let mut env: BTreeMap<&str, String> = config
            .env
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        env.insert(
            INPUT_PATH_ENV,
            format!("{}/{}", CONTAINER_IO_DIR, INPUT_FILE_NAME),
        );
        env.insert(
            OUTPUT_PATH_ENV,
            format!("{}/{}", CONTAINER_IO_DIR, OUTPUT_FILE_NAME),
        );
        for (key, value) in env {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }

        if let Some(entrypoint) = &config.entrypoint {
            args.push("--entrypoint".into());
            args.push(entrypoint.clone());
        }

        args.push(config.image.clone());
        args.extend(config.command.iter().cloned());

        Self {
            program: binary.to_string(),
            args,
            container_name,
        }
    }

    /// Shell-style rendering for logs; env values are hidden
    pub(crate) fn display(&self) -> String {
        let mut out = self.program.clone();
        let mut hide_next = false;
        for arg in &self.args {
            out.push(' ');
            if hide_next {
                let key = arg.split('=').next().unwrap_or(arg);
                out.push_str(&format!("{}=…", key));
                hide_next = false;
                continue;
            }
            hide_next = arg == "-e";
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push_str(&format!("'{}'", arg.replace('\'', r"'\''")));
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::config::{NetworkMode, VolumeMount};
    use pretty_assertions::assert_eq;

    fn sample() -> DockerRunnerConfig {
        DockerRunnerConfig::new("alpine:3")
            .with_command(["sh", "-c", "echo hi"])
            .with_env("Z_LAST", "z")
            .with_env("A_FIRST", "a")
    }

    #[test]
    fn stdio_invocation_layout() {
        let inv = DockerInvocation::build_named(
            "docker",
            &sample().with_stdin_json(true),
            Path::new("/tmp/scratch"),
            Transport::Stdio { stdin: true },
            "component-run-x".into(),
        );

        assert_eq!(
            inv.args,
            vec![
                "run",
                "--rm",
                "--name",
                "component-run-x",
                "-i",
                "--network",
                "none",
                "-v",
                "/tmp/scratch:/component-io",
                "-e",
                "A_FIRST=a",
                "-e",
                "COMPONENT_INPUT_PATH=/component-io/input.json",
                "-e",
                "COMPONENT_OUTPUT_PATH=/component-io/output.json",
                "-e",
                "Z_LAST=z",
                "alpine:3",
                "sh",
                "-c",
                "echo hi",
            ]
        );
    }

    #[test]
    fn pty_invocation_with_extras() {
        let config = sample()
            .with_network(NetworkMode::Bridge)
            .with_platform("linux/amd64")
            .with_entrypoint("/bin/entry")
            .with_volume(VolumeMount::new("/data", "/data").read_only());
        let inv = DockerInvocation::build(
            "podman",
            &config,
            Path::new("/s"),
            Transport::Pty,
        );

        assert_eq!(inv.program, "podman");
        assert!(inv.container_name.starts_with(SCRATCH_PREFIX));
        assert!(inv.args.contains(&"-t".to_string()));
        assert!(!inv.args.contains(&"-i".to_string()));
        let joined = inv.args.join(" ");
        assert!(joined.contains("--network bridge --platform linux/amd64"));
        assert!(joined.contains("-v /s:/component-io -v /data:/data:ro"));
        assert!(joined.contains("--entrypoint /bin/entry alpine:3 sh -c echo hi"));
    }

    #[test]
    fn injected_paths_override_user_env() {
        let config =
            DockerRunnerConfig::new("img").with_env(INPUT_PATH_ENV, "/elsewhere/input.json");
        let inv = DockerInvocation::build(
            "docker",
            &config,
            Path::new("/s"),
            Transport::Stdio { stdin: false },
        );
        assert!(inv
            .args
            .contains(&"COMPONENT_INPUT_PATH=/component-io/input.json".to_string()));
        assert!(!inv.args.iter().any(|a| a.contains("/elsewhere")));
    }

    #[test]
    fn display_hides_env_values() {
        let config = DockerRunnerConfig::new("img").with_env("API_TOKEN", "sk-123");
        let inv = DockerInvocation::build(
            "docker",
            &config,
            Path::new("/s"),
            Transport::Stdio { stdin: false },
        );
        let shown = inv.display();
        assert!(shown.contains("API_TOKEN=…"));
        assert!(!shown.contains("sk-123"));
    }
}
