//! Text-to-speech output

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::SpeechConfig;

/// Speech sink. `say` returns once the text has been spoken.
///
/// Failures are the implementation's to log; the robot carries on silently.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn say(&self, text: &str);
}

/// Speaks through the `espeak` command line synthesizer
#[derive(Debug, Clone)]
pub struct Espeak {
    program: String,
    speed: u32,
    voice: Option<String>,
}

impl Espeak {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            program: config.program.clone(),
            speed: config.speed,
            voice: config.voice.clone(),
        }
    }

    /// The text goes in on stdin so a reply starting with `-` is never an option
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-s").arg(self.speed.to_string());
        if let Some(voice) = &self.voice {
            command.arg("-v").arg(voice);
        }
        command
            .arg("--stdin")
            .stdin(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn speak(&self, text: &str) -> std::io::Result<ExitStatus> {
        let mut child = self.command().spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
        child.wait().await
    }
}

#[async_trait]
impl Synthesizer for Espeak {
    async fn say(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        info!(text, "speaking");
        match self.speak(text).await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(program = %self.program, %status, "speech synthesizer failed"),
            Err(e) => warn!(program = %self.program, error = %e, "failed to run speech synthesizer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let espeak = Espeak::from_config(&SpeechConfig {
            program: "espeak".to_string(),
            speed: 160,
            voice: Some("en+f3".to_string()),
        });

        let command = espeak.command();
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["-s", "160", "-v", "en+f3", "--stdin"]);
    }

    #[tokio::test]
    async fn test_text_is_written_to_stdin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let heard = dir.path().join("heard");
        let script = dir.path().join("fake-espeak");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > {0}.args\ncat > {0}\n", heard.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let espeak = Espeak::from_config(&SpeechConfig {
            program: script.display().to_string(),
            speed: 160,
            voice: None,
        });
        espeak.say("-w /tmp/out.wav hello").await;

        assert_eq!(
            std::fs::read_to_string(&heard).unwrap(),
            "-w /tmp/out.wav hello\n"
        );
        let args = std::fs::read_to_string(dir.path().join("heard.args")).unwrap();
        assert_eq!(args.trim(), "-s 160 --stdin");
    }

    #[tokio::test]
    async fn test_missing_program_does_not_panic() {
        let espeak = Espeak::from_config(&SpeechConfig {
            program: "/nonexistent/espeak".to_string(),
            ..SpeechConfig::default()
        });
        espeak.say("hello").await;
        espeak.say("   ").await;
    }
}
