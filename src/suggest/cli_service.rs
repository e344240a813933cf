//! AI CLI連携モジュール
//!
//! 設定されたAI CLI（claude / codex / gemini）を子プロセスとして起動し、
//! 標準出力を1行ずつ進捗コールバックに流しながら応答全体を集める。
//!
//! - 1回の試行ごとにタイムアウト（プロセス終了待ちまで含む）
//! - 標準エラーは別タスクで読み切る
//! - 失敗時は `retry_delay * 2^(n-1)` 待って再試行
//! - 全試行が失敗したら `ServiceUnavailable`

use crate::ai_provider::AiProvider;
use crate::config::Config;
use crate::error::Result;
use menu_allergen_common::{Error as CommonError, SuggestionRequest, SuggestionService};
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// 1回の試行の失敗
#[derive(Debug)]
enum AttemptError {
    /// コマンドが存在しない（再試行しない）
    NotInstalled(String),
    Failed(String),
}

/// AI CLIによる提案サービス
///
/// 同期インターフェースの内側に current-thread ランタイムを持つ。
pub struct CliSuggestionService {
    provider: AiProvider,
    program: OsString,
    model: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    runtime: Runtime,
}

impl CliSuggestionService {
    pub fn new(provider: AiProvider, config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            provider,
            program: provider.command_name().into(),
            model: config.model().map(str::to_string),
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
            runtime,
        })
    }

    /// 実行ファイルを差し替える（引数の形式はプロバイダのまま）
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn provider(&self) -> AiProvider {
        self.provider
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    async fn request_with_retry(
        &self,
        prompt: &str,
        progress: &mut dyn FnMut(&str),
    ) -> std::result::Result<String, String> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            match self.run_once(prompt, progress).await {
                Ok(output) if !output.trim().is_empty() => {
                    info!("{} 応答受信 ({} chars)", self.provider.command_name(), output.len());
                    return Ok(output);
                }
                Ok(_) => last_error = "空の応答".to_string(),
                Err(AttemptError::NotInstalled(e)) => return Err(e),
                Err(AttemptError::Failed(e)) => last_error = e,
            }

            warn!(
                "提案リクエスト失敗 ({}/{}): {}",
                attempt, self.max_retries, last_error
            );
            if attempt < self.max_retries {
                let delay = backoff_delay(self.retry_delay, attempt);
                debug!("{:?} 待機して再試行", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(format!("{} ({}回試行)", last_error, self.max_retries))
    }

    async fn run_once(
        &self,
        prompt: &str,
        progress: &mut dyn FnMut(&str),
    ) -> std::result::Result<String, AttemptError> {
        let name = self.provider.command_name();
        let mut command = build_command(&self.program, self.provider, prompt, self.model.as_deref());
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AttemptError::NotInstalled(format!("{} CLIが見つかりません: {}", name, e))
            } else {
                AttemptError::Failed(format!("{} CLI実行エラー: {}", name, e))
            }
        })?;

        let (stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => return Err(AttemptError::Failed("標準出力を取得できません".into())),
        };

        // パイプが詰まらないよう標準エラーは並行して読む
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let attempt = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = String::new();
            while let Some(line) = lines.next_line().await? {
                progress(&line);
                collected.push_str(&line);
                collected.push('\n');
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((collected, status))
        };
        let result = tokio::time::timeout(self.timeout, attempt).await;

        let (collected, status) = match result {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                stderr_task.abort();
                return Err(AttemptError::Failed(format!("{} CLI出力エラー: {}", name, e)));
            }
            Err(_) => {
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(AttemptError::Failed(format!(
                    "タイムアウト ({}秒)",
                    self.timeout.as_secs()
                )));
            }
        };

        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            return Err(AttemptError::Failed(format!(
                "{} CLI failed (code {:?}): {}",
                name,
                status.code(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        stderr_task.abort();

        Ok(collected)
    }
}

impl SuggestionService for CliSuggestionService {
    fn request_suggestions(
        &self,
        request: &SuggestionRequest,
        progress: &mut dyn FnMut(&str),
    ) -> menu_allergen_common::Result<String> {
        debug!(
            "提案リクエスト: 食材 {}件 / アレルゲン {:?} / プロンプト {} chars",
            request.ingredients.len(),
            request.allergens,
            request.prompt.len()
        );

        self.runtime
            .block_on(self.request_with_retry(&request.prompt, progress))
            .map_err(CommonError::ServiceUnavailable)
    }
}

/// n回目（1始まり）の失敗後の待機時間
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

fn build_command(program: &OsString, provider: AiProvider, prompt: &str, model: Option<&str>) -> Command {
    // Windowsではcmd /c経由（改行はスペースに置換）
    #[cfg(windows)]
    let command = {
        let flat = prompt.replace('\n', " ").replace('"', "\\\"");
        let mut command = Command::new("cmd");
        command
            .arg("/c")
            .arg(program)
            .args(provider.prompt_args(&flat, model));
        command
    };

    #[cfg(not(windows))]
    let command = {
        let mut command = Command::new(program);
        command.args(provider.prompt_args(prompt, model));
        command
    };

    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_delay_zero_base() {
        assert_eq!(backoff_delay(Duration::ZERO, 5), Duration::ZERO);
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use menu_allergen_common::{normalize, IngredientTable};
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use tempfile::tempdir;

        /// シェルスクリプトで偽のAI CLIを作る
        fn fake_cli(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-claude");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn service(program: &Path, timeout_seconds: u64) -> CliSuggestionService {
            let config = Config {
                timeout_seconds,
                max_retries: 1,
                retry_delay_seconds: 0,
                ..Config::default()
            };
            CliSuggestionService::new(AiProvider::Claude, &config)
                .unwrap()
                .with_program(program)
        }

        fn request() -> SuggestionRequest {
            SuggestionRequest {
                ingredients: IngredientTable::from_texts(["Milk toast"]),
                allergens: vec!["Dairy".to_string()],
                custom_rules: Vec::new(),
                prompt: "prompt".to_string(),
            }
        }

        #[test]
        fn test_streams_stdout_while_stderr_is_large() {
            let dir = tempdir().unwrap();
            let program = fake_cli(
                dir.path(),
                r#"head -c 300000 /dev/zero | tr '\000' 'x' >&2
echo "Looking at the menu..."
echo "===JSON==="
echo '[{"id": "ing_1", "substitution": "Soy milk toast"}]'"#,
            );

            let mut chunks = Vec::new();
            let payload = service(&program, 20)
                .request_suggestions(&request(), &mut |chunk: &str| chunks.push(chunk.to_string()))
                .unwrap();

            assert_eq!(chunks[0], "Looking at the menu...");
            assert_eq!(chunks[1], "===JSON===");
            let map = normalize(&payload, &request().ingredients);
            assert_eq!(map.get("Milk toast").map(String::as_str), Some("Soy milk toast"));
        }

        #[test]
        fn test_child_that_keeps_running_times_out() {
            let dir = tempdir().unwrap();
            let program = fake_cli(dir.path(), "echo partial\nexec >&- 2>&-\nexec sleep 30");

            let started = std::time::Instant::now();
            let err = service(&program, 1)
                .request_suggestions(&request(), &mut |_| {})
                .unwrap_err();

            assert!(matches!(err, CommonError::ServiceUnavailable(_)));
            assert!(err.to_string().contains("タイムアウト"));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[test]
        fn test_failure_reports_stderr() {
            let dir = tempdir().unwrap();
            let program = fake_cli(dir.path(), "echo 'quota exceeded' >&2\nexit 2");

            let err = service(&program, 5)
                .request_suggestions(&request(), &mut |_| {})
                .unwrap_err();

            let message = err.to_string();
            assert!(message.contains("code Some(2)"));
            assert!(message.contains("quota exceeded"));
        }

        #[test]
        fn test_missing_program_is_not_retried() {
            let dir = tempdir().unwrap();
            let config = Config {
                max_retries: 3,
                retry_delay_seconds: 5,
                ..Config::default()
            };
            let service = CliSuggestionService::new(AiProvider::Gemini, &config)
                .unwrap()
                .with_program(dir.path().join("missing-cli"));

            let started = std::time::Instant::now();
            let err = service.request_suggestions(&request(), &mut |_| {}).unwrap_err();
            assert!(err.to_string().contains("見つかりません"));
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }
}
