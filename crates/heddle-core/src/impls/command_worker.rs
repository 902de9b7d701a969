//! CommandWorker - 子プロセスとしてタスクを実行
//!
//! `program args... <task name>` を起動し、stdout を 1 行ずつ OutputSink に流す。
//! タスク名は環境変数 `HEDDLE_TASK` にも入れる。
//! 終了コード 0 なら成功、それ以外は失敗（stderr も出力に含めるので、
//! 429 / overload の判定は stderr の内容でも効く）。

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::WorkerError;
use crate::domain::task::Task;
use crate::observer::OutputSink;
use crate::ports::{Worker, WorkerOutput};

pub const TASK_ENV_VAR: &str = "HEDDLE_TASK";

#[derive(Debug, Clone)]
pub struct CommandWorker {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandWorker {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn run(&self, task: &Task, output: &OutputSink) -> Result<WorkerOutput, WorkerError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(task.name())
            .env(TASK_ENV_VAR, task.name())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(task = task.name(), "spawning worker process: {:?}", cmd);
        let mut child = cmd.spawn().map_err(WorkerError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Crashed("stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| WorkerError::Crashed("stderr not captured".into()))?;

        // output is decoded lossily; only the exit status decides success
        let read_stdout = async {
            let mut collected = String::new();
            let mut reader = BufReader::new(stdout);
            let mut raw = Vec::new();
            while reader.read_until(b'\n', &mut raw).await? > 0 {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches(['\n', '\r']);
                output.line(line);
                collected.push_str(line);
                collected.push('\n');
                raw.clear();
            }
            Ok::<_, std::io::Error>(collected)
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        };

        let (stdout_text, stderr_text) = tokio::try_join!(read_stdout, read_stderr)?;
        let status = child.wait().await?;

        let mut text = stdout_text;
        for line in stderr_text.lines() {
            output.line(line);
            text.push_str(line);
            text.push('\n');
        }
        if !status.success() {
            text.push_str(&format!("process exited with {status}\n"));
        }

        Ok(WorkerOutput {
            success: status.success(),
            output: text,
        })
    }
}
