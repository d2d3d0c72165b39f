use super::NewDirectoryUser;
use super::modules::DirectoryAdmin;
use crate::error::DirectoryError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

pub type RunFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandOutput, DirectoryError>> + Send + 'a>>;

/// Executes admin CLI invocations.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a>;
}

/// Spawns the admin CLI as a child process.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            let output = Command::new(program)
                .args(args)
                .stdin(std::process::Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| DirectoryError::Spawn {
                    program: program.to_string(),
                    message: e.to_string(),
                })?;

            Ok(CommandOutput {
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

/// Logs each command line instead of running it, and remembers it.
#[derive(Default)]
pub struct DryRunRunner {
    commands: Mutex<Vec<String>>,
}

impl DryRunRunner {
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for DryRunRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            let line = std::iter::once(program)
                .chain(args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::info!("[dry-run] {line}");
            if let Ok(mut commands) = self.commands.lock() {
                commands.push(line);
            }
            Ok(CommandOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        })
    }
}

/// Where and as whom a session connects.
#[derive(Debug, Clone, Copy)]
pub struct SessionTarget<'a> {
    pub program: &'a str,
    pub server: &'a str,
    pub admin_user: &'a str,
    pub domain: &'a str,
}

/// A connected admin session. Only obtainable inside [`with_session`].
#[derive(Clone, Copy)]
pub struct DirectorySession<'s> {
    runner: &'s dyn CommandRunner,
    admin: &'s dyn DirectoryAdmin,
    target: SessionTarget<'s>,
}

impl<'s> DirectorySession<'s> {
    async fn exec(&self, action: &str, args: Vec<String>) -> Result<CommandOutput, DirectoryError> {
        let output = self.runner.run(self.target.program, &args).await?;
        if output.status != 0 {
            return Err(DirectoryError::Command {
                program: self.target.program.to_string(),
                action: action.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    pub async fn create_user(&self, user: &NewDirectoryUser) -> Result<(), DirectoryError> {
        let args = self.admin.create_user(user, self.target.domain);
        self.exec("create-user", args).await?;
        tracing::info!(user = user.user_name.as_str(), "directory user created");
        Ok(())
    }

    pub async fn add_group_member(&self, group: &str, user_name: &str) -> Result<(), DirectoryError> {
        let args = self.admin.add_group_member(group, user_name, self.target.domain);
        self.exec("add-group-member", args).await?;
        tracing::info!(group, user = user_name, "added to group");
        Ok(())
    }

    /// Create the user and, when one is given, add it to its group.
    pub async fn onboard(&self, user: &NewDirectoryUser) -> Result<(), DirectoryError> {
        self.create_user(user).await?;
        if let Some(group) = &user.group {
            self.add_group_member(group, &user.user_name).await?;
        }
        Ok(())
    }
}

/// Connect, run `work`, and disconnect on every exit path once connected.
///
/// A failure from `work` takes precedence; a disconnect failure after failed
/// work is only logged.
pub async fn with_session<'s, T, F, Fut>(
    runner: &'s dyn CommandRunner,
    admin: &'s dyn DirectoryAdmin,
    target: SessionTarget<'s>,
    work: F,
) -> Result<T, DirectoryError>
where
    F: FnOnce(DirectorySession<'s>) -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    let session = DirectorySession {
        runner,
        admin,
        target,
    };

    session
        .exec("connect", admin.connect(target.server, target.admin_user))
        .await?;
    tracing::debug!(server = target.server, version = %admin.version(), "directory session opened");

    let result = work(session).await;
    let teardown = session
        .exec("disconnect", admin.disconnect(target.server))
        .await;

    match (result, teardown) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(teardown_err)) => {
            tracing::warn!(server = target.server, "disconnect after failure also failed: {teardown_err}");
            Err(e)
        }
    }
}
