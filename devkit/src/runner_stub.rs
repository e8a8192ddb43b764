/*!
Stub CommandRunner pour tests sans exécuter de processus

Chaque règle associe un préfixe de ligne de commande (ou un marqueur contenu
dans le script exécuté) à une réponse. Toutes les invocations sont enregistrées.
*/

use async_trait::async_trait;
use golem_host::execution::{render_command, BackgroundProcess, CommandError, CommandOutput, CommandRunner};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Réponse simulée d'une commande
#[derive(Debug, Clone)]
pub enum Reply {
    Ok { stdout: String },
    Fail { code: i32, stdout: String, stderr: String },
    NotFound,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Ok { stdout: stdout.to_string() }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Fail { code, stdout: String::new(), stderr: stderr.to_string() }
    }

    fn into_result(self, command: String) -> Result<CommandOutput, CommandError> {
        match self {
            Reply::Ok { stdout } => Ok(CommandOutput {
                command,
                exit_code: Some(0),
                stdout,
                ..Default::default()
            }),
            Reply::Fail { code, stdout, stderr } => Err(CommandError::Failed {
                command,
                exit_code: Some(code),
                stdout,
                stderr,
            }),
            Reply::NotFound => Err(CommandError::NotFound { command }),
        }
    }
}

/// Comportement simulé d'un lancement détaché
#[derive(Debug, Clone)]
pub enum Detached {
    /// Toujours en cours au moment du poll
    Running,
    /// Terminé avec ce code et cette sortie
    Exited { code: i32, output: String },
}

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(String),
    /// Le premier argument est un fichier dont le contenu contient ce texte
    Script(String),
}

#[derive(Debug, Clone)]
pub struct DetachedCall {
    pub command: String,
    pub log_path: PathBuf,
}

#[derive(Default)]
struct StubState {
    rules: Vec<(Matcher, Reply)>,
    detached: Vec<(String, Detached)>,
    calls: Vec<String>,
    detached_calls: Vec<DetachedCall>,
    script_paths: Vec<PathBuf>,
}

/// Runner scripté; les commandes sans règle répondent `NotFound`
#[derive(Clone, Default)]
pub struct StubRunner {
    state: Arc<Mutex<StubState>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute ou remplace la réponse pour un préfixe de commande
    pub fn on(&self, prefix: &str, reply: Reply) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.rules.retain(|(m, _)| !matches!(m, Matcher::Prefix(p) if p == prefix));
        state.rules.push((Matcher::Prefix(prefix.to_string()), reply));
        self
    }

    /// Réponse pour l'exécution d'un script dont le contenu contient `marker`
    pub fn on_script(&self, marker: &str, reply: Reply) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.rules.retain(|(m, _)| !matches!(m, Matcher::Script(s) if s == marker));
        state.rules.push((Matcher::Script(marker.to_string()), reply));
        self
    }

    pub fn on_detached(&self, prefix: &str, behaviour: Detached) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.detached.retain(|(p, _)| p != prefix);
        state.detached.push((prefix.to_string(), behaviour));
        self
    }

    /// Toutes les lignes de commande exécutées, dans l'ordre
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    pub fn detached_calls(&self) -> Vec<DetachedCall> {
        self.state.lock().unwrap().detached_calls.clone()
    }

    /// Fichiers passés en premier argument qui existaient au moment de l'appel
    pub fn script_paths(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().script_paths.clone()
    }

    fn record_script(&self, args: &[String]) -> Option<String> {
        let path = Path::new(args.first()?);
        let contents = std::fs::read_to_string(path).ok()?;
        self.state.lock().unwrap().script_paths.push(path.to_path_buf());
        Some(contents)
    }

    /// Les règles de script passent avant les préfixes
    fn reply_for(&self, command: &str, script: Option<&str>) -> Reply {
        let state = self.state.lock().unwrap();
        let by_script = state.rules.iter().find(|(matcher, _)| match matcher {
            Matcher::Script(marker) => script.is_some_and(|s| s.contains(marker.as_str())),
            Matcher::Prefix(_) => false,
        });
        let by_prefix = || {
            state.rules.iter().find(|(matcher, _)| match matcher {
                Matcher::Prefix(prefix) => command.starts_with(prefix.as_str()),
                Matcher::Script(_) => false,
            })
        };

        by_script
            .or_else(by_prefix)
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::NotFound)
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let command = render_command(program, args);
        let script = self.record_script(args);
        self.state.lock().unwrap().calls.push(command.clone());
        tracing::debug!("[STUB] {}", command);

        self.reply_for(&command, script.as_deref()).into_result(command)
    }

    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        log_path: &Path,
    ) -> Result<Box<dyn BackgroundProcess>, CommandError> {
        let command = render_command(program, args);
        self.record_script(args);

        let mut state = self.state.lock().unwrap();
        state.calls.push(command.clone());
        state.detached_calls.push(DetachedCall {
            command: command.clone(),
            log_path: log_path.to_path_buf(),
        });

        let behaviour = state
            .detached
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, b)| b.clone());

        match behaviour {
            Some(behaviour) => Ok(Box::new(StubProcess { command, behaviour })),
            None => Err(CommandError::NotFound { command }),
        }
    }
}

struct StubProcess {
    command: String,
    behaviour: Detached,
}

#[async_trait]
impl BackgroundProcess for StubProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn poll_exit(&mut self) -> Result<Option<CommandOutput>, CommandError> {
        match &self.behaviour {
            Detached::Running => Ok(None),
            Detached::Exited { code, output } => Ok(Some(CommandOutput {
                command: self.command.clone(),
                exit_code: Some(*code),
                stdout: output.clone(),
                ..Default::default()
            })),
        }
    }
}
