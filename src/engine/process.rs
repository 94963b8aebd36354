use std::process::Stdio;

use log::{debug, error, info, trace, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};
use vampirc_uci::{parse_one, UciInfoAttribute, UciMessage, UciOptionConfig};

use crate::error::{Error, Result};

use super::options;
use super::types::{Evaluation, GoMode, Score, HANDSHAKE_TIMEOUT, SHUTDOWN_GRACE};

/// Driver lifecycle. Fatal errors escalate shutdown and end in `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Handshaking,
    Configuring,
    Ready,
    Thinking,
    Quitting,
    Terminated,
}

impl DriverState {
    fn name(self) -> &'static str {
        match self {
            DriverState::Handshaking => "handshaking",
            DriverState::Configuring => "configuring",
            DriverState::Ready => "ready",
            DriverState::Thinking => "thinking",
            DriverState::Quitting => "quitting",
            DriverState::Terminated => "terminated",
        }
    }
}

/// A supervised UCI engine subprocess.
///
/// The driver owns both pipe ends exclusively and never issues a command
/// before consuming the terminator of the previous one (`uciok`, `readyok`,
/// `bestmove`), so every response attributes to exactly one command.
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    state: DriverState,
    name: String,
    options: Vec<UciOptionConfig>,
}

impl UciEngine {
    /// Spawns the engine process with piped stdin/stdout. `program` and
    /// `args` come straight from the repeated `--engine` flag.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("TERM", "dumb");

        let mut child = command.spawn()?;
        info!("started engine process: {program}");

        let stdin = child.stdin.take().ok_or(Error::NoStdin)?;
        let stdout = child.stdout.take().ok_or(Error::NoStdout)?;
        let lines = BufReader::new(stdout).lines();

        // Drain stderr so the engine cannot block on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[engine-stderr] {line}");
                }
            });
        }

        Ok(Self {
            child,
            stdin,
            lines,
            state: DriverState::Handshaking,
            name: String::new(),
            options: Vec::new(),
        })
    }

    /// Engine identity from the `id name` handshake line, empty before the
    /// handshake completes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option descriptors advertised during the handshake.
    pub fn options(&self) -> &[UciOptionConfig] {
        &self.options
    }

    /// Sends `uci` and collects identity and option descriptors until
    /// `uciok`, under a single wall-clock deadline.
    pub async fn handshake(&mut self) -> Result<()> {
        self.expect(DriverState::Handshaking)?;
        self.send("uci\n").await?;
        match timeout(HANDSHAKE_TIMEOUT, self.read_until_uciok()).await {
            Ok(result) => result?,
            Err(_) => {
                error!("timed out waiting for uciok");
                return Err(Error::HandshakeTimeout);
            }
        }
        info!("engine identified itself as \"{}\"", self.name);
        debug!("engine advertises {} options", self.options.len());
        self.transition(DriverState::Configuring);
        Ok(())
    }

    async fn read_until_uciok(&mut self) -> Result<()> {
        loop {
            let line = self.read_line().await?;
            match parse_one(&line) {
                UciMessage::Id { name: Some(name), .. } => {
                    debug!("engine name: {name}");
                    self.name = name;
                }
                UciMessage::Option(config) => {
                    trace!("engine option: {config:?}");
                    self.options.push(config);
                }
                UciMessage::UciOk => return Ok(()),
                _ => {}
            }
        }
    }

    /// Applies user settings against the advertised descriptors, then
    /// synchronizes with `isready`/`readyok`.
    pub async fn configure(&mut self, settings: &[(String, String)]) -> Result<()> {
        self.expect(DriverState::Configuring)?;
        for (name, value) in settings {
            if let Some(command) = options::setoption_command(&self.options, name, value) {
                self.send(&command).await?;
            }
        }
        self.send("isready\n").await?;
        match timeout(HANDSHAKE_TIMEOUT, self.read_until_readyok()).await {
            Ok(result) => result?,
            Err(_) => {
                error!("timed out waiting for readyok");
                return Err(Error::HandshakeTimeout);
            }
        }
        self.transition(DriverState::Ready);
        Ok(())
    }

    async fn read_until_readyok(&mut self) -> Result<()> {
        loop {
            if matches!(parse_one(&self.read_line().await?), UciMessage::ReadyOk) {
                return Ok(());
            }
        }
    }

    /// Runs one analysis cycle: `position fen …` then `go …`, harvesting
    /// info lines until `bestmove` closes the cycle. The engine's own limit
    /// bounds the cycle; losing the stream before `bestmove` is fatal.
    pub async fn evaluate(&mut self, fen: &str, go: GoMode) -> Result<Evaluation> {
        self.expect(DriverState::Ready)?;
        self.transition(DriverState::Thinking);
        self.send(&format!("position fen {fen}\n")).await?;
        self.send(&format!("{}\n", go.command())).await?;

        let mut harvest = GoHarvest::default();
        loop {
            let line = self.read_line().await?;
            match parse_one(&line) {
                UciMessage::Info(attributes) => harvest.ingest(&attributes),
                UciMessage::BestMove { best_move, .. } => {
                    self.transition(DriverState::Ready);
                    return Ok(harvest.finish(best_move.to_string()));
                }
                _ => {}
            }
        }
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        trace!("[gui] {}", command.trim_end());
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) => {
                trace!("[engine] {line}");
                Ok(line)
            }
            Ok(None) => Err(self.exit_error()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Recovers the child's exit status after its stdout closed on us.
    fn exit_error(&mut self) -> Error {
        self.state = DriverState::Terminated;
        let status = match self.child.try_wait() {
            Ok(Some(status)) => describe_exit(&status),
            Ok(None) => "stdout closed, process still running".to_string(),
            Err(e) => format!("unknown state: {e}"),
        };
        error!("engine exited unexpectedly: {status}");
        Error::EngineExited(status)
    }

    /// Tears the engine down: `quit`, then SIGTERM, SIGQUIT, and SIGKILL,
    /// each followed by a grace period, stopping at the first rung that
    /// finds the process gone.
    pub async fn shutdown(mut self) -> Result<()> {
        if self.state == DriverState::Terminated {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
            return Ok(());
        }
        self.transition(DriverState::Quitting);
        let _ = self.send("quit\n").await;
        if self.reaped().await {
            return Ok(());
        }

        #[cfg(unix)]
        for signal in [libc::SIGTERM, libc::SIGQUIT] {
            if let Some(pid) = self.child.id() {
                warn!("engine ignored quit, sending signal {signal}");
                unsafe {
                    libc::kill(pid as libc::pid_t, signal);
                }
            }
            if self.reaped().await {
                return Ok(());
            }
        }

        warn!("engine still alive, killing");
        let _ = self.child.start_kill();
        if self.reaped().await {
            return Ok(());
        }
        error!("engine survived the shutdown ladder");
        Err(Error::ShutdownFailed)
    }

    async fn reaped(&mut self) -> bool {
        if matches!(timeout(SHUTDOWN_GRACE, self.child.wait()).await, Ok(Ok(_))) {
            self.state = DriverState::Terminated;
            true
        } else {
            false
        }
    }

    fn expect(&self, expected: DriverState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    fn transition(&mut self, next: DriverState) {
        debug!("engine state: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}

fn describe_exit(status: &std::process::ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {signal}");
        }
    }
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "unknown exit status".to_string(),
    }
}

/// Running best record across one `go` cycle: a mate score supersedes and
/// permanently masks centipawns, the PV is overwritten by the latest one,
/// and info lines carrying bound markers are discarded whole.
#[derive(Debug, Default)]
pub(crate) struct GoHarvest {
    score: Option<Score>,
    mate_seen: bool,
    pv: Vec<String>,
    depth: u32,
}

impl GoHarvest {
    pub(crate) fn ingest(&mut self, attributes: &[UciInfoAttribute]) {
        let bounded = attributes.iter().any(|attribute| {
            matches!(
                attribute,
                UciInfoAttribute::Score { lower_bound: Some(true), .. }
                    | UciInfoAttribute::Score { upper_bound: Some(true), .. }
            )
        });
        if bounded {
            return;
        }
        for attribute in attributes {
            match attribute {
                UciInfoAttribute::Depth(depth) => self.depth = *depth as u32,
                UciInfoAttribute::Pv(moves) => {
                    self.pv = moves.iter().map(|m| m.to_string()).collect();
                }
                UciInfoAttribute::Score { cp, mate, .. } => {
                    if let Some(n) = mate {
                        self.score = Some(Score::Mate(*n as i32));
                        self.mate_seen = true;
                    } else if let Some(cp) = cp {
                        if !self.mate_seen {
                            self.score = Some(Score::Cp(*cp as i32));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    pub(crate) fn finish(self, bestmove: String) -> Evaluation {
        if self.score.is_none() {
            warn!("go cycle produced no score, assuming 0.00");
        }
        let best_move = self.pv.first().cloned().unwrap_or(bestmove);
        Evaluation {
            score: self.score.unwrap_or(Score::Cp(0)),
            pv: self.pv,
            best_move,
            depth: self.depth,
        }
    }
}
