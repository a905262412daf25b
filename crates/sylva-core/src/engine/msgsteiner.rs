//! Adapter for the external `msgsteiner` solver binary.
//!
//! ## Request contract
//!
//! The request is a line-oriented text document fed to the solver on
//! stdin. Serialization is deterministic (nodes sorted by name, edges
//! sorted by canonical endpoint pair), so identical logical input always
//! produces a byte-identical request. This matters for caching and for
//! debugging divergent results.
//!
//! - `N <name> <prize>`: one per node, with the effective prize
//!   `b * prize - mu * degree` (prize scaling and hub penalty applied here;
//!   the solver sees final values only).
//! - `E <a> <b> <cost> <U|D>`: one per edge, cost `1 - weight`
//!   (confidence becomes cost). Undirected endpoints are in lexicographic
//!   order.
//! - `R <name> <cost>`: root attachment edges, cost `w`, targets chosen
//!   by the configured [`DummyMode`].
//!
//! The depth bound `d` and the message-passing knobs `g`/`r` travel as
//! command-line flags.
//!
//! ## Response contract
//!
//! One selected edge per stdout line as `<a> <b>`; edges incident to the
//! synthetic root name the root-attached diagnostic set. A line
//! `# objective <value>` reports the objective; other `#` lines are
//! ignored. Anything else, a missing objective, an unknown edge, or a
//! non-zero exit is an [`ForestError::Oracle`] for that run.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};

use crate::engine::errors::ForestError;
use crate::engine::graph::{EdgeDirection, Interactome, NodeId};
use crate::engine::oracle::{DummyMode, ForestOracle, OracleSolution, SolverParams};
use crate::engine::perturb::Scenario;

/// Name of the solver executable searched for on `PATH`.
pub const MSGSTEINER_BINARY: &str = "msgsteiner";

/// Reserved name for the synthetic root node in requests and responses.
const ROOT_NAME: &str = "__ROOT__";

/// Poll interval while waiting for the child process.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Grace period for draining child output after exit or kill.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Oracle backend that shells out to the `msgsteiner` binary.
#[derive(Debug, Clone)]
pub struct MsgSteinerOracle {
    binary: PathBuf,
    timeout: Duration,
}

impl MsgSteinerOracle {
    /// Locates `msgsteiner` on the process's search path.
    ///
    /// Absence is an [`ForestError::OracleUnavailable`]; callers are
    /// expected to do this before parsing any input so a missing solver
    /// fails fast.
    pub fn locate() -> Result<Self, ForestError> {
        let binary = find_in_path(MSGSTEINER_BINARY).ok_or_else(|| {
            ForestError::OracleUnavailable(format!(
                "'{}' was not found on PATH",
                MSGSTEINER_BINARY
            ))
        })?;
        Ok(Self::with_binary(binary))
    }

    /// Uses an explicit binary path (tests point this at a stub script).
    pub fn with_binary(binary: PathBuf) -> Self {
        MsgSteinerOracle {
            binary,
            timeout: Duration::from_secs(3600),
        }
    }

    /// Sets the per-invocation timeout. A run exceeding it is killed and
    /// recorded as a failed run, never a process-wide fatal error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Renders the deterministic request document for a scenario.
    pub fn render_request(scenario: &Scenario, params: &SolverParams) -> String {
        let graph = &scenario.graph;
        let mut out = String::new();

        let mut node_order: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
        node_order.sort_by(|x, y| graph.node_name(*x).cmp(graph.node_name(*y)));
        for &id in &node_order {
            let effective =
                params.b * scenario.prizes.get(id) - params.mu * f64::from(graph.degree(id));
            out.push_str(&format!("N {} {}\n", graph.node_name(id), effective));
        }

        let mut edge_lines: Vec<String> = graph
            .edges()
            .iter()
            .map(|e| {
                let (a, b) = (graph.node_name(e.a), graph.node_name(e.b));
                let cost = 1.0 - e.weight;
                match e.direction {
                    EdgeDirection::Undirected => {
                        let (a, b) = if b < a { (b, a) } else { (a, b) };
                        format!("E {} {} {} U\n", a, b, cost)
                    }
                    EdgeDirection::Directed => format!("E {} {} {} D\n", a, b, cost),
                }
            })
            .collect();
        edge_lines.sort_unstable();
        for line in edge_lines {
            out.push_str(&line);
        }

        for &id in &node_order {
            let attach = match params.dummy_mode {
                DummyMode::Terminals => scenario.prizes.is_terminal(id),
                DummyMode::Others => !scenario.prizes.is_terminal(id),
                DummyMode::All => true,
            };
            if attach {
                out.push_str(&format!("R {} {}\n", graph.node_name(id), params.w));
            }
        }
        out
    }

    /// Parses the solver's stdout against the scenario's graph.
    pub fn parse_response(
        stdout: &str,
        graph: &Interactome,
    ) -> Result<OracleSolution, ForestError> {
        let mut edges = Vec::new();
        let mut root_attached = Vec::new();
        let mut objective = None;

        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('#') {
                let mut parts = rest.split_whitespace();
                if parts.next() == Some("objective") {
                    let value = parts.next().and_then(|v| v.parse::<f64>().ok());
                    objective = Some(value.ok_or_else(|| {
                        ForestError::Oracle(format!("unparsable objective line '{}'", line))
                    })?);
                }
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(ForestError::Oracle(format!(
                    "unparsable response line '{}'",
                    line
                )));
            }
            let (a, b) = (fields[0], fields[1]);
            if a == ROOT_NAME || b == ROOT_NAME {
                let name = if a == ROOT_NAME { b } else { a };
                let id = graph.node_by_name(name).ok_or_else(|| {
                    ForestError::Oracle(format!("response names unknown node '{}'", name))
                })?;
                root_attached.push(id);
                continue;
            }
            let a_id = graph.node_by_name(a).ok_or_else(|| {
                ForestError::Oracle(format!("response names unknown node '{}'", a))
            })?;
            let b_id = graph.node_by_name(b).ok_or_else(|| {
                ForestError::Oracle(format!("response names unknown node '{}'", b))
            })?;
            let edge = graph.edge_between(a_id, b_id).ok_or_else(|| {
                ForestError::Oracle(format!(
                    "response selects nonexistent edge ({}, {})",
                    a, b
                ))
            })?;
            edges.push(edge);
        }

        let objective = objective
            .ok_or_else(|| ForestError::Oracle("response is missing an objective".into()))?;
        Ok(OracleSolution {
            edges,
            root_attached,
            objective,
        })
    }

    fn invoke(&self, request: &str, params: &SolverParams) -> Result<String, ForestError> {
        let mut child = Command::new(&self.binary)
            .arg("-d")
            .arg(params.d.to_string())
            .arg("-g")
            .arg(params.g.to_string())
            .arg("-r")
            .arg(params.r.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ForestError::OracleUnavailable(format!(
                    "failed to launch '{}': {}",
                    self.binary.display(),
                    e
                ))
            })?;

        // Start draining before feeding stdin: a solver that streams
        // output while still reading its input must not fill the pipe and
        // deadlock against us.
        let stdout_rx = drain_in_background(child.stdout.take());
        let stderr_rx = drain_in_background(child.stderr.take());

        // Feed the request and close stdin so the solver sees EOF.
        {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                ForestError::Internal("child stdin was not captured".into())
            })?;
            stdin
                .write_all(request.as_bytes())
                .map_err(|e| ForestError::Oracle(format!("failed to write request: {}", e)))?;
        }

        let status = wait_with_timeout(&mut child, self.timeout)?;
        let stdout = recv_drained(&stdout_rx)?;
        let stderr = recv_drained(&stderr_rx)?;

        if !status.success() {
            let detail = stderr.lines().next().unwrap_or("no diagnostic output");
            return Err(ForestError::Oracle(format!(
                "solver exited with {}: {}",
                status, detail
            )));
        }
        Ok(stdout)
    }
}

impl ForestOracle for MsgSteinerOracle {
    fn preflight(&self) -> Result<(), ForestError> {
        if self.binary.is_file() {
            Ok(())
        } else {
            Err(ForestError::OracleUnavailable(format!(
                "solver binary '{}' does not exist",
                self.binary.display()
            )))
        }
    }

    fn solve(
        &self,
        scenario: &Scenario,
        params: &SolverParams,
    ) -> Result<OracleSolution, ForestError> {
        let request = Self::render_request(scenario, params);
        let stdout = self.invoke(&request, params)?;
        Self::parse_response(&stdout, &scenario.graph)
    }
}

/// Searches the `PATH` environment for an executable of the given name.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Reads a child stream to EOF on a helper thread.
///
/// Draining must not block the waiting loop: a solver that fills its pipe
/// would deadlock against a parent that only reads after exit.
fn drain_in_background<R: Read + Send + 'static>(
    stream: Option<R>,
) -> Receiver<std::io::Result<String>> {
    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = match stream {
            Some(mut stream) => stream.read_to_string(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}

/// Receives a drained stream, bounding how long we wait for the reader
/// thread (a killed child's grandchildren can hold the pipe open).
fn recv_drained(rx: &Receiver<std::io::Result<String>>) -> Result<String, ForestError> {
    rx.recv_timeout(DRAIN_TIMEOUT)
        .map_err(|_| ForestError::Oracle("timed out draining solver output".into()))?
        .map_err(|e| ForestError::Oracle(format!("failed to read solver output: {}", e)))
}

/// Waits for the child, killing it once the timeout elapses.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, ForestError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ForestError::Oracle(format!(
                        "solver run exceeded the {:?} timeout",
                        timeout
                    )));
                }
                std::thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                return Err(ForestError::Oracle(format!(
                    "failed to wait for solver: {}",
                    e
                )))
            }
        }
    }
}
