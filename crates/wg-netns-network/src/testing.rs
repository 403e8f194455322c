//! In-memory stand-in for `ip`, `wg` and the hook shell.
//!
//! [`SimulatedNetwork`] keeps a model of namespaces and links, answers the
//! subset of iproute2 commands wg-netns issues, and records every invocation
//! so tests can assert on the exact command sequence.

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use wg_netns_common::{NetnsError, NetnsResult};

use crate::exec::{Invocation, ProcessExecutor};

type FailurePredicate = Box<dyn Fn(&[&str]) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeSet<String>,
    /// `(namespace, interface)`; `None` is the host namespace.
    links: BTreeSet<(Option<String>, String)>,
    calls: Vec<Invocation>,
}

/// Simulated network stack implementing [`ProcessExecutor`].
#[derive(Default)]
pub struct SimulatedNetwork {
    state: Mutex<State>,
    failures: Vec<FailurePredicate>,
}

impl SimulatedNetwork {
    /// Empty host with no named namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing namespace.
    #[must_use]
    pub fn with_namespace(self, name: &str) -> Self {
        self.state.lock().namespaces.insert(name.to_string());
        self
    }

    /// Start with an existing link in `netns` (host when `None`).
    #[must_use]
    pub fn with_link(self, netns: Option<&str>, name: &str) -> Self {
        self.state
            .lock()
            .links
            .insert((netns.map(str::to_string), name.to_string()));
        self
    }

    /// Make every invocation whose argv matches `predicate` fail.
    #[must_use]
    pub fn fail_when(mut self, predicate: impl Fn(&[&str]) -> bool + Send + Sync + 'static) -> Self {
        self.failures.push(Box::new(predicate));
        self
    }

    /// All invocations so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.state.lock().calls.clone()
    }

    /// All invocations so far as space-joined command lines.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    /// Forget recorded invocations, keeping the network model.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Live namespaces.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        self.state.lock().namespaces.iter().cloned().collect()
    }

    /// Check if a link exists in `netns` (host when `None`).
    #[must_use]
    pub fn has_link(&self, netns: Option<&str>, name: &str) -> bool {
        self.state
            .lock()
            .links
            .contains(&(netns.map(str::to_string), name.to_string()))
    }
}

#[async_trait]
impl ProcessExecutor for SimulatedNetwork {
    async fn execute(&self, invocation: &Invocation) -> NetnsResult<String> {
        let argv = invocation.argv();
        let mut state = self.state.lock();
        state.calls.push(invocation.clone());

        let result = if self.failures.iter().any(|predicate| predicate(&argv)) {
            Err("injected failure".to_string())
        } else if invocation.program() == "ip" {
            simulate_ip(&mut state, &argv[1..])
        } else {
            Ok(String::new())
        };

        match result {
            Ok(output) => Ok(output),
            Err(message) if invocation.check() => Err(NetnsError::Execution {
                command: invocation.command_line(),
                exit_code: Some(1),
                message,
            }),
            Err(_) => Ok(String::new()),
        }
    }
}

fn simulate_ip(state: &mut State, args: &[&str]) -> Result<String, String> {
    let mut scope: Option<String> = None;
    let mut json = false;
    let mut rest = args;
    loop {
        match rest {
            ["-n", netns, tail @ ..] => {
                scope = Some((*netns).to_string());
                rest = tail;
            }
            ["-j" | "-json", tail @ ..] => {
                json = true;
                rest = tail;
            }
            ["-4" | "-6", tail @ ..] => rest = tail,
            _ => break,
        }
    }

    if let Some(netns) = &scope {
        require_namespace(state, netns)?;
    }

    match rest {
        ["netns"] | ["netns", "list"] => Ok(list_namespaces(state, json)),
        ["netns", "add", name] => {
            if state.namespaces.insert((*name).to_string()) {
                Ok(String::new())
            } else {
                Err(format!(
                    "Cannot create namespace file \"/run/netns/{name}\": File exists"
                ))
            }
        }
        ["netns", "delete", name] => {
            if state.namespaces.remove(*name) {
                state
                    .links
                    .retain(|(netns, _)| netns.as_deref() != Some(*name));
                Ok(String::new())
            } else {
                Err(format!(
                    "Cannot remove namespace file \"/run/netns/{name}\": No such file or directory"
                ))
            }
        }
        ["netns", "exec", netns, command @ ..] => {
            require_namespace(state, netns)?;
            if let ["wg", "set", interface, ..] = command {
                require_link(state, Some((*netns).to_string()), interface)?;
            }
            Ok(String::new())
        }
        ["link", "add", name, "type", "wireguard"] => {
            let key = (scope, (*name).to_string());
            if state.links.insert(key) {
                Ok(String::new())
            } else {
                Err("RTNETLINK answers: File exists".to_string())
            }
        }
        ["link", "set", name, "netns", target] => {
            require_link(state, scope.clone(), name)?;
            require_namespace(state, target)?;
            state.links.remove(&(scope, (*name).to_string()));
            state
                .links
                .insert((Some((*target).to_string()), (*name).to_string()));
            Ok(String::new())
        }
        ["link", "set", "dev", "lo", "up"] => Ok(String::new()),
        ["link", "set", "dev", name, "mtu", _, "up"]
        | ["link", "set", name, "down"]
        | ["address", "add", _, "dev", name]
        | ["route", "add", _, "dev", name] => {
            require_link(state, scope, name)?;
            Ok(String::new())
        }
        ["link", "show", name] => {
            require_link(state, scope, name)?;
            Ok(format!("4: {name}: <POINTOPOINT,NOARP,UP,LOWER_UP> mtu 1420\n"))
        }
        ["link", "delete", name] => {
            if state.links.remove(&(scope, (*name).to_string())) {
                Ok(String::new())
            } else {
                Err(format!("Cannot find device \"{name}\""))
            }
        }
        other => Err(format!("unsupported command: ip {}", other.join(" "))),
    }
}

fn list_namespaces(state: &State, json: bool) -> String {
    if state.namespaces.is_empty() {
        return String::new();
    }
    if json {
        let entries: Vec<serde_json::Value> = state
            .namespaces
            .iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();
        serde_json::Value::Array(entries).to_string()
    } else {
        state
            .namespaces
            .iter()
            .map(|name| format!("{name}\n"))
            .collect()
    }
}

fn require_namespace(state: &State, netns: &str) -> Result<(), String> {
    if state.namespaces.contains(netns) {
        Ok(())
    } else {
        Err(format!(
            "Cannot open network namespace \"{netns}\": No such file or directory"
        ))
    }
}

fn require_link(state: &State, netns: Option<String>, name: &str) -> Result<(), String> {
    if state.links.contains(&(netns, name.to_string())) {
        Ok(())
    } else {
        Err(format!("Device \"{name}\" does not exist."))
    }
}
