//! Test-only helpers: a temp vault fixture and a scripted oracle.

use crate::agent::Orchestrator;
use crate::config::AuraConfig;
use crate::oracle::{Oracle, OracleError, OracleRequest};
use crate::sandbox::Sandbox;
use crate::tools::ToolRegistry;
use crate::vault::{init::initialize_vault, Vault};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A vault and code root inside a temp directory, initialised like `aura init`.
pub struct TestVault {
    pub temp: tempfile::TempDir,
    pub config: AuraConfig,
    pub sandbox: Arc<Sandbox>,
    pub vault: Arc<Vault>,
}

impl TestVault {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let vault_root = temp.path().join("vault");
        let code_root = temp.path().join("code");
        initialize_vault(&vault_root).expect("init vault");
        std::fs::create_dir_all(code_root.join("src")).expect("code root");
        std::fs::write(
            code_root.join("src").join("lib.rs"),
            "//! Agent core.\npub fn run_cycle() {}\n",
        )
        .expect("seed code");

        let mut config = AuraConfig::default();
        config.vault_path = vault_root.to_string_lossy().into_owned();
        config.code_path = code_root.to_string_lossy().into_owned();

        let sandbox = Arc::new(Sandbox::from_config(&config).expect("sandbox"));
        let vault = Arc::new(Vault::new(sandbox.clone(), &config.journal));
        Self {
            temp,
            config,
            sandbox,
            vault,
        }
    }

    pub fn vault_path(&self, relative: &str) -> PathBuf {
        self.temp.path().join("vault").join(relative)
    }

    pub fn code_path(&self, relative: &str) -> PathBuf {
        self.temp.path().join("code").join(relative)
    }

    /// Write a file under the vault root, creating parents.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.vault_path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, contents).expect("write vault file");
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.vault_path(relative)).expect("read vault file")
    }

    /// An orchestrator over this vault driven by a scripted oracle.
    pub fn orchestrator(&self, script: Vec<Scripted>) -> Orchestrator {
        self.orchestrator_with(Arc::new(ScriptedOracle::new(script)))
    }

    pub fn orchestrator_with(&self, oracle: Arc<ScriptedOracle>) -> Orchestrator {
        let registry = ToolRegistry::new(self.vault.clone(), self.config.search.clone());
        Orchestrator::new(self.config.clone(), self.vault.clone(), registry, oracle)
    }

    /// Text of the journal entry with the given file name.
    pub fn journal_entry(&self, name: &str) -> String {
        self.read(&format!("2-Journal/{}", name))
    }

    /// Journal file names, oldest first.
    pub fn journal_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.vault_path("2-Journal"))
            .expect("journal dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".md"))
            .collect();
        names.sort();
        names
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

/// One scripted oracle behaviour.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    /// A transient network failure.
    Fail(String),
    /// An HTTP error status.
    Status(u16),
    Hang,
    Panic(String),
}

impl Scripted {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    /// A reply serialised from JSON.
    pub fn json(value: serde_json::Value) -> Self {
        Self::Reply(value.to_string())
    }
}

/// A call the scripted oracle received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub schema: Option<String>,
}

/// Oracle that replays a fixed script and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: OracleRequest<'_>) -> Result<String, OracleError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            model: request.model.to_string(),
            system: request.system.to_string(),
            prompt: request.prompt.to_string(),
            schema: request.schema.map(|s| s.name.to_string()),
        });
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(msg)) => Err(OracleError::Network(msg)),
            Some(Scripted::Status(status)) => Err(OracleError::Http {
                status,
                body: String::new(),
            }),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Err(OracleError::Empty)
            }
            Some(Scripted::Panic(msg)) => panic!("{}", msg),
            None => Err(OracleError::Network("script exhausted".into())),
        }
    }
}
