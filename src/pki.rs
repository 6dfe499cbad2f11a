//! Trust chain provisioning
//!
//! Every algorithm gets its own three-level chain (root CA, intermediate CA,
//! server and client leaf certificates) below `<out>/pki-<algorithm>`. The
//! chain is produced by the `openssl` command-line tool; a failing step
//! stops the run with the tool's diagnostics.

use crate::error::{AppError, ErrorContext, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::fsutil::{DirectoryPreparer, DirectoryState};
use crate::logging::Logger;
use crate::types::Algorithm;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SUBJECT_PREFIX: &str = "/O=Handshake Benchmark/OU=Emulated Network Assessment/CN=";
const ROOT_DAYS: &str = "7300";
const INTERMEDIATE_DAYS: &str = "3650";
const LEAF_DAYS: &str = "365";
const INITIAL_SERIAL: &str = "1000";

/// Paths of the material the peers need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustMaterial {
    pub root: PathBuf,
    pub ca_cert: PathBuf,
    pub ica_cert: PathBuf,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl TrustMaterial {
    /// Standard layout below `root`
    pub fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ca_cert: root.join("ca").join("ca.crt"),
            ica_cert: root.join("ica").join("ica.crt"),
            server_cert: root.join("server").join("server.crt"),
            server_key: root.join("server").join("server.key"),
            client_cert: root.join("client").join("client.crt"),
            client_key: root.join("client").join("client.key"),
        }
    }

    pub fn files(&self) -> [&Path; 6] {
        [
            &self.ca_cert,
            &self.ica_cert,
            &self.server_cert,
            &self.server_key,
            &self.client_cert,
            &self.client_key,
        ]
    }

    /// All files exist
    pub fn is_complete(&self) -> bool {
        self.files().iter().all(|path| path.is_file())
    }
}

/// Produces the trust chain for an algorithm
#[async_trait]
pub trait TrustProvisioner: Send + Sync {
    async fn provision(&self, algorithm: &Algorithm) -> Result<TrustMaterial>;

    /// Provision again after a failed attempt
    async fn reprovision(&self, algorithm: &Algorithm) -> Result<TrustMaterial> {
        self.provision(algorithm).await
    }
}

/// A certificate issued below the root
struct Entity {
    stage: &'static str,
    key: String,
    csr: String,
    cert: String,
    role: &'static str,
    extensions: &'static str,
    days: &'static str,
    /// Config of the issuing authority
    signer_config: String,
}

/// One `openssl` invocation of the provisioning sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningStep {
    pub stage: &'static str,
    pub command: CommandSpec,
}

/// Generates the chain with the `openssl` CLI
pub struct OpensslProvisioner {
    out_dir: PathBuf,
    openssl: String,
    rca_template: PathBuf,
    ica_template: PathBuf,
    preparer: DirectoryPreparer,
    runner: Arc<dyn CommandRunner>,
    logger: Logger,
    /// Chain roots laid out by this run
    generated: Mutex<HashSet<PathBuf>>,
}

impl OpensslProvisioner {
    pub fn new(
        out_dir: PathBuf,
        openssl: String,
        rca_template: PathBuf,
        ica_template: PathBuf,
        preparer: DirectoryPreparer,
        runner: Arc<dyn CommandRunner>,
        logger: Logger,
    ) -> Self {
        Self {
            out_dir,
            openssl,
            rca_template,
            ica_template,
            preparer,
            runner,
            logger,
            generated: Mutex::new(HashSet::new()),
        }
    }

    /// Root of the chain for `algorithm`
    pub fn pki_root(&self, algorithm: &Algorithm) -> PathBuf {
        self.out_dir.join(format!("pki-{}", algorithm.file_stem()))
    }

    /// Create the directory skeleton, CA databases and rendered configs
    fn lay_out(&self, material: &TrustMaterial) -> Result<()> {
        for sub in ["ca", "ica", "server", "client"] {
            let dir = material.root.join(sub);
            std::fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;
        }

        for (authority, template, config) in [
            ("ca", &self.rca_template, ca_config(material)),
            ("ica", &self.ica_template, ica_config(material)),
        ] {
            let dir = material.root.join(authority);
            std::fs::write(dir.join("serial"), INITIAL_SERIAL).context("Writing CA serial file")?;
            std::fs::write(dir.join("index.txt"), "").context("Writing CA index file")?;
            render_template(template, &config, &dir)?;
        }

        Ok(())
    }

    /// The full command sequence for `algorithm`, in execution order
    pub fn steps(&self, algorithm: &Algorithm, material: &TrustMaterial) -> Vec<ProvisioningStep> {
        let ca_cnf = path_str(&ca_config(material));
        let ica_cnf = path_str(&ica_config(material));
        let ca_key = path_str(&material.root.join("ca").join("ca.key"));
        let ica_key = path_str(&material.root.join("ica").join("ica.key"));
        let ica_csr = path_str(&material.root.join("ica").join("ica.csr"));
        let server_csr = path_str(&material.root.join("server").join("server.csr"));
        let client_csr = path_str(&material.root.join("client").join("client.csr"));

        let subject = |role: &str| format!("{}{} - {}", SUBJECT_PREFIX, algorithm.subject_name(), role);

        let mut root = CommandSpec::new(&self.openssl).args(["req", "-x509", "-new", "-sha256", "-newkey"]);
        root = match (algorithm.ec_curve(), algorithm.rsa_bits()) {
            (Some(curve), _) => root.args(["ec", "-pkeyopt"]).arg(format!("ec_paramgen_curve:{}", curve)),
            (None, Some(bits)) => root.arg(format!("rsa:{}", bits)),
            (None, None) => root.arg(&algorithm.name),
        };
        let root = root
            .arg("-keyout")
            .arg(&ca_key)
            .arg("-out")
            .arg(path_str(&material.ca_cert))
            .arg("-nodes")
            .arg("-subj")
            .arg(subject("Test Root CA"))
            .args(["-days", ROOT_DAYS, "-extensions", "v3_ca", "-config"])
            .arg(&ca_cnf);

        let mut steps = vec![ProvisioningStep {
            stage: "root CA",
            command: root,
        }];

        let chain = [
            Entity {
                stage: "intermediate CA",
                key: ica_key,
                csr: ica_csr,
                cert: path_str(&material.ica_cert),
                role: "Test Intermediate CA",
                extensions: "v3_intermediate_ca",
                days: INTERMEDIATE_DAYS,
                signer_config: ca_cnf,
            },
            Entity {
                stage: "server certificate",
                key: path_str(&material.server_key),
                csr: server_csr,
                cert: path_str(&material.server_cert),
                role: "Server Certificate",
                extensions: "server_cert",
                days: LEAF_DAYS,
                signer_config: ica_cnf.clone(),
            },
            Entity {
                stage: "client certificate",
                key: path_str(&material.client_key),
                csr: client_csr,
                cert: path_str(&material.client_cert),
                role: "Client Certificate",
                extensions: "server_cert",
                days: LEAF_DAYS,
                signer_config: ica_cnf.clone(),
            },
        ];

        for entity in chain {
            steps.push(ProvisioningStep {
                stage: entity.stage,
                command: self.key_command(algorithm, &entity.key, &ica_cnf),
            });
            steps.push(ProvisioningStep {
                stage: entity.stage,
                command: CommandSpec::new(&self.openssl)
                    .args(["req", "-new", "-sha256", "-key"])
                    .arg(&entity.key)
                    .arg("-out")
                    .arg(&entity.csr)
                    .arg("-subj")
                    .arg(subject(entity.role))
                    .arg("-config")
                    .arg(&ica_cnf),
            });
            steps.push(ProvisioningStep {
                stage: entity.stage,
                command: CommandSpec::new(&self.openssl)
                    .args(["ca", "-extensions", entity.extensions, "-md", "sha256", "-batch", "-in"])
                    .arg(&entity.csr)
                    .arg("-out")
                    .arg(&entity.cert)
                    .args(["-days", entity.days, "-config"])
                    .arg(&entity.signer_config),
            });
        }

        steps
    }

    /// Private key generation for non-root entities
    fn key_command(&self, algorithm: &Algorithm, key: &str, ica_cnf: &str) -> CommandSpec {
        let openssl = CommandSpec::new(&self.openssl);
        match (algorithm.ec_curve(), algorithm.rsa_bits()) {
            (Some(curve), _) => openssl
                .args(["ecparam", "-name", curve, "-genkey", "-out"])
                .arg(key),
            (None, Some(bits)) => openssl
                .args(["genpkey", "-algorithm", "RSA", "-pkeyopt"])
                .arg(format!("rsa_keygen_bits:{}", bits))
                .arg("-out")
                .arg(key)
                .arg("-config")
                .arg(ica_cnf),
            (None, None) => openssl
                .args(["genpkey", "-algorithm"])
                .arg(&algorithm.name)
                .arg("-out")
                .arg(key)
                .arg("-config")
                .arg(ica_cnf),
        }
    }
}

#[async_trait]
impl TrustProvisioner for OpensslProvisioner {
    async fn provision(&self, algorithm: &Algorithm) -> Result<TrustMaterial> {
        let root = self.pki_root(algorithm);
        let material = TrustMaterial::at(&root);

        if self.preparer.prepare(&root)? == DirectoryState::Kept {
            if material.is_complete() {
                self.logger
                    .info(&format!("Reusing trust material in {}", root.display()))
                    .field("algorithm", &algorithm.name)
                    .log()
                    .await;
                return Ok(material);
            }
            return Err(AppError::provisioning(format!(
                "{} was kept but does not hold a complete trust chain",
                root.display()
            )));
        }

        self.generate(algorithm, material).await
    }

    /// A chain this run started is wiped and generated again without
    /// prompting; a directory the operator kept goes through `provision`.
    async fn reprovision(&self, algorithm: &Algorithm) -> Result<TrustMaterial> {
        let root = self.pki_root(algorithm);
        if !self.started_here(&root) {
            return self.provision(algorithm).await;
        }

        if root.exists() {
            std::fs::remove_dir_all(&root).with_context(|| format!("Removing {}", root.display()))?;
        }
        self.generate(algorithm, TrustMaterial::at(&root)).await
    }
}

impl OpensslProvisioner {
    fn started_here(&self, root: &Path) -> bool {
        self.generated.lock().map(|roots| roots.contains(root)).unwrap_or(false)
    }

    /// Lay out `material` and run every step into it
    async fn generate(&self, algorithm: &Algorithm, material: TrustMaterial) -> Result<TrustMaterial> {
        if let Ok(mut roots) = self.generated.lock() {
            roots.insert(material.root.clone());
        }

        self.logger
            .info(&format!("Setting up \"{}\" PKI", algorithm))
            .field("algorithm", &algorithm.name)
            .field("family", algorithm.family.as_str())
            .log()
            .await;

        self.lay_out(&material)?;

        for step in self.steps(algorithm, &material) {
            let output = self.runner.run(&step.command).await?;
            if !output.success() {
                return Err(AppError::provisioning(format!(
                    "{} setup for {} failed ({}): {}",
                    step.stage,
                    algorithm,
                    step.command.program,
                    output.describe_failure()
                )));
            }
        }

        Ok(material)
    }
}

fn ca_config(material: &TrustMaterial) -> PathBuf {
    material.root.join("oqs-openssl-ca.cnf")
}

fn ica_config(material: &TrustMaterial) -> PathBuf {
    material.root.join("oqs-openssl-ica.cnf")
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

/// Copy `template` to `target`, substituting `{path}` with `authority_dir`
fn render_template(template: &Path, target: &Path, authority_dir: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(template)
        .map_err(|e| AppError::provisioning(format!("Cannot read config template {}: {}", template.display(), e)))?;
    let rendered = contents.replace("{path}", &authority_dir.display().to_string());
    std::fs::write(target, rendered).with_context(|| format!("Writing {}", target.display()))
}
