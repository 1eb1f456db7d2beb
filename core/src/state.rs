/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Declarative configuration of build servers, dependencies, projects and archives.

use crate::consts::DEFAULT_SSH_PORT;
use crate::input::{check_name, port_in_range, split_parameters};
use crate::sources::{CryptKey, derive_public_key, encrypt_ssh_private_key, load_crypt_key};
use crate::types::*;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use entity::archive::{ArchivePolicy, ArchiveTransport};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateBuildServer {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password_file: String,
    #[serde(default)]
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSshKeyPair {
    pub name: String,
    pub private_key_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDependency {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub server: Option<String>,
    pub job: Option<String>,
    pub parameters: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateProjectDependency {
    pub dependency: String,
    #[serde(default = "default_true")]
    pub auto_track: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<StateProjectDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateArchive {
    pub name: String,
    pub host: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: i32,
    pub basedir: String,
    pub username: Option<String>,
    #[serde(default = "default_policy")]
    pub policy: String,
    pub transport: String,
    pub ssh_credentials: Option<String>,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfiguration {
    #[serde(default)]
    pub build_servers: Vec<StateBuildServer>,
    #[serde(default)]
    pub ssh_key_pairs: Vec<StateSshKeyPair>,
    #[serde(default)]
    pub dependencies: Vec<StateDependency>,
    #[serde(default)]
    pub projects: Vec<StateProject>,
    #[serde(default)]
    pub archives: Vec<StateArchive>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation error in field '{field}': {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub is_valid: bool,
}

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> i32 {
    DEFAULT_SSH_PORT
}

fn default_policy() -> String {
    "default".to_string()
}

fn check_duplicates<'a>(
    errors: &mut Vec<ValidationError>,
    section: &str,
    names: impl Iterator<Item = &'a String>,
) {
    let mut seen = HashSet::new();

    for name in names {
        if !seen.insert(name) {
            errors.push(ValidationError {
                field: format!("{}.{}.name", section, name),
                message: format!("Duplicate {} name found", section),
            });
        }

        if let Err(e) = check_name(name) {
            errors.push(ValidationError {
                field: format!("{}.{}.name", section, name),
                message: e.to_string(),
            });
        }
    }
}

impl StateConfiguration {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path))?;
        let config: StateConfiguration =
            serde_json::from_str(&content).context("Failed to parse state file")?;
        Ok(config)
    }

    /// Collects every problem of the configuration, nothing is written.
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        check_duplicates(&mut errors, "build_servers", self.build_servers.iter().map(|s| &s.name));
        check_duplicates(&mut errors, "ssh_key_pairs", self.ssh_key_pairs.iter().map(|k| &k.name));
        check_duplicates(&mut errors, "dependencies", self.dependencies.iter().map(|d| &d.name));
        check_duplicates(&mut errors, "projects", self.projects.iter().map(|p| &p.name));
        check_duplicates(&mut errors, "archives", self.archives.iter().map(|a| &a.name));

        let server_jobs: HashMap<&String, &Vec<String>> = self
            .build_servers
            .iter()
            .map(|s| (&s.name, &s.jobs))
            .collect();
        let dependency_names: HashSet<&String> =
            self.dependencies.iter().map(|d| &d.name).collect();
        let key_pair_names: HashSet<&String> =
            self.ssh_key_pairs.iter().map(|k| &k.name).collect();

        for server in &self.build_servers {
            if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
                errors.push(ValidationError {
                    field: format!("build_servers.{}.url", server.name),
                    message: "Build server URL must start with http:// or https://".to_string(),
                });
            }

            let mut seen_jobs = HashSet::new();
            for job in &server.jobs {
                if !seen_jobs.insert(job) {
                    errors.push(ValidationError {
                        field: format!("build_servers.{}.jobs", server.name),
                        message: format!("Duplicate job '{}'", job),
                    });
                }
            }
        }

        for dependency in &self.dependencies {
            match (&dependency.server, &dependency.job) {
                (Some(server), Some(job)) => match server_jobs.get(server) {
                    Some(jobs) if jobs.contains(job) => {}
                    Some(_) => errors.push(ValidationError {
                        field: format!("dependencies.{}.job", dependency.name),
                        message: format!("Job '{}' does not exist on server '{}'", job, server),
                    }),
                    None => errors.push(ValidationError {
                        field: format!("dependencies.{}.server", dependency.name),
                        message: format!("Build server '{}' does not exist", server),
                    }),
                },
                (None, None) => {}
                _ => errors.push(ValidationError {
                    field: format!("dependencies.{}.job", dependency.name),
                    message: "A job needs both a server and a job name".to_string(),
                }),
            }

            if let Err(e) = split_parameters(dependency.parameters.as_deref()) {
                errors.push(ValidationError {
                    field: format!("dependencies.{}.parameters", dependency.name),
                    message: e.to_string(),
                });
            }
        }

        for project in &self.projects {
            let mut seen = HashSet::new();

            for project_dependency in &project.dependencies {
                if !dependency_names.contains(&project_dependency.dependency) {
                    errors.push(ValidationError {
                        field: format!("projects.{}.dependencies", project.name),
                        message: format!(
                            "Dependency '{}' does not exist",
                            project_dependency.dependency
                        ),
                    });
                }

                if !seen.insert(&project_dependency.dependency) {
                    errors.push(ValidationError {
                        field: format!("projects.{}.dependencies", project.name),
                        message: format!(
                            "Dependency '{}' is listed twice",
                            project_dependency.dependency
                        ),
                    });
                }
            }
        }

        let defaults = self.archives.iter().filter(|a| a.default).count();
        if defaults > 1 {
            errors.push(ValidationError {
                field: "archives.default".to_string(),
                message: format!("Only one archive can be the default (found {})", defaults),
            });
        }

        for archive in &self.archives {
            if ArchivePolicy::from_str(&archive.policy).is_err() {
                errors.push(ValidationError {
                    field: format!("archives.{}.policy", archive.name),
                    message: format!("Unknown policy: {}", archive.policy),
                });
            }

            if let Err(e) = port_in_range(&archive.port.to_string()) {
                errors.push(ValidationError {
                    field: format!("archives.{}.port", archive.name),
                    message: e,
                });
            }

            if let Some(credentials) = &archive.ssh_credentials {
                if !key_pair_names.contains(credentials) {
                    errors.push(ValidationError {
                        field: format!("archives.{}.ssh_credentials", archive.name),
                        message: format!("SSH key pair '{}' does not exist", credentials),
                    });
                }
            }

            match ArchiveTransport::from_str(&archive.transport) {
                Ok(ArchiveTransport::Ssh) => {
                    if archive.host.is_none() {
                        errors.push(ValidationError {
                            field: format!("archives.{}.host", archive.name),
                            message: "SSH archives need a host".to_string(),
                        });
                    }

                    if archive.username.is_none() {
                        errors.push(ValidationError {
                            field: format!("archives.{}.username", archive.name),
                            message: "SSH archives need a username".to_string(),
                        });
                    }

                    if archive.ssh_credentials.is_none() {
                        errors.push(ValidationError {
                            field: format!("archives.{}.ssh_credentials", archive.name),
                            message: "SSH archives need credentials".to_string(),
                        });
                    }
                }
                Ok(ArchiveTransport::Local) => {}
                Err(_) => errors.push(ValidationError {
                    field: format!("archives.{}.transport", archive.name),
                    message: format!("Unknown transport: {}", archive.transport),
                }),
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

pub async fn load_and_apply_state(
    db: &DatabaseConnection,
    state_file_path: Option<&str>,
    crypt_secret_file: Option<&str>,
) -> Result<()> {
    let Some(path) = state_file_path else {
        info!("No state file configured, skipping state management");
        return Ok(());
    };

    info!("Loading state configuration from: {}", path);
    let config = StateConfiguration::from_file(path)?;

    let validation = config.validate();
    if !validation.is_valid {
        let error_messages: Vec<String> = validation
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();

        bail!(
            "State configuration validation failed:\n{}",
            error_messages.join("\n")
        );
    }

    info!("State configuration validated successfully");

    let crypt_key = if config.ssh_key_pairs.is_empty() {
        None
    } else {
        Some(load_crypt_key(crypt_secret_file)?)
    };

    apply_state(db, &config, crypt_key.as_ref()).await
}

/// Upserts every entity of `config` by name inside one transaction.
pub async fn apply_state(
    db: &DatabaseConnection,
    config: &StateConfiguration,
    crypt_key: Option<&CryptKey>,
) -> Result<()> {
    info!("Applying state to database");

    let txn = db.begin().await.context("Failed to start transaction")?;

    let jobs = apply_build_servers(&txn, &config.build_servers).await?;
    let key_pairs = apply_ssh_key_pairs(&txn, &config.ssh_key_pairs, crypt_key).await?;
    let dependencies = apply_dependencies(&txn, &config.dependencies, &jobs).await?;
    apply_projects(&txn, &config.projects, &dependencies).await?;
    apply_archives(&txn, &config.archives, &key_pairs).await?;

    txn.commit().await.context("Failed to commit state")?;

    info!("State applied successfully");
    Ok(())
}

async fn apply_build_servers<C: ConnectionTrait>(
    db: &C,
    state_servers: &[StateBuildServer],
) -> Result<HashMap<(String, String), Uuid>> {
    let mut jobs = HashMap::new();

    for state_server in state_servers {
        let password = fs::read_to_string(&state_server.password_file).with_context(|| {
            format!("Failed to read password file {}", state_server.password_file)
        })?;

        let existing = EBuildServer::find()
            .filter(CBuildServer::Name.eq(&state_server.name))
            .one(db)
            .await?;

        let server = if let Some(existing) = existing {
            let mut server: ABuildServer = existing.into();
            server.url = Set(state_server.url.clone());
            server.username = Set(state_server.username.clone());
            server.password = Set(password.trim().to_string());
            let server = server.update(db).await?;
            info!("Updated build server: {}", state_server.name);
            server
        } else {
            let server = ABuildServer {
                id: Set(Uuid::new_v4()),
                name: Set(state_server.name.clone()),
                url: Set(state_server.url.clone()),
                username: Set(state_server.username.clone()),
                password: Set(password.trim().to_string()),
                created_at: Set(Utc::now().naive_utc()),
            };
            let server = server.insert(db).await?;
            info!("Created build server: {}", state_server.name);
            server
        };

        for job_name in &state_server.jobs {
            let existing = EJob::find()
                .filter(CJob::Server.eq(server.id))
                .filter(CJob::Name.eq(job_name))
                .one(db)
                .await?;

            let job = match existing {
                Some(job) => job,
                None => {
                    let job = AJob {
                        id: Set(Uuid::new_v4()),
                        server: Set(server.id),
                        name: Set(job_name.clone()),
                        created_at: Set(Utc::now().naive_utc()),
                    };
                    info!("Created job {} on {}", job_name, state_server.name);
                    job.insert(db).await?
                }
            };

            jobs.insert((state_server.name.clone(), job_name.clone()), job.id);
        }
    }

    Ok(jobs)
}

async fn apply_ssh_key_pairs<C: ConnectionTrait>(
    db: &C,
    state_key_pairs: &[StateSshKeyPair],
    crypt_key: Option<&CryptKey>,
) -> Result<HashMap<String, Uuid>> {
    let mut key_pairs = HashMap::new();

    for state_key_pair in state_key_pairs {
        let crypt_key = crypt_key.context("SSH key pairs require a crypt secret")?;
        let private_key = fs::read_to_string(&state_key_pair.private_key_file).with_context(|| {
            format!(
                "Failed to read private key file {}",
                state_key_pair.private_key_file
            )
        })?;
        let public_key = derive_public_key(&private_key)?;
        let encrypted_private_key = encrypt_ssh_private_key(crypt_key, &private_key)?;

        let existing = ESshKeyPair::find()
            .filter(CSshKeyPair::Name.eq(&state_key_pair.name))
            .one(db)
            .await?;

        let key_pair = if let Some(existing) = existing {
            let mut key_pair: ASshKeyPair = existing.into();
            key_pair.public_key = Set(public_key);
            key_pair.private_key = Set(encrypted_private_key);
            key_pair.update(db).await?
        } else {
            let key_pair = ASshKeyPair {
                id: Set(Uuid::new_v4()),
                name: Set(state_key_pair.name.clone()),
                public_key: Set(public_key),
                private_key: Set(encrypted_private_key),
                created_at: Set(Utc::now().naive_utc()),
            };
            key_pair.insert(db).await?
        };

        info!("Applied SSH key pair: {}", state_key_pair.name);
        key_pairs.insert(key_pair.name.clone(), key_pair.id);
    }

    Ok(key_pairs)
}

async fn apply_dependencies<C: ConnectionTrait>(
    db: &C,
    state_dependencies: &[StateDependency],
    jobs: &HashMap<(String, String), Uuid>,
) -> Result<HashMap<String, Uuid>> {
    let mut dependencies = HashMap::new();

    for state_dependency in state_dependencies {
        let job = match (&state_dependency.server, &state_dependency.job) {
            (Some(server), Some(job)) => Some(
                *jobs
                    .get(&(server.clone(), job.clone()))
                    .with_context(|| format!("Job '{}' on '{}' not found", job, server))?,
            ),
            _ => None,
        };

        let existing = EDependency::find()
            .filter(CDependency::Name.eq(&state_dependency.name))
            .one(db)
            .await?;

        let dependency = if let Some(existing) = existing {
            let mut dependency: ADependency = existing.into();
            dependency.job = Set(job);
            dependency.description = Set(state_dependency.description.clone());
            dependency.parameters = Set(state_dependency.parameters.clone());
            dependency.update(db).await?
        } else {
            let dependency = ADependency {
                id: Set(Uuid::new_v4()),
                name: Set(state_dependency.name.clone()),
                job: Set(job),
                description: Set(state_dependency.description.clone()),
                parameters: Set(state_dependency.parameters.clone()),
                created_at: Set(Utc::now().naive_utc()),
            };
            dependency.insert(db).await?
        };

        info!("Applied dependency: {}", state_dependency.name);
        dependencies.insert(dependency.name.clone(), dependency.id);
    }

    Ok(dependencies)
}

async fn apply_projects<C: ConnectionTrait>(
    db: &C,
    state_projects: &[StateProject],
    dependencies: &HashMap<String, Uuid>,
) -> Result<()> {
    for state_project in state_projects {
        let existing = EProject::find()
            .filter(CProject::Name.eq(&state_project.name))
            .one(db)
            .await?;

        let project = if let Some(existing) = existing {
            let mut project: AProject = existing.into();
            project.description = Set(state_project.description.clone());
            project.update(db).await?
        } else {
            let project = AProject {
                id: Set(Uuid::new_v4()),
                name: Set(state_project.name.clone()),
                description: Set(state_project.description.clone()),
                created_at: Set(Utc::now().naive_utc()),
            };
            project.insert(db).await?
        };

        for state_project_dependency in &state_project.dependencies {
            let dependency_id = *dependencies
                .get(&state_project_dependency.dependency)
                .with_context(|| {
                    format!(
                        "Dependency '{}' not found",
                        state_project_dependency.dependency
                    )
                })?;

            let existing = EProjectDependency::find()
                .filter(CProjectDependency::Project.eq(project.id))
                .filter(CProjectDependency::Dependency.eq(dependency_id))
                .one(db)
                .await?;

            if let Some(existing) = existing {
                let mut project_dependency: AProjectDependency = existing.into();
                project_dependency.auto_track = Set(state_project_dependency.auto_track);
                project_dependency.update(db).await?;
            } else {
                let project_dependency = AProjectDependency {
                    id: Set(Uuid::new_v4()),
                    project: Set(project.id),
                    dependency: Set(dependency_id),
                    auto_track: Set(state_project_dependency.auto_track),
                    current_build: Set(None),
                };
                project_dependency.insert(db).await?;
            }
        }

        info!("Applied project: {}", state_project.name);
    }

    Ok(())
}

async fn apply_archives<C: ConnectionTrait>(
    db: &C,
    state_archives: &[StateArchive],
    key_pairs: &HashMap<String, Uuid>,
) -> Result<()> {
    if let Some(default) = state_archives.iter().find(|a| a.default) {
        EArchive::update_many()
            .col_expr(CArchive::IsDefault, Expr::value(false))
            .filter(CArchive::Name.ne(&default.name))
            .exec(db)
            .await?;
    }

    for state_archive in state_archives {
        let policy = ArchivePolicy::from_str(&state_archive.policy)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let transport = ArchiveTransport::from_str(&state_archive.transport)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let ssh_credentials = match &state_archive.ssh_credentials {
            Some(name) => Some(
                *key_pairs
                    .get(name)
                    .with_context(|| format!("SSH key pair '{}' not found", name))?,
            ),
            None => None,
        };

        let existing = EArchive::find()
            .filter(CArchive::Name.eq(&state_archive.name))
            .one(db)
            .await?;

        if let Some(existing) = existing {
            let mut archive: AArchive = existing.into();
            archive.host = Set(state_archive.host.clone());
            archive.port = Set(state_archive.port);
            archive.basedir = Set(state_archive.basedir.clone());
            archive.username = Set(state_archive.username.clone());
            archive.policy = Set(policy);
            archive.transport = Set(transport);
            archive.ssh_credentials = Set(ssh_credentials);
            archive.is_default = Set(state_archive.default);
            archive.update(db).await?;
        } else {
            let archive = AArchive {
                id: Set(Uuid::new_v4()),
                name: Set(state_archive.name.clone()),
                host: Set(state_archive.host.clone()),
                port: Set(state_archive.port),
                basedir: Set(state_archive.basedir.clone()),
                username: Set(state_archive.username.clone()),
                policy: Set(policy),
                transport: Set(transport),
                ssh_credentials: Set(ssh_credentials),
                is_default: Set(state_archive.default),
                created_at: Set(Utc::now().naive_utc()),
            };
            archive.insert(db).await?;
        }

        info!("Applied archive: {}", state_archive.name);
    }

    Ok(())
}
