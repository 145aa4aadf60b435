//! Command execution.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use shipyard_application::Actor;
use shipyard_application::ports::FileSystem;
use shipyard_application::use_cases::{
    AssignVariableGroups, CreateVariableGroup, DestroyVariableGroup, ListVariableGroups,
    ResolveStageEnv, UpdateStageVariables, UpdateVariableGroup,
};
use shipyard_domain::environment::{Scope, VariableBatch};
use shipyard_infrastructure::{
    EnvFileWriter, JsonFileStore, SystemClock, TokioFileSystem, from_json_bytes, render_dotenv,
};
use tracing::debug;

use crate::cli::Command;
use crate::settings::Settings;

type Store = JsonFileStore<TokioFileSystem, SystemClock>;

/// Runs `command` and returns what should be printed.
///
/// # Errors
/// Returns an error if the dataset cannot be opened, the operation is
/// rejected, or output files cannot be written. Only commands that read or
/// change records open the dataset.
pub async fn execute(settings: &Settings, command: Command) -> Result<String> {
    debug!(?command, "executing command");

    match command {
        Command::Scope { token } => describe_scope(&token),

        Command::Env {
            stage,
            deploy_group,
        } => {
            let store = open_store(&settings.store_path).await?;
            let env = ResolveStageEnv::new(store)
                .execute(stage, deploy_group)
                .await?;
            Ok(render_dotenv(&env))
        }

        Command::EnvFiles { stage, out } => {
            let dir = out.unwrap_or_else(|| settings.output_dir.clone());
            let store = open_store(&settings.store_path).await?;
            let environments = ResolveStageEnv::new(store).execute_all(stage).await?;
            let paths = EnvFileWriter::new(TokioFileSystem::new())
                .write_all(&dir, &environments)
                .await?;
            Ok(lines(paths.iter().map(|p| p.display().to_string())))
        }

        Command::Groups => {
            let (store, actor) = open_as_actor(settings).await?;
            let groups = ListVariableGroups::new(store).execute(&actor).await?;
            Ok(lines(groups.iter().map(|g| {
                format!(
                    "{}\t{}\t{} variables\t{} stages\t{}",
                    g.id,
                    g.name,
                    g.variable_count(),
                    g.stage_ids.len(),
                    g.variable_names().join(",")
                )
            })))
        }

        Command::ApplyStage { stage, batch } => {
            let batch = read_batch(&batch).await?;
            let (store, actor) = open_as_actor(settings).await?;
            let variables = UpdateStageVariables::new(store)
                .execute(&actor, stage, &batch)
                .await?;
            Ok(format!("stage {stage}: {} variables\n", variables.len()))
        }

        Command::CreateGroup { name, batch } => {
            let batch = read_optional_batch(batch.as_deref()).await?;
            let (store, actor) = open_as_actor(settings).await?;
            let group = CreateVariableGroup::new(store)
                .execute(&actor, &name, &batch)
                .await?;
            Ok(format!("{}\t{}\n", group.id, group.name))
        }

        Command::UpdateGroup { id, name, batch } => {
            let batch = read_optional_batch(batch.as_deref()).await?;
            let (store, actor) = open_as_actor(settings).await?;
            let group = UpdateVariableGroup::new(store)
                .execute(&actor, id, name.as_deref(), &batch)
                .await?;
            Ok(format!("{}\t{}\n", group.id, group.name))
        }

        Command::DestroyGroup { id } => {
            let (store, actor) = open_as_actor(settings).await?;
            DestroyVariableGroup::new(store).execute(&actor, id).await?;
            Ok(format!("destroyed variable group {id}\n"))
        }

        Command::Assign { stage, groups } => {
            let (store, actor) = open_as_actor(settings).await?;
            let stage = AssignVariableGroups::new(store)
                .execute(&actor, stage, groups.into_iter().collect())
                .await?;
            let ids: Vec<_> = stage
                .variable_group_ids
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(format!("stage {}: groups [{}]\n", stage.id, ids.join(", ")))
        }
    }
}

/// Opens the dataset for a command that is gated on the actor's role.
async fn open_as_actor(settings: &Settings) -> Result<(Store, Actor)> {
    let actor = settings.actor()?;
    debug!(actor = %actor.name, role = ?actor.role, "acting");
    Ok((open_store(&settings.store_path).await?, actor))
}

async fn open_store(path: &Path) -> Result<Store> {
    JsonFileStore::open(TokioFileSystem::new(), SystemClock::new(), path)
        .await
        .with_context(|| format!("failed to open dataset {}", path.display()))
}

fn describe_scope(token: &str) -> Result<String> {
    let scope = Scope::parse(token)?;
    Ok(if scope.is_none() {
        "none\n".to_string()
    } else {
        format!("{scope}\n")
    })
}

async fn read_batch(path: &Path) -> Result<VariableBatch> {
    let bytes = TokioFileSystem::new()
        .read_file(path)
        .await
        .with_context(|| format!("failed to read batch {}", path.display()))?;
    from_json_bytes(&bytes).with_context(|| format!("invalid batch {}", path.display()))
}

async fn read_optional_batch(path: Option<&Path>) -> Result<VariableBatch> {
    match path {
        Some(path) => read_batch(path).await,
        None => Ok(VariableBatch::new()),
    }
}

fn lines(items: impl Iterator<Item = String>) -> String {
    items.fold(String::new(), |mut out, item| {
        let _ = writeln!(out, "{item}");
        out
    })
}
