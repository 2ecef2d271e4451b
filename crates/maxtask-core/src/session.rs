use anyhow::Context;
use tracing::info;

use crate::catalog::Catalog;
use crate::seed::Seed;
use crate::store::TaskStore;
use crate::user::UserStore;

/// Everything one run of the program owns. Consumers receive it by
/// reference; nothing here is global.
#[derive(Debug, Default)]
pub struct Session {
    pub tasks: TaskStore,
    pub catalog: Catalog,
    pub user: UserStore,
}

impl Session {
    #[tracing::instrument(skip(seed))]
    pub fn from_seed(seed: Seed) -> anyhow::Result<Self> {
        let tasks = TaskStore::from_tasks(seed.tasks).context("invalid seed tasks")?;
        let catalog = Catalog::new(seed.projects, seed.tags).context("invalid seed catalog")?;
        let user = UserStore::new(seed.user);

        info!(
            tasks = tasks.tasks().len(),
            projects = catalog.projects().len(),
            tags = catalog.tags().len(),
            "session started"
        );
        Ok(Self {
            tasks,
            catalog,
            user,
        })
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_seed(Seed::builtin()?)
    }

    /// Current state in seed form.
    pub fn export(&self) -> Seed {
        Seed {
            user: self.user.user().cloned(),
            projects: self.catalog.projects().to_vec(),
            tags: self.catalog.tags().to_vec(),
            tasks: self.tasks.tasks().to_vec(),
        }
    }
}
