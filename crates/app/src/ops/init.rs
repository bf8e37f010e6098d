use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Cooldown between actions of the same kind by the same identity, in seconds
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Overwrite an existing directory, replacing all keys
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(cooldown_secs) = self.cooldown_secs {
            config.pipeline.cooldown_secs = cooldown_secs;
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config), self.force)?;
        let owner = state.load_owner_key()?.public();
        let oracle = state.load_oracle_key()?.public();

        let output = format!(
            "Initialized sealbatch directory at: {}\n\
             - Config: {}\n\
             - Owner key: {} ({})\n\
             - Oracle key: {} ({})\n\
             - Masking key: {}\n\
             - Instance: {}\n\
             - Cooldown: {}s",
            state.dir.display(),
            state.config_path.display(),
            state.owner_key_path.display(),
            owner.to_hex(),
            state.oracle_key_path.display(),
            oracle.to_hex(),
            state.masking_key_path.display(),
            state.config.pipeline.instance_id,
            state.config.pipeline.cooldown_secs,
        );

        Ok(output)
    }
}
