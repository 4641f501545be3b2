use crate::cart::CartError;
use crate::config::ConfigError;
use crate::engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
