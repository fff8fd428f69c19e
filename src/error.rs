// ⚠️ Error kinds for the grocery list core
// Parse degradation and legacy records are absorbed, never raised

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroceryError {
    /// The recipe subsystem could not produce the recipe a swap needs.
    /// Raised before any list mutation.
    #[error("Recipe could not be resolved: {recipe}")]
    RecipeUnresolved { recipe: String },

    #[error("Grocery list not found: {id}")]
    ListNotFound { id: String },

    /// Another build, swap or edit holds this list. Retryable.
    #[error("Grocery list generation already in progress for {key}")]
    GenerationInProgress { key: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl GroceryError {
    /// Whether the caller can simply try again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, GroceryError::GenerationInProgress { .. })
    }
}

pub type Result<T> = std::result::Result<T, GroceryError>;
