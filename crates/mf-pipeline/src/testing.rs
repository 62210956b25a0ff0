//! Test doubles for the unit tests of this crate and, with the `test-util`
//! feature, for integration tests downstream.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mf_av::{Recipe, TransformEngine};
use mf_core::{Error, Result};

/// An engine that writes the concatenated bytes of its inputs.
///
/// A scale recipe prefixes the bytes with `WxH:` so the chosen resolution is
/// visible in the artifact.
#[derive(Default)]
pub struct FakeEngine {
    recipes: Mutex<Vec<Recipe>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl FakeEngine {
    pub fn failing(diagnostic: &str) -> Self {
        Self {
            failure: Some(diagnostic.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recipes(&self) -> Vec<Recipe> {
        self.recipes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransformEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn render(&self, recipe: &Recipe, output: &Path) -> Result<()> {
        self.recipes.lock().unwrap().push(recipe.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(diagnostic) = &self.failure {
            // Leave a half-written file behind like a crashing encoder would.
            std::fs::write(output, b"garbage")?;
            return Err(Error::transform(diagnostic.clone()));
        }

        let mut bytes = Vec::new();
        if let Recipe::Scale { resolution, .. } = recipe {
            bytes.extend_from_slice(format!("{resolution}:").as_bytes());
        }
        for input in recipe.inputs() {
            bytes.extend(std::fs::read(input)?);
        }
        std::fs::write(output, bytes)?;
        Ok(())
    }
}
