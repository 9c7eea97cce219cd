//! Interactive prompts for claim values

use inquire::{Confirm, Text};

use kosmo_common::{Error, Result};
use kosmo_platform::install::ValueSource;
use kosmo_platform::xrd::SchemaField;

/// Asks the operator on the terminal
#[derive(Debug, Default)]
pub struct InteractivePrompts;

impl ValueSource for InteractivePrompts {
    fn string(&mut self, field: &SchemaField) -> Result<String> {
        loop {
            let mut prompt = Text::new(&field.name);
            if let Some(description) = &field.description {
                prompt = prompt.with_help_message(description);
            }
            if let Some(default) = &field.default {
                prompt = prompt.with_default(default);
            }
            let answer = prompt
                .prompt()
                .map_err(|err| Error::internal_with_context("prompt", err.to_string()))?;

            if !answer.trim().is_empty() || !field.required {
                return Ok(answer.trim().to_string());
            }
            // Required fields re-prompt until they get a value.
        }
    }

    fn boolean(&mut self, field: &SchemaField) -> Result<bool> {
        let default = field
            .default
            .as_deref()
            .and_then(|raw| raw.parse::<bool>().ok())
            .unwrap_or(false);
        let mut prompt = Confirm::new(&field.name).with_default(default);
        if let Some(description) = &field.description {
            prompt = prompt.with_help_message(description);
        }
        prompt
            .prompt()
            .map_err(|err| Error::internal_with_context("prompt", err.to_string()))
    }
}
