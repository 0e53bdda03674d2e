//! Ready-made importer writing rows to a valid and an invalid sink.

use super::{ImportContext, Importer};
use crate::Result;
use crate::models::{ImportDefinition, ImportIdentifier, Row};

/// Routes valid rows to one sink and invalid rows to another.
#[derive(Debug, Clone)]
pub struct RoutingImporter {
    definition: ImportDefinition,
    valid_sink: String,
    invalid_sink: String,
    identifier: Option<ImportIdentifier>,
}

impl RoutingImporter {
    /// Creates the importer; both sinks must be declared in `definition`.
    #[must_use]
    pub fn new(
        definition: ImportDefinition,
        valid_sink: impl Into<String>,
        invalid_sink: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            valid_sink: valid_sink.into(),
            invalid_sink: invalid_sink.into(),
            identifier: None,
        }
    }

    /// Uses `identifier` instead of the type name.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(ImportIdentifier::new(identifier));
        self
    }
}

impl Importer for RoutingImporter {
    fn definition(&self) -> ImportDefinition {
        self.definition.clone()
    }

    fn identifier(&self) -> ImportIdentifier {
        self.identifier
            .clone()
            .unwrap_or_else(|| ImportIdentifier::for_type_name(std::any::type_name::<Self>()))
    }

    fn handle(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
        ctx.insert_to(&self.valid_sink, &row)
    }

    fn invalid(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
        ctx.insert_to(&self.invalid_sink, &row)
    }
}
