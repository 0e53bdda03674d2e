//! The hooks user code implements to drive an import.

use serde_json::Value;

use super::ImportContext;
use crate::Result;
use crate::filters::FilterRegistry;
use crate::models::{ImportDefinition, ImportIdentifier, Row};

/// A concrete import: its rules, its filters and what happens to each row.
///
/// Only [`Importer::definition`], [`Importer::handle`] and
/// [`Importer::invalid`] are mandatory.
///
/// ```rust,ignore
/// struct GuitarsImporter;
///
/// impl Importer for GuitarsImporter {
///     fn definition(&self) -> ImportDefinition {
///         ImportDefinition::new()
///             .field("serial_number", FieldRule::new().required().validate("numeric"))
///             .csv_file("valid_entities", "valid.csv")
///     }
///
///     fn handle(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
///         ctx.insert_to("valid_entities", &row)
///     }
///
///     fn invalid(&mut self, _row: Row, _ctx: &mut ImportContext<'_>) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Importer: Send {
    /// Mappings, sinks and overrides. Read once when the engine is built.
    fn definition(&self) -> ImportDefinition;

    /// Default identifier: the short type name of the importer.
    fn identifier(&self) -> ImportIdentifier {
        ImportIdentifier::for_type_name(std::any::type_name::<Self>())
    }

    /// Populates this importer type's filter table.
    fn register_filters(&self, registry: &mut FilterRegistry) {
        let _ = registry;
    }

    /// Called for every row that passed validation.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn handle(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()>;

    /// Called for every row that failed validation.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn invalid(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()>;

    /// Called once after header validation, before the first row.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn before(&mut self, ctx: &mut ImportContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called once after the last row.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn after(&mut self, ctx: &mut ImportContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called when a cancel request is observed, before the session is cleared.
    fn on_cancel(&mut self) {}

    /// Extra details merged into the running progress payload.
    fn progress_details(&self) -> Option<Value> {
        None
    }
}
