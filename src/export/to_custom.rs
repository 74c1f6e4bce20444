use crate::errors::{ImportExportError, ImportExportResult};
use crate::graph::GraphView;
use crate::plan::{CustomExportProfile, RenderConfig};
use std::fs;
use tracing::error;

/// Renders a user-supplied handlebars template (plus partials) against the
/// standard context.
pub fn render(
    view: &GraphView,
    render_config: &RenderConfig,
    params: &CustomExportProfile,
) -> ImportExportResult<String> {
    let mut handlebars = crate::common::get_handlebars();

    if let Some(partials) = &params.partials {
        for (name, partial) in partials {
            let partial_content = fs::read_to_string(partial).map_err(|err| {
                error!("Failed to read partial file '{}': {}", partial, err);
                ImportExportError::TemplateNotFound(partial.clone())
            })?;
            handlebars.register_partial(name, partial_content)?;
        }
    }

    let template_content = fs::read_to_string(&params.template).map_err(|err| {
        error!("Failed to read template file '{}': {}", params.template, err);
        ImportExportError::TemplateNotFound(params.template.clone())
    })?;

    let context = crate::export::renderer::create_standard_context(view, render_config);
    Ok(handlebars.render_template(&template_content, &context)?)
}
