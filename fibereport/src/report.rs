//! Rendering of payloads into standalone, printable HTML documents.

use handlebars::{
    html_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError,
};
use log::debug;
use serde::Serialize;

use crate::table::ProjectedRow;
use crate::{Error, Payload};

/// Shown in place of the source file's name when the payload has none.
pub const MISSING_SOURCE_PLACEHOLDER: &str = "N/A";

const REPORT_TEMPLATE_ID: &str = "report";

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>OTDR Report - {{title}}</title>
<style>
body { font-family: sans-serif; margin: 20px; }
h1, h2 { color: #333; }
img { max-width: 100%; height: auto; display: block; margin: 0 auto 20px auto; border: 1px solid #ddd; }
.fields { border: 1px solid #ddd; margin-bottom: 20px; }
.field { display: flex; border-bottom: 1px solid #eee; }
.field:last-child { border-bottom: none; }
.key { flex: 0 0 35%; padding: 6px 8px; font-weight: bold; background-color: #f2f2f2; }
.value { flex: 1; padding: 6px 8px; }
.print-btn { position: fixed; top: 20px; right: 20px; padding: 10px 20px; cursor: pointer; background-color: #007bff; color: white; border: none; border-radius: 5px; }
@media print {
.print-btn { display: none; }
}
</style>
</head>
<body>
<button onclick="window.print()" class="print-btn">Save PDF</button>
<h1>Report: {{title}}</h1>
{{#if chart_image}}
<img src="{{image_src chart_image}}" alt="OTDR Trace Chart">
{{/if}}
{{#if properties}}
<h2>Properties</h2>
<div class="fields">
{{#each properties}}
<div class="field"><span class="key" contenteditable="true">{{key}}</span><span class="value" contenteditable="true">{{value}}</span></div>
{{/each}}
</div>
{{/if}}
{{#if summary}}
<h2>Summary</h2>
<div class="fields">
{{#each summary}}
<div class="field"><span class="key" contenteditable="true">{{key}}</span><span class="value" contenteditable="true">{{value}}</span></div>
{{/each}}
</div>
{{/if}}
{{#if events}}
<h2>Events</h2>
{{#each events}}
<div class="fields event">
{{#each this}}
<div class="field"><span class="key" contenteditable="true">{{key}}</span><span class="value" contenteditable="true">{{value}}</span></div>
{{/each}}
</div>
{{/each}}
{{/if}}
</body>
</html>
"#;

/// A single editable key/value pair in the rendered document.
#[derive(Debug, Serialize)]
struct Field<'a> {
    key: &'a str,
    value: String,
}

// Ordered lists of fields, since iterating over objects in templates does not
// preserve the payload's key order.
#[derive(Debug, Serialize)]
struct ReportContext<'a> {
    title: &'a str,
    chart_image: Option<&'a str>,
    properties: Vec<Field<'a>>,
    summary: Vec<Field<'a>>,
    events: Vec<Vec<Field<'a>>>,
}

impl<'a> ReportContext<'a> {
    fn new(payload: &'a Payload) -> Self {
        let title = match payload.source_file.trim() {
            "" => MISSING_SOURCE_PLACEHOLDER,
            _ => payload.source_file.as_str(),
        };
        let properties = payload
            .properties
            .iter()
            .flatten()
            .map(|(key, value)| Field {
                key,
                value: value.to_string(),
            })
            .collect();
        // Only the first summary row makes it into the document.
        let summary = payload
            .summary
            .as_ref()
            .and_then(|rows| rows.first())
            .map(row_fields)
            .unwrap_or_default();
        let events = payload
            .events
            .iter()
            .flatten()
            .map(row_fields)
            .collect();
        Self {
            title,
            chart_image: payload.chart_image.as_deref(),
            properties,
            summary,
            events,
        }
    }
}

fn row_fields(row: &ProjectedRow) -> Vec<Field<'_>> {
    row.iter()
        .map(|(key, value)| Field {
            key,
            value: value.clone(),
        })
        .collect()
}

/// Turns a chart image into something usable as an `<img>` source: data URIs
/// are used as-is, bare base64 is assumed to be a PNG.
///
/// Usage:
///
/// ```handlebars
/// <img src="{{image_src chart_image}}">
/// ```
fn image_src(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let image = h
        .param(0)
        .and_then(|param| param.value().as_str())
        .ok_or_else(|| RenderError::new("image_src expects a string parameter"))?;
    let src = if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("data:image/png;base64,{}", image)
    };
    out.write(&html_escape(&src))?;
    Ok(())
}

/// Renders payloads as self-contained HTML reports. The report template is
/// compiled once, when the generator is constructed.
///
/// Rendering depends on nothing but the payload, so rendering the same
/// payload twice produces identical output.
#[derive(Debug)]
pub struct ReportGenerator<'reg> {
    hb: Handlebars<'reg>,
}

impl<'reg> ReportGenerator<'reg> {
    pub fn new() -> Result<Self, Error> {
        let mut hb = Handlebars::new();
        hb.register_helper("image_src", Box::new(image_src));
        hb.register_template_string(REPORT_TEMPLATE_ID, REPORT_TEMPLATE)
            .map_err(|e| Error::TemplateCompile(REPORT_TEMPLATE_ID.to_string(), Box::new(e)))?;
        Ok(Self { hb })
    }

    pub fn render(&self, payload: &Payload) -> Result<String, Error> {
        let ctx = ReportContext::new(payload);
        let rendered = self
            .hb
            .render(REPORT_TEMPLATE_ID, &ctx)
            .map_err(|e| Error::TemplateRender(REPORT_TEMPLATE_ID.to_string(), e))?;
        debug!(
            "Rendered report for {} ({} bytes)",
            ctx.title,
            rendered.len()
        );
        Ok(rendered)
    }
}
